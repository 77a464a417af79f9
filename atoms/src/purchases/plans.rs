use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: u32,
    pub name: &'static str,
    pub price_cents: i64,
    pub credits: i64,
}

impl Plan {
    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

pub const PLANS: [Plan; 3] = [
    Plan {
        id: 1,
        name: "Free",
        price_cents: 0,
        credits: 20,
    },
    Plan {
        id: 2,
        name: "Pro Package",
        price_cents: 4_000,
        credits: 120,
    },
    Plan {
        id: 3,
        name: "Premium Package",
        price_cents: 19_900,
        credits: 2_000,
    },
];

pub fn find_plan(name: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find_plan("pro package").map(|p| p.id), Some(2));
        assert!(find_plan("Enterprise").is_none());
        assert!(find_plan("Free").unwrap().is_free());
    }
}
