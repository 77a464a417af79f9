pub mod model;
pub mod plans;

pub use model::{Purchase, PurchaseOutcome};
pub use plans::{find_plan, Plan, PLANS};
