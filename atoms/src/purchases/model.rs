use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::users::Account;

/// A completed checkout, recorded once per gateway session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Purchase {
    pub checkout_id: String,
    pub buyer_id: String,
    pub plan: String,
    pub amount_cents: i64,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// Purchase stored and credits granted; carries the buyer's new state.
    Applied(Account),
    /// This checkout was already recorded; nothing changed.
    AlreadyRecorded,
}
