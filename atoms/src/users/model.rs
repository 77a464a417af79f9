use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Balance granted to every new account.
pub const STARTING_CREDITS: i64 = 10;
pub const DEFAULT_PLAN_ID: u32 = 1;

/// A registered end user, keyed by the identity provider's subject id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Account {
    pub account_id: String,
    pub email: String,
    pub username: String,
    pub photo: String,
    pub first_name: String,
    pub last_name: String,
    pub plan_id: u32,
    pub credit_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NewAccount {
    pub account_id: String,
    pub email: String,
    pub username: Option<String>,
    pub photo: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Profile fields synced from the identity provider. `None` leaves a field as is.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub photo: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.photo.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(username) = &self.username {
            account.username = username.clone();
        }
        if let Some(photo) = &self.photo {
            account.photo = photo.clone();
        }
        if let Some(first_name) = &self.first_name {
            account.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            account.last_name = last_name.clone();
        }
    }
}
