use chrono::Utc;

use super::model::{Account, NewAccount, ProfileUpdate, DEFAULT_PLAN_ID, STARTING_CREDITS};
use crate::store::Store;
use crate::AppError;

/// Default handle for accounts that arrive without one.
pub fn default_username(account_id: &str) -> String {
    let prefix: String = account_id.chars().take(6).collect();
    format!("user_{}", prefix)
}

/// Creates the account on first sign-in. A second notification for the same
/// identity returns the stored account unchanged.
pub async fn create_account(store: &dyn Store, req: NewAccount) -> Result<Account, AppError> {
    create_account_if_absent(store, req).await.map(|(account, _)| account)
}

/// Like [`create_account`], also reporting whether this call inserted it.
pub async fn create_account_if_absent(store: &dyn Store, req: NewAccount) -> Result<(Account, bool), AppError> {
    if req.account_id.trim().is_empty() {
        return Err(AppError::validation("account id is required"));
    }
    if req.email.trim().is_empty() {
        return Err(AppError::validation("email is required"));
    }

    let now = Utc::now();
    let account = Account {
        username: req
            .username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| default_username(&req.account_id)),
        account_id: req.account_id,
        email: req.email,
        photo: req.photo.unwrap_or_default(),
        first_name: req.first_name.unwrap_or_default(),
        last_name: req.last_name.unwrap_or_default(),
        plan_id: DEFAULT_PLAN_ID,
        credit_balance: STARTING_CREDITS,
        created_at: now,
        updated_at: now,
    };

    let (stored, created) = store.insert_account_if_absent(account).await?;
    if created {
        tracing::info!(account_id = %stored.account_id, "✅ account created");
    } else {
        tracing::info!(account_id = %stored.account_id, "account already exists, keeping it");
    }
    Ok((stored, created))
}

pub async fn get_account(store: &dyn Store, account_id: &str) -> Result<Account, AppError> {
    store
        .get_account(account_id)
        .await?
        .ok_or_else(|| AppError::not_found("account", account_id))
}

pub async fn update_profile(
    store: &dyn Store,
    account_id: &str,
    update: &ProfileUpdate,
) -> Result<Account, AppError> {
    store
        .update_profile(account_id, update)
        .await?
        .ok_or_else(|| AppError::not_found("account", account_id))
}

pub async fn delete_account(store: &dyn Store, account_id: &str) -> Result<Account, AppError> {
    let deleted = store
        .delete_account(account_id)
        .await?
        .ok_or_else(|| AppError::not_found("account", account_id))?;
    tracing::info!(account_id, "🗑️ account deleted");
    Ok(deleted)
}
