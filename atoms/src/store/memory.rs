//! In-memory store backend.
//!
//! All tables live behind one lock so that multi-record operations such as
//! [`Store::record_purchase`] are as atomic here as they are in DynamoDB.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{sort_for_gallery, ArtifactFilter, Store};
use crate::media::Artifact;
use crate::purchases::{Purchase, PurchaseOutcome};
use crate::users::{Account, ProfileUpdate};
use crate::AppError;

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    artifacts: HashMap<String, Artifact>,
    purchases: HashMap<String, Purchase>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purchase_count(&self) -> usize {
        self.tables.read().purchases.len()
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.closed.load(Ordering::Acquire) {
            Err(AppError::upstream("memory store", "store is closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn close(&self) -> Result<(), AppError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn insert_account_if_absent(&self, account: Account) -> Result<(Account, bool), AppError> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        if let Some(existing) = tables.accounts.get(&account.account_id) {
            return Ok((existing.clone(), false));
        }
        tables
            .accounts
            .insert(account.account_id.clone(), account.clone());
        Ok((account, true))
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        self.ensure_open()?;
        Ok(self.tables.read().accounts.get(account_id).cloned())
    }

    async fn update_profile(
        &self,
        account_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Account>, AppError> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        Ok(tables.accounts.get_mut(account_id).map(|account| {
            update.apply(account);
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn delete_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        self.ensure_open()?;
        Ok(self.tables.write().accounts.remove(account_id))
    }

    async fn increment_credits(&self, account_id: &str, delta: i64) -> Result<Option<Account>, AppError> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        let Some(account) = tables.accounts.get_mut(account_id) else {
            return Ok(None);
        };
        account.credit_balance = account
            .credit_balance
            .checked_add(delta)
            .ok_or_else(|| AppError::balance_overflow(account_id, delta))?;
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn record_purchase(&self, purchase: &Purchase) -> Result<PurchaseOutcome, AppError> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        if tables.purchases.contains_key(&purchase.checkout_id) {
            return Ok(PurchaseOutcome::AlreadyRecorded);
        }
        let account = match tables.accounts.get_mut(&purchase.buyer_id) {
            Some(account) => {
                account.credit_balance = account
                    .credit_balance
                    .checked_add(purchase.credits)
                    .ok_or_else(|| AppError::balance_overflow(&purchase.buyer_id, purchase.credits))?;
                account.updated_at = Utc::now();
                account.clone()
            }
            None => return Err(AppError::not_found("account", &purchase.buyer_id)),
        };
        tables
            .purchases
            .insert(purchase.checkout_id.clone(), purchase.clone());
        Ok(PurchaseOutcome::Applied(account))
    }

    async fn put_artifact(&self, artifact: &Artifact) -> Result<(), AppError> {
        self.ensure_open()?;
        self.tables
            .write()
            .artifacts
            .insert(artifact.artifact_id.clone(), artifact.clone());
        Ok(())
    }

    async fn get_artifact(&self, artifact_id: &str) -> Result<Option<Artifact>, AppError> {
        self.ensure_open()?;
        Ok(self.tables.read().artifacts.get(artifact_id).cloned())
    }

    async fn update_artifact(&self, artifact: &Artifact, acting_owner: &str) -> Result<(), AppError> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        match tables.artifacts.get_mut(&artifact.artifact_id) {
            None => Err(AppError::not_found("artifact", &artifact.artifact_id)),
            Some(stored) if stored.owner_id != acting_owner => Err(AppError::forbidden(format!(
                "artifact {} belongs to another account",
                artifact.artifact_id
            ))),
            Some(stored) => {
                *stored = Artifact {
                    owner_id: stored.owner_id.clone(),
                    ..artifact.clone()
                };
                Ok(())
            }
        }
    }

    async fn delete_artifact(&self, artifact_id: &str, acting_owner: &str) -> Result<Artifact, AppError> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        match tables.artifacts.get(artifact_id) {
            None => Err(AppError::not_found("artifact", artifact_id)),
            Some(stored) if stored.owner_id != acting_owner => Err(AppError::forbidden(format!(
                "artifact {} belongs to another account",
                artifact_id
            ))),
            Some(_) => tables
                .artifacts
                .remove(artifact_id)
                .ok_or_else(|| AppError::not_found("artifact", artifact_id)),
        }
    }

    async fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, AppError> {
        self.ensure_open()?;
        let mut found: Vec<Artifact> = self
            .tables
            .read()
            .artifacts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort_for_gallery(&mut found);
        Ok(found)
    }

    async fn count_artifacts(&self) -> Result<u64, AppError> {
        self.ensure_open()?;
        Ok(self.tables.read().artifacts.len() as u64)
    }
}
