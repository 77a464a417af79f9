//! Document storage for accounts, artifacts and purchases.
//!
//! The store is built once by the composition root and handed to every
//! service. Two backends share one contract:
//!
//! - **DynamoStore**: single-table DynamoDB, used by the deployed lambda
//! - **MemoryStore**: in-process, used by tests and local runs
//!
//! Credit changes go through [`Store::increment_credits`] or
//! [`Store::record_purchase`], both applied atomically by the backend.
//! Nothing outside the backend reads a balance, adds to it and writes it back.

mod dynamo;
mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::media::Artifact;
use crate::purchases::{Purchase, PurchaseOutcome};
use crate::users::{Account, ProfileUpdate};
use crate::AppError;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// Which artifacts a listing covers.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactFilter {
    All,
    Owner(String),
    PublicIds(HashSet<String>),
}

impl ArtifactFilter {
    pub fn matches(&self, artifact: &Artifact) -> bool {
        match self {
            ArtifactFilter::All => true,
            ArtifactFilter::Owner(owner) => &artifact.owner_id == owner,
            ArtifactFilter::PublicIds(ids) => ids.contains(&artifact.public_id),
        }
    }
}

/// Newest first, ties broken by id so pages never overlap.
pub fn sort_for_gallery(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.artifact_id.cmp(&b.artifact_id))
    });
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Ends the store's lifecycle. Calls made afterwards fail.
    async fn close(&self) -> Result<(), AppError>;

    /// Stores `account` unless one with the same id exists. Returns the stored
    /// account and whether this call created it.
    async fn insert_account_if_absent(&self, account: Account) -> Result<(Account, bool), AppError>;

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError>;

    async fn update_profile(
        &self,
        account_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Account>, AppError>;

    async fn delete_account(&self, account_id: &str) -> Result<Option<Account>, AppError>;

    /// `credit_balance += delta` as one atomic operation. `None` when the
    /// account does not exist.
    async fn increment_credits(&self, account_id: &str, delta: i64) -> Result<Option<Account>, AppError>;

    /// Stores the purchase and grants its credits in one transaction. A
    /// checkout id seen before yields `AlreadyRecorded`; an unknown buyer
    /// yields `NotFound`.
    async fn record_purchase(&self, purchase: &Purchase) -> Result<PurchaseOutcome, AppError>;

    async fn put_artifact(&self, artifact: &Artifact) -> Result<(), AppError>;

    async fn get_artifact(&self, artifact_id: &str) -> Result<Option<Artifact>, AppError>;

    /// Replaces an artifact, provided its stored owner is `acting_owner`.
    async fn update_artifact(&self, artifact: &Artifact, acting_owner: &str) -> Result<(), AppError>;

    /// Removes an artifact, provided its stored owner is `acting_owner`.
    async fn delete_artifact(&self, artifact_id: &str, acting_owner: &str) -> Result<Artifact, AppError>;

    /// Matching artifacts, sorted by [`sort_for_gallery`].
    async fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, AppError>;

    async fn count_artifacts(&self) -> Result<u64, AppError>;
}
