use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeValue, Put, ReturnValue, Select, TransactWriteItem, Update,
};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{sort_for_gallery, ArtifactFilter, Store};
use crate::media::{Artifact, Transformation};
use crate::purchases::{Purchase, PurchaseOutcome};
use crate::users::{Account, ProfileUpdate};
use crate::AppError;

type Item = HashMap<String, AttributeValue>;

const SERVICE: &str = "dynamodb";
const GALLERY_PARTITION: &str = "GALLERY";

/// Single-table DynamoDB backend.
///
/// Keys: `USER#{id}`, `IMAGE#{id}` and `PURCHASE#{checkout_id}`, with PK = SK.
/// Artifacts are also projected into two GSIs sorted by `updated_at`:
/// the gallery index (`gallery_pk`) and the owner index (`owner_id`).
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
    gallery_index: String,
    owner_index: String,
}

impl DynamoStore {
    pub fn new(
        client: DynamoClient,
        table_name: impl Into<String>,
        gallery_index: impl Into<String>,
        owner_index: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            gallery_index: gallery_index.into(),
            owner_index: owner_index.into(),
        }
    }

    /// Builds a client from the ambient AWS configuration and checks that the
    /// table is reachable before handing the store out.
    pub async fn connect(
        table_name: impl Into<String>,
        gallery_index: impl Into<String>,
        owner_index: impl Into<String>,
    ) -> Result<Self, AppError> {
        let config = aws_config::load_from_env().await;
        let store = Self::new(
            DynamoClient::new(&config),
            table_name,
            gallery_index,
            owner_index,
        );

        store
            .client
            .describe_table()
            .table_name(&store.table_name)
            .send()
            .await
            .map_err(|e| upstream("describe_table", e))?;

        tracing::info!(table = %store.table_name, "🔌 connected to DynamoDB");
        Ok(store)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn query_all(
        &self,
        index: &str,
        key_condition: &str,
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<Vec<Item>, AppError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut builder = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index)
                .key_condition_expression(key_condition)
                .scan_index_forward(false)
                .set_exclusive_start_key(start_key.take());
            for (k, v) in &values {
                builder = builder.expression_attribute_values(*k, v.clone());
            }

            let result = builder.send().await.map_err(|e| upstream("query", e))?;
            items.extend(result.items().iter().cloned());

            match result.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => break,
            }
        }

        Ok(items)
    }
}

fn upstream<E, R>(operation: &str, e: aws_sdk_dynamodb::error::SdkError<E, R>) -> AppError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    AppError::upstream(
        SERVICE,
        format!("DynamoDB {} error: {}", operation, DisplayErrorContext(&e)),
    )
}

fn user_key(id: &str) -> AttributeValue {
    AttributeValue::S(format!("USER#{}", id))
}

fn image_key(id: &str) -> AttributeValue {
    AttributeValue::S(format!("IMAGE#{}", id))
}

fn purchase_key(id: &str) -> AttributeValue {
    AttributeValue::S(format!("PURCHASE#{}", id))
}

/// Fixed-width UTC timestamps so the sort key orders lexicographically.
fn timestamp(at: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn get_s(item: &Item, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn get_n<T: std::str::FromStr>(item: &Item, key: &str) -> Option<T> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn get_time(item: &Item, key: &str) -> DateTime<Utc> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

fn account_from_item(item: &Item) -> Result<Account, AppError> {
    let pk = get_s(item, "PK");
    let account_id = pk.strip_prefix("USER#").unwrap_or(&pk).to_string();
    let credit_balance = get_n(item, "credit_balance").ok_or_else(|| {
        AppError::upstream(
            SERVICE,
            format!("account {} has no readable credit_balance", account_id),
        )
    })?;
    Ok(Account {
        account_id,
        email: get_s(item, "email"),
        username: get_s(item, "username"),
        photo: get_s(item, "photo"),
        first_name: get_s(item, "first_name"),
        last_name: get_s(item, "last_name"),
        plan_id: get_n(item, "plan_id").unwrap_or(crate::users::model::DEFAULT_PLAN_ID),
        credit_balance,
        created_at: get_time(item, "created_at"),
        updated_at: get_time(item, "updated_at"),
    })
}

/// Condition keeping `credit_balance + delta` inside `i64`.
///
/// DynamoDB numbers are wider than `i64`, so ADD itself never fails; the bound
/// stops the stored balance from becoming unreadable.
fn balance_bound(delta: i64) -> (&'static str, AttributeValue) {
    if delta >= 0 {
        ("credit_balance <= :bound", AttributeValue::N((i64::MAX - delta).to_string()))
    } else {
        ("credit_balance >= :bound", AttributeValue::N((i64::MIN - delta).to_string()))
    }
}

fn account_to_item(account: &Account) -> Item {
    let pk = user_key(&account.account_id);
    HashMap::from([
        ("PK".to_string(), pk.clone()),
        ("SK".to_string(), pk),
        ("email".to_string(), AttributeValue::S(account.email.clone())),
        ("username".to_string(), AttributeValue::S(account.username.clone())),
        ("photo".to_string(), AttributeValue::S(account.photo.clone())),
        ("first_name".to_string(), AttributeValue::S(account.first_name.clone())),
        ("last_name".to_string(), AttributeValue::S(account.last_name.clone())),
        ("plan_id".to_string(), AttributeValue::N(account.plan_id.to_string())),
        (
            "credit_balance".to_string(),
            AttributeValue::N(account.credit_balance.to_string()),
        ),
        ("created_at".to_string(), timestamp(&account.created_at)),
        ("updated_at".to_string(), timestamp(&account.updated_at)),
    ])
}

fn artifact_from_item(item: &Item) -> Result<Artifact, AppError> {
    let pk = get_s(item, "PK");
    let artifact_id = pk.strip_prefix("IMAGE#").unwrap_or(&pk).to_string();
    let transformation: Transformation = serde_json::from_str(&get_s(item, "transformation"))
        .map_err(|e| {
            AppError::upstream(
                SERVICE,
                format!("artifact {} has an unreadable transformation: {}", artifact_id, e),
            )
        })?;

    Ok(Artifact {
        artifact_id,
        owner_id: get_s(item, "owner_id"),
        title: get_s(item, "title"),
        public_id: get_s(item, "public_id"),
        secure_url: get_s(item, "secure_url"),
        transformation_url: get_s(item, "transformation_url"),
        transformation,
        width: get_n(item, "width"),
        height: get_n(item, "height"),
        created_at: get_time(item, "created_at"),
        updated_at: get_time(item, "updated_at"),
    })
}

fn artifact_to_item(artifact: &Artifact) -> Result<Item, AppError> {
    let pk = image_key(&artifact.artifact_id);
    let transformation = serde_json::to_string(&artifact.transformation)
        .map_err(|e| AppError::validation(format!("Failed to serialize transformation: {}", e)))?;

    let mut item = HashMap::from([
        ("PK".to_string(), pk.clone()),
        ("SK".to_string(), pk),
        (
            "gallery_pk".to_string(),
            AttributeValue::S(GALLERY_PARTITION.to_string()),
        ),
        ("owner_id".to_string(), AttributeValue::S(artifact.owner_id.clone())),
        ("title".to_string(), AttributeValue::S(artifact.title.clone())),
        ("public_id".to_string(), AttributeValue::S(artifact.public_id.clone())),
        ("secure_url".to_string(), AttributeValue::S(artifact.secure_url.clone())),
        (
            "transformation_url".to_string(),
            AttributeValue::S(artifact.transformation_url.clone()),
        ),
        ("transformation".to_string(), AttributeValue::S(transformation)),
        ("created_at".to_string(), timestamp(&artifact.created_at)),
        ("updated_at".to_string(), timestamp(&artifact.updated_at)),
    ]);

    // Optional attributes are omitted rather than stored as NULL
    if let Some(width) = artifact.width {
        item.insert("width".to_string(), AttributeValue::N(width.to_string()));
    }
    if let Some(height) = artifact.height {
        item.insert("height".to_string(), AttributeValue::N(height.to_string()));
    }

    Ok(item)
}

#[async_trait]
impl Store for DynamoStore {
    async fn close(&self) -> Result<(), AppError> {
        // The SDK client holds no sessions; dropping it releases the pool.
        tracing::info!(table = %self.table_name, "DynamoDB store closed");
        Ok(())
    }

    async fn insert_account_if_absent(&self, account: Account) -> Result<(Account, bool), AppError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(account_to_item(&account)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok((account, true)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                let existing = self
                    .get_account(&account.account_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("account", &account.account_id))?;
                Ok((existing, false))
            }
            Err(e) => Err(upstream("put_item", e)),
        }
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        let pk = user_key(account_id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", pk.clone())
            .key("SK", pk)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| upstream("get_item", e))?;

        result.item().map(account_from_item).transpose()
    }

    async fn update_profile(
        &self,
        account_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Account>, AppError> {
        let pk = user_key(account_id);

        let mut update_expr = vec!["updated_at = :updated_at"];
        let mut expr_values = HashMap::new();
        expr_values.insert(":updated_at".to_string(), timestamp(&Utc::now()));

        if let Some(username) = &update.username {
            update_expr.push("username = :username");
            expr_values.insert(":username".to_string(), AttributeValue::S(username.clone()));
        }
        if let Some(photo) = &update.photo {
            update_expr.push("photo = :photo");
            expr_values.insert(":photo".to_string(), AttributeValue::S(photo.clone()));
        }
        if let Some(first_name) = &update.first_name {
            update_expr.push("first_name = :first_name");
            expr_values.insert(":first_name".to_string(), AttributeValue::S(first_name.clone()));
        }
        if let Some(last_name) = &update.last_name {
            update_expr.push("last_name = :last_name");
            expr_values.insert(":last_name".to_string(), AttributeValue::S(last_name.clone()));
        }

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", pk.clone())
            .key("SK", pk)
            .update_expression(format!("SET {}", update_expr.join(", ")))
            .condition_expression("attribute_exists(PK)")
            .set_expression_attribute_values(Some(expr_values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => output.attributes().map(account_from_item).transpose(),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(upstream("update_item", e)),
        }
    }

    async fn delete_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        let pk = user_key(account_id);
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", pk.clone())
            .key("SK", pk)
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| upstream("delete_item", e))?;

        result.attributes().map(account_from_item).transpose()
    }

    async fn increment_credits(&self, account_id: &str, delta: i64) -> Result<Option<Account>, AppError> {
        let pk = user_key(account_id);

        // ADD is applied server side; no read-modify-write happens here.
        let (bound_check, bound) = balance_bound(delta);
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", pk.clone())
            .key("SK", pk)
            .update_expression("SET updated_at = :now ADD credit_balance :delta")
            .condition_expression(format!("attribute_exists(PK) AND {}", bound_check))
            .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
            .expression_attribute_values(":bound", bound)
            .expression_attribute_values(":now", timestamp(&Utc::now()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => output.attributes().map(account_from_item).transpose(),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                // Either the account is gone or the bound tripped.
                match self.get_account(account_id).await? {
                    Some(_) => Err(AppError::balance_overflow(account_id, delta)),
                    None => Ok(None),
                }
            }
            Err(e) => Err(upstream("update_item", e)),
        }
    }

    async fn record_purchase(&self, purchase: &Purchase) -> Result<PurchaseOutcome, AppError> {
        let pk = purchase_key(&purchase.checkout_id);
        let buyer = user_key(&purchase.buyer_id);

        let put = Put::builder()
            .table_name(&self.table_name)
            .item("PK", pk.clone())
            .item("SK", pk)
            .item("buyer_id", AttributeValue::S(purchase.buyer_id.clone()))
            .item("plan", AttributeValue::S(purchase.plan.clone()))
            .item("amount_cents", AttributeValue::N(purchase.amount_cents.to_string()))
            .item("credits", AttributeValue::N(purchase.credits.to_string()))
            .item("created_at", timestamp(&purchase.created_at))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(|e| AppError::upstream(SERVICE, e))?;

        let (bound_check, bound) = balance_bound(purchase.credits);
        let grant = Update::builder()
            .table_name(&self.table_name)
            .key("PK", buyer.clone())
            .key("SK", buyer)
            .update_expression("SET updated_at = :now ADD credit_balance :credits")
            .condition_expression(format!("attribute_exists(PK) AND {}", bound_check))
            .expression_attribute_values(":credits", AttributeValue::N(purchase.credits.to_string()))
            .expression_attribute_values(":bound", bound)
            .expression_attribute_values(":now", timestamp(&Utc::now()))
            .build()
            .map_err(|e| AppError::upstream(SERVICE, e))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put).build())
            .transact_items(TransactWriteItem::builder().update(grant).build())
            .send()
            .await;

        if let Err(e) = result {
            use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;

            if let Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) =
                e.as_service_error()
            {
                // Reasons are reported in the order the items were submitted.
                let failed = |i: usize| {
                    cancelled
                        .cancellation_reasons()
                        .get(i)
                        .and_then(|r| r.code())
                        == Some("ConditionalCheckFailed")
                };
                if failed(0) {
                    return Ok(PurchaseOutcome::AlreadyRecorded);
                }
                if failed(1) {
                    return match self.get_account(&purchase.buyer_id).await? {
                        Some(_) => Err(AppError::balance_overflow(&purchase.buyer_id, purchase.credits)),
                        None => Err(AppError::not_found("account", &purchase.buyer_id)),
                    };
                }
            }
            return Err(upstream("transact_write_items", e));
        }

        let account = self
            .get_account(&purchase.buyer_id)
            .await?
            .ok_or_else(|| AppError::not_found("account", &purchase.buyer_id))?;
        Ok(PurchaseOutcome::Applied(account))
    }

    async fn put_artifact(&self, artifact: &Artifact) -> Result<(), AppError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(artifact_to_item(artifact)?))
            .send()
            .await
            .map_err(|e| upstream("put_item", e))?;
        Ok(())
    }

    async fn get_artifact(&self, artifact_id: &str) -> Result<Option<Artifact>, AppError> {
        let pk = image_key(artifact_id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", pk.clone())
            .key("SK", pk)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| upstream("get_item", e))?;

        result.item().map(artifact_from_item).transpose()
    }

    async fn update_artifact(&self, artifact: &Artifact, acting_owner: &str) -> Result<(), AppError> {
        let mut item = artifact_to_item(artifact)?;
        // The stored owner never changes on update.
        item.insert("owner_id".to_string(), AttributeValue::S(acting_owner.to_string()));

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(PK) AND owner_id = :owner")
            .expression_attribute_values(":owner", AttributeValue::S(acting_owner.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(self.explain_rejection(&artifact.artifact_id).await)
            }
            Err(e) => Err(upstream("put_item", e)),
        }
    }

    async fn delete_artifact(&self, artifact_id: &str, acting_owner: &str) -> Result<Artifact, AppError> {
        let pk = image_key(artifact_id);
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", pk.clone())
            .key("SK", pk)
            .condition_expression("attribute_exists(PK) AND owner_id = :owner")
            .expression_attribute_values(":owner", AttributeValue::S(acting_owner.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await;

        match result {
            Ok(output) => output
                .attributes()
                .map(artifact_from_item)
                .transpose()?
                .ok_or_else(|| AppError::not_found("artifact", artifact_id)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(self.explain_rejection(artifact_id).await)
            }
            Err(e) => Err(upstream("delete_item", e)),
        }
    }

    async fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, AppError> {
        let items = match filter {
            ArtifactFilter::Owner(owner) => {
                self.query_all(
                    &self.owner_index,
                    "owner_id = :owner",
                    vec![(":owner", AttributeValue::S(owner.clone()))],
                )
                .await?
            }
            ArtifactFilter::All | ArtifactFilter::PublicIds(_) => {
                self.query_all(
                    &self.gallery_index,
                    "gallery_pk = :gallery",
                    vec![(":gallery", AttributeValue::S(GALLERY_PARTITION.to_string()))],
                )
                .await?
            }
        };

        let mut artifacts = items
            .iter()
            .map(artifact_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        artifacts.retain(|a| filter.matches(a));
        sort_for_gallery(&mut artifacts);
        Ok(artifacts)
    }

    async fn count_artifacts(&self) -> Result<u64, AppError> {
        let mut total = 0u64;
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.gallery_index)
                .key_condition_expression("gallery_pk = :gallery")
                .expression_attribute_values(":gallery", AttributeValue::S(GALLERY_PARTITION.to_string()))
                .select(Select::Count)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| upstream("query", e))?;

            total += result.count().max(0) as u64;
            match result.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => break,
            }
        }

        Ok(total)
    }
}

impl DynamoStore {
    /// A conditional artifact write failed: tell "gone" apart from "not yours".
    async fn explain_rejection(&self, artifact_id: &str) -> AppError {
        match self.get_artifact(artifact_id).await {
            Ok(Some(_)) => AppError::forbidden(format!(
                "artifact {} belongs to another account",
                artifact_id
            )),
            Ok(None) => AppError::not_found("artifact", artifact_id),
            Err(e) => e,
        }
    }
}
