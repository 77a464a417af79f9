//! Credit ledger.
//!
//! The only ways a balance changes: a signed delta applied atomically by the
//! store, or a purchase recorded together with its grant. Neither call checks
//! the sign or bound of the result; callers gate debits themselves.

use crate::purchases::{Purchase, PurchaseOutcome};
use crate::store::Store;
use crate::users::Account;
use crate::AppError;

/// Applies `credit_balance += delta` and returns the account as stored afterwards.
pub async fn apply_delta(store: &dyn Store, account_id: &str, delta: i64) -> Result<Account, AppError> {
    let account = store
        .increment_credits(account_id, delta)
        .await?
        .ok_or_else(|| AppError::not_found("account", account_id))?;

    tracing::info!(
        account_id,
        delta,
        balance = account.credit_balance,
        "💳 credit balance updated"
    );
    Ok(account)
}

/// Grants the credits of a confirmed purchase. Replaying the same checkout is
/// a no-op.
pub async fn apply_purchase(store: &dyn Store, purchase: &Purchase) -> Result<PurchaseOutcome, AppError> {
    if purchase.credits <= 0 {
        return Err(AppError::validation(format!(
            "purchase {} grants no credits",
            purchase.checkout_id
        )));
    }
    if purchase.buyer_id.is_empty() {
        return Err(AppError::validation(format!(
            "purchase {} has no buyer",
            purchase.checkout_id
        )));
    }

    let outcome = store.record_purchase(purchase).await?;
    match &outcome {
        PurchaseOutcome::Applied(account) => tracing::info!(
            checkout_id = %purchase.checkout_id,
            buyer_id = %purchase.buyer_id,
            credits = purchase.credits,
            balance = account.credit_balance,
            "💳 purchase credited"
        ),
        PurchaseOutcome::AlreadyRecorded => tracing::info!(
            checkout_id = %purchase.checkout_id,
            "purchase already recorded, skipping"
        ),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::users::{self, NewAccount};
    use chrono::Utc;
    use std::sync::Arc;

    async fn store_with(account_id: &str, balance: i64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        users::create_account(
            store.as_ref(),
            NewAccount {
                account_id: account_id.into(),
                email: format!("{}@example.com", account_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let start = store.get_account(account_id).await.unwrap().unwrap().credit_balance;
        apply_delta(store.as_ref(), account_id, balance - start).await.unwrap();
        store
    }

    #[tokio::test]
    async fn debit_then_purchase() {
        let store = store_with("user_a", 10).await;

        let after_fee = apply_delta(store.as_ref(), "user_a", -2).await.unwrap();
        assert_eq!(after_fee.credit_balance, 8);

        let after_purchase = apply_delta(store.as_ref(), "user_a", 50).await.unwrap();
        assert_eq!(after_purchase.credit_balance, 58);
    }

    #[tokio::test]
    async fn balance_may_go_negative() {
        let store = store_with("user_a", 1).await;
        let account = apply_delta(store.as_ref(), "user_a", -5).await.unwrap();
        assert_eq!(account.credit_balance, -4);
    }

    #[tokio::test]
    async fn overflowing_delta_is_rejected() {
        let store = store_with("user_a", 10).await;
        let err = apply_delta(store.as_ref(), "user_a", i64::MAX).await.unwrap_err();
        assert_eq!(err, AppError::balance_overflow("user_a", i64::MAX));
        assert_eq!(err.status_code().as_u16(), 422);
        let account = store.get_account("user_a").await.unwrap().unwrap();
        assert_eq!(account.credit_balance, 10);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let err = apply_delta(&store, "ghost", 5).await.unwrap_err();
        assert_eq!(err, AppError::not_found("account", "ghost"));
    }

    #[tokio::test]
    async fn unreachable_store_is_an_upstream_failure() {
        let store = store_with("user_a", 10).await;
        store.close().await.unwrap();
        assert!(matches!(
            apply_delta(store.as_ref(), "user_a", 1).await,
            Err(AppError::Upstream { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deltas_are_never_lost() {
        let store = store_with("user_a", 100).await;

        let mut handles = Vec::new();
        for i in 0..64i64 {
            let store = store.clone();
            let delta = if i % 2 == 0 { -1 } else { 3 };
            handles.push(tokio::spawn(async move {
                apply_delta(store.as_ref(), "user_a", delta).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 32 debits of 1 and 32 grants of 3
        let account = store.get_account("user_a").await.unwrap().unwrap();
        assert_eq!(account.credit_balance, 100 - 32 + 96);
    }

    #[tokio::test]
    async fn purchase_needs_positive_credits() {
        let store = store_with("user_a", 10).await;
        let purchase = Purchase {
            checkout_id: "cs_0".into(),
            buyer_id: "user_a".into(),
            plan: "Free".into(),
            amount_cents: 0,
            credits: 0,
            created_at: Utc::now(),
        };
        assert!(matches!(
            apply_purchase(store.as_ref(), &purchase).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn replayed_purchase_grants_once() {
        let store = store_with("user_a", 10).await;
        let purchase = Purchase {
            checkout_id: "cs_9".into(),
            buyer_id: "user_a".into(),
            plan: "Pro Package".into(),
            amount_cents: 4000,
            credits: 120,
            created_at: Utc::now(),
        };
        assert!(matches!(
            apply_purchase(store.as_ref(), &purchase).await.unwrap(),
            PurchaseOutcome::Applied(_)
        ));
        assert_eq!(
            apply_purchase(store.as_ref(), &purchase).await.unwrap(),
            PurchaseOutcome::AlreadyRecorded
        );
        let account = store.get_account("user_a").await.unwrap().unwrap();
        assert_eq!(account.credit_balance, 130);
    }
}
