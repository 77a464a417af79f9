use aivana_atoms::http::{error_response, parse_body, respond};
use aivana_atoms::media::MediaHost;
use aivana_atoms::{credits, users, AppError, Store};
use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::types::{TransformRequest, TransformResult};

/// Builds the transformed variant and charges its fee.
///
/// The balance check in front of the debit is advisory: two concurrent
/// requests can both pass it. The debit itself is one atomic increment, so
/// both charges land.
pub async fn apply_transformation(
    store: &dyn Store,
    media: &dyn MediaHost,
    acting_id: &str,
    req: TransformRequest,
) -> Result<TransformResult, AppError> {
    if req.public_id.trim().is_empty() {
        return Err(AppError::validation("public_id is required"));
    }
    req.transformation.validate()?;

    let account = users::get_account(store, acting_id).await?;
    let fee = req.transformation.credit_fee();
    if account.credit_balance < fee {
        tracing::info!(
            account_id = acting_id,
            balance = account.credit_balance,
            fee,
            "transformation refused, not enough credits"
        );
        return Err(AppError::InsufficientCredits {
            balance: account.credit_balance,
            fee,
        });
    }

    let transformed_url = media.variant_url(&req.public_id, &req.transformation, req.width, req.height);
    let account = credits::apply_delta(store, acting_id, -fee).await?;

    tracing::info!(
        account_id = acting_id,
        kind = ?req.transformation.kind(),
        fee,
        "🎨 transformation applied"
    );
    Ok(TransformResult {
        transformed_url,
        fee,
        credit_balance: account.credit_balance,
    })
}

/// HTTP Handler: POST /transformations
pub async fn apply_transformation_handler(
    store: &dyn Store,
    media: &dyn MediaHost,
    acting_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: TransformRequest = match parse_body(body) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };
    respond(
        StatusCode::OK,
        apply_transformation(store, media, acting_id, req).await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMediaHost;
    use aivana_atoms::media::Transformation;
    use aivana_atoms::users::NewAccount;
    use aivana_atoms::MemoryStore;

    async fn account_with(store: &MemoryStore, balance: i64) {
        users::create_account(
            store,
            NewAccount {
                account_id: "user_a".into(),
                email: "a@example.com".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        credits::apply_delta(store, "user_a", balance - users::STARTING_CREDITS)
            .await
            .unwrap();
    }

    fn restore() -> TransformRequest {
        TransformRequest {
            public_id: "aivana/cat".into(),
            transformation: Transformation::Restore,
            width: None,
            height: None,
        }
    }

    #[tokio::test]
    async fn charges_the_fee_and_returns_the_variant() {
        let store = MemoryStore::new();
        let media = FakeMediaHost::new();
        account_with(&store, 10).await;

        let result = apply_transformation(&store, &media, "user_a", restore()).await.unwrap();
        assert_eq!(result.transformed_url, "https://media.test/restore/aivana/cat");
        assert_eq!(result.fee, 1);
        assert_eq!(result.credit_balance, 9);
    }

    #[tokio::test]
    async fn refuses_when_the_balance_is_short() {
        let store = MemoryStore::new();
        let media = FakeMediaHost::new();
        account_with(&store, 0).await;

        let err = apply_transformation(&store, &media, "user_a", restore())
            .await
            .unwrap_err();
        assert_eq!(err, AppError::InsufficientCredits { balance: 0, fee: 1 });
        // nothing was debited
        assert_eq!(users::get_account(&store, "user_a").await.unwrap().credit_balance, 0);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let media = FakeMediaHost::new();
        assert!(matches!(
            apply_transformation(&store, &media, "ghost", restore()).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn handler_maps_outcomes_to_status_codes() {
        let store = MemoryStore::new();
        let media = FakeMediaHost::new();
        account_with(&store, 1).await;
        let body = br#"{"public_id":"aivana/cat","transformation":{"type":"remove_background"}}"#;

        let ok = apply_transformation_handler(&store, &media, "user_a", body).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let broke = apply_transformation_handler(&store, &media, "user_a", body).await.unwrap();
        assert_eq!(broke.status(), StatusCode::PAYMENT_REQUIRED);

        let malformed = apply_transformation_handler(&store, &media, "user_a", b"{").await.unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }
}
