use aivana_atoms::http::{error_response, json_response, parse_body, respond};
use aivana_atoms::purchases::{find_plan, Purchase, PurchaseOutcome, PLANS};
use aivana_atoms::{credits, users, AppError, Store};
use aivana_shared::stripe::{self, CheckoutRequest, CompletedSession, Event, PaymentGateway};
use chrono::Utc;
use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::types::{CheckoutPayload, CheckoutRedirect, WebhookAck, WebhookAction};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

/// Opens a hosted checkout for `plan_name`. Nothing is credited here; the
/// grant waits for the gateway's signed completion notice.
pub async fn start_checkout(
    store: &dyn Store,
    payments: &dyn PaymentGateway,
    app_url: &str,
    buyer_id: &str,
    plan_name: &str,
) -> Result<CheckoutRedirect, AppError> {
    let plan = find_plan(plan_name)
        .ok_or_else(|| AppError::validation(format!("unknown plan {:?}", plan_name)))?;
    if plan.is_free() {
        return Err(AppError::validation("the free plan cannot be purchased"));
    }
    users::get_account(store, buyer_id).await?;

    let session = payments
        .create_checkout(&CheckoutRequest {
            plan: plan.name.to_string(),
            amount_cents: plan.price_cents,
            credits: plan.credits,
            buyer_id: buyer_id.to_string(),
            success_url: format!("{}/profile?success=true", app_url),
            cancel_url: format!("{}/?canceled=true", app_url),
        })
        .await?;

    tracing::info!(buyer_id, plan = plan.name, checkout_id = %session.id, "🛒 checkout started");
    Ok(CheckoutRedirect {
        checkout_id: session.id,
        url: session.url,
    })
}

fn purchase_from_session(session: CompletedSession) -> Result<Purchase, AppError> {
    let metadata = |key: &str| {
        session
            .metadata
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| AppError::validation(format!("session {} has no {} metadata", session.id, key)))
    };
    let buyer_id = metadata("buyer_id")?;
    let plan = metadata("plan")?;
    let credits = metadata("credits")?
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("session {} has non-numeric credits", session.id)))?;

    Ok(Purchase {
        checkout_id: session.id,
        buyer_id,
        plan,
        amount_cents: session.amount_total.unwrap_or(0),
        credits,
        created_at: Utc::now(),
    })
}

/// Handles a payment-gateway notification. Paid checkouts are recorded and
/// credited once; a redelivery changes nothing. A completion still awaiting
/// payment is acknowledged without a grant, and the later
/// `async_payment_succeeded` notice credits it. Other events are ignored.
pub async fn complete_from_webhook(
    store: &dyn Store,
    secret: &str,
    signature_header: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<WebhookAck, AppError> {
    let header = signature_header.ok_or_else(|| AppError::validation("missing Stripe-Signature header"))?;
    stripe::verify_signature(secret, header, body, now)?;

    let event: Event = serde_json::from_slice(body)?;
    if event.event_type != CHECKOUT_COMPLETED && event.event_type != ASYNC_PAYMENT_SUCCEEDED {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "payment event ignored");
        return Ok(WebhookAck::new(event.event_type, WebhookAction::Ignored));
    }

    let session: CompletedSession = serde_json::from_value(event.data.object)?;
    if !session.is_paid() {
        tracing::info!(
            event_id = %event.id,
            checkout_id = %session.id,
            payment_status = ?session.payment_status,
            "⏳ checkout completed without payment; nothing credited"
        );
        return Ok(WebhookAck::new(event.event_type, WebhookAction::Ignored));
    }
    let purchase = purchase_from_session(session)?;
    let action = match credits::apply_purchase(store, &purchase).await? {
        PurchaseOutcome::Applied(_) => WebhookAction::Credited,
        PurchaseOutcome::AlreadyRecorded => WebhookAction::Duplicate,
    };
    Ok(WebhookAck::new(event.event_type, action))
}

/// HTTP Handler: GET /plans
pub fn list_plans_handler() -> Result<Response<Body>, Error> {
    json_response(StatusCode::OK, &PLANS)
}

/// HTTP Handler: POST /credits/checkout
pub async fn start_checkout_handler(
    store: &dyn Store,
    payments: &dyn PaymentGateway,
    app_url: &str,
    buyer_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let payload: CheckoutPayload = match parse_body(body) {
        Ok(payload) => payload,
        Err(e) => return error_response(&e),
    };
    respond(
        StatusCode::OK,
        start_checkout(store, payments, app_url, buyer_id, &payload.plan).await,
    )
}

/// HTTP Handler: POST /webhooks/payments
pub async fn payment_webhook_handler(
    store: &dyn Store,
    secret: &str,
    signature_header: Option<&str>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    respond(
        StatusCode::OK,
        complete_from_webhook(store, secret, signature_header, body, Utc::now().timestamp()).await,
    )
}
