use std::sync::Arc;

use aivana_atoms::http::{error_response, method_not_allowed, not_found};
use aivana_atoms::media::http as images;
use aivana_atoms::pagination::PageRequest;
use aivana_atoms::users::http as users;
use aivana_shared::{auth, cors, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use studio_block::{gallery, identity, payments, transformations};

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

fn finalize_response(
    resp: Result<Response<Body>, Error>,
    allowed_origins: &str,
    request_origin: Option<&str>,
) -> Result<Response<Body>, Error> {
    resp.map(|r| cors::with_cors_headers(r, allowed_origins, request_origin))
}

/// Routes that act on behalf of a signed-in user.
fn requires_identity(method: &Method, parts: &[&str]) -> bool {
    matches!(
        (method, parts),
        (&Method::GET, ["users", "me"])
            | (&Method::GET, ["users", "me", "images"])
            | (&Method::POST, ["images"])
            | (&Method::PATCH, ["images", _])
            | (&Method::DELETE, ["images", _])
            | (&Method::POST, ["transformations"])
            | (&Method::POST, ["credits", "checkout"])
    )
}

fn is_known_path(parts: &[&str]) -> bool {
    matches!(
        parts,
        ["webhooks", "identity"]
            | ["webhooks", "payments"]
            | ["plans"]
            | ["gallery"]
            | ["users", "me"]
            | ["users", "me", "images"]
            | ["images"]
            | ["images", _]
            | ["transformations"]
            | ["credits", "checkout"]
    )
}

/// Main Lambda handler - routes every API request
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    let request_origin = event.headers().get("Origin").and_then(|v| v.to_str().ok());
    let allowed_origins = state.config.cors_origin.as_str();
    tracing::info!("🚀 API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if *method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(cors::with_cors_headers(resp, allowed_origins, request_origin));
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let query = |key: &str| event.query_string_parameters_ref().and_then(|q| q.first(key));
    let header = |name: &str| event.headers().get(name).and_then(|v| v.to_str().ok());

    let acting_id = if requires_identity(method, &parts) {
        match auth::acting_identity(&event, state.config.trust_identity_header) {
            Ok(id) => id,
            Err(e) => return finalize_response(error_response(&e), allowed_origins, request_origin),
        }
    } else {
        String::new()
    };

    let store = state.store.as_ref();
    let media = state.media.as_ref();

    let resp = match (method, parts.as_slice()) {
        // --- WEBHOOKS ---
        (&Method::POST, ["webhooks", "identity"]) => {
            identity::identity_webhook_handler(store, &state.config.identity_webhook_secret, header, body).await
        }
        (&Method::POST, ["webhooks", "payments"]) => {
            payments::payment_webhook_handler(
                store,
                &state.config.stripe_webhook_secret,
                header(STRIPE_SIGNATURE_HEADER),
                body,
            )
            .await
        }

        // --- PUBLIC ---
        (&Method::GET, ["plans"]) => payments::list_plans_handler(),
        (&Method::GET, ["gallery"]) => {
            gallery::browse_handler(store, media, query("search"), query("page"), query("limit")).await
        }
        (&Method::GET, ["images", id]) => images::get_artifact_handler(store, id).await,

        // --- SIGNED IN ---
        (&Method::GET, ["users", "me"]) => users::get_me_handler(store, &acting_id).await,
        (&Method::GET, ["users", "me", "images"]) => match PageRequest::from_query(query("page"), query("limit")) {
            Ok(page) => images::list_owner_artifacts_handler(store, &acting_id, page).await,
            Err(e) => error_response(&e),
        },
        (&Method::POST, ["images"]) => images::create_artifact_handler(store, media, &acting_id, body).await,
        (&Method::PATCH, ["images", id]) => {
            images::update_artifact_handler(store, media, &acting_id, id, body).await
        }
        (&Method::DELETE, ["images", id]) => images::delete_artifact_handler(store, &acting_id, id).await,
        (&Method::POST, ["transformations"]) => {
            transformations::apply_transformation_handler(store, media, &acting_id, body).await
        }
        (&Method::POST, ["credits", "checkout"]) => {
            payments::start_checkout_handler(
                store,
                state.payments.as_ref(),
                &state.config.app_url,
                &acting_id,
                body,
            )
            .await
        }

        (_, p) if is_known_path(p) => method_not_allowed(),
        _ => {
            tracing::warn!("No route for {} {}", method, path);
            not_found()
        }
    };

    finalize_response(resp, allowed_origins, request_origin)
}
