use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::AppError;

/// JSON response with the given status.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn error_response(err: &AppError) -> Result<Response<Body>, Error> {
    match err {
        AppError::Upstream { service, message } => {
            tracing::error!("❌ upstream failure from {}: {}", service, message)
        }
        AppError::Unauthorized { reason, .. } => tracing::warn!("🚫 rejected: {}", reason),
        other => tracing::info!("request failed: {}", other),
    }
    json_response(err.status_code(), &err.body())
}

/// Turns a service result into an HTTP response.
pub fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, AppError>,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(e) => error_response(&e),
    }
}

pub fn not_found() -> Result<Response<Body>, Error> {
    json_response(StatusCode::NOT_FOUND, &serde_json::json!({"error": "Not found"}))
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({"error": "Method not allowed"}),
    )
}

/// Parses a JSON request body, reporting a malformed one as a validation failure.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    if body.is_empty() {
        return Err(AppError::validation("request body is required"));
    }
    Ok(serde_json::from_slice(body)?)
}
