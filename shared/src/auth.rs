use aivana_atoms::AppError;
use lambda_http::request::RequestContext;
use lambda_http::{Request, RequestExt};

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Resolves who is making the request.
///
/// Tokens are validated by the API Gateway JWT authorizer; the subject claim
/// it forwards is the acting identity. `trust_header` additionally accepts
/// `X-User-Id`, for local runs without a gateway in front.
pub fn acting_identity(req: &Request, trust_header: bool) -> Result<String, AppError> {
    if let Some(RequestContext::ApiGatewayV2(ctx)) = req.request_context_ref() {
        let sub = ctx
            .authorizer
            .as_ref()
            .and_then(|a| a.jwt.as_ref())
            .and_then(|jwt| jwt.claims.get("sub"))
            .filter(|s| !s.is_empty());
        if let Some(sub) = sub {
            return Ok(sub.clone());
        }
    }

    if trust_header {
        if let Some(id) = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return Ok(id.to_string());
        }
    }

    Err(AppError::unauthenticated("no signed-in user on the request"))
}
