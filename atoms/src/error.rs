use lambda_http::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Every operation in the studio reports failure through this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String, authenticated: bool },

    #[error("{service} failure: {message}")]
    Upstream { service: &'static str, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient credits: balance {balance}, fee {fee}")]
    InsufficientCredits { balance: i64, fee: i64 },

    #[error("credit balance of {account_id} cannot absorb a change of {delta}")]
    BalanceOverflow { account_id: String, delta: i64 },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Acting identity is known but not allowed to touch the target.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        AppError::Unauthorized {
            reason: reason.into(),
            authenticated: true,
        }
    }

    /// No acting identity could be established for the request.
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        AppError::Unauthorized {
            reason: reason.into(),
            authenticated: false,
        }
    }

    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            service,
            message: err.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NotFound",
            AppError::Unauthorized { .. } => "Unauthorized",
            AppError::Upstream { .. } => "UpstreamFailure",
            AppError::Validation(_) => "ValidationFailed",
            AppError::InsufficientCredits { .. } => "InsufficientCredits",
            AppError::BalanceOverflow { .. } => "BalanceOverflow",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized {
                authenticated: false,
                ..
            } => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::BalanceOverflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn balance_overflow(account_id: impl Into<String>, delta: i64) -> Self {
        AppError::BalanceOverflow {
            account_id: account_id.into(),
            delta,
        }
    }

    /// JSON body sent to the client. Upstream details stay in the logs.
    pub fn body(&self) -> serde_json::Value {
        let message = match self {
            AppError::Upstream { service, .. } => format!("{} is unavailable, try again later", service),
            other => other.to_string(),
        };
        serde_json::to_value(ErrorBody {
            error: self.kind(),
            message,
        })
        .unwrap_or(serde_json::Value::Null)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Validation(format!("invalid JSON body: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_kind_to_a_status() {
        assert_eq!(AppError::not_found("account", "a").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::forbidden("nope").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::unauthenticated("who").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::upstream("dynamodb", "down").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::validation("title").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientCredits { balance: 0, fee: 1 }.status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::BalanceOverflow {
                account_id: "a".into(),
                delta: i64::MAX
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn upstream_body_hides_the_cause() {
        let body = AppError::upstream("dynamodb", "timeout talking to 10.0.0.7").body();
        assert_eq!(body["error"], "UpstreamFailure");
        assert!(!body["message"].as_str().unwrap().contains("10.0.0.7"));
    }

    #[test]
    fn not_found_names_the_entity() {
        let body = AppError::not_found("artifact", "img-1").body();
        assert_eq!(body["error"], "NotFound");
        assert_eq!(body["message"], "artifact not found: img-1");
    }
}
