use std::env;

use thiserror::Error;

use crate::logging::LogFormat;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub gallery_index: String,
    pub owner_index: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
    pub cloudinary_folder: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub identity_webhook_secret: String,
    pub app_url: String,
    pub cors_origin: String,
    /// Accept `X-User-Id` as the acting identity. Local development only.
    pub trust_identity_header: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let trust_identity_header = match optional("TRUST_IDENTITY_HEADER", "false").to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                return Err(ConfigError::Invalid {
                    name: "TRUST_IDENTITY_HEADER",
                    value: other.to_string(),
                })
            }
        };

        let log_format = match optional("LOG_FORMAT", "json").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            table_name: optional("TABLE_NAME", "aivana"),
            gallery_index: optional("GALLERY_INDEX", "gallery-index"),
            owner_index: optional("OWNER_INDEX", "owner-index"),
            cloudinary_cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_api_key: required("CLOUDINARY_API_KEY")?,
            cloudinary_api_secret: required("CLOUDINARY_API_SECRET")?,
            cloudinary_folder: optional("CLOUDINARY_FOLDER", "aivana"),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            identity_webhook_secret: required("IDENTITY_WEBHOOK_SECRET")?,
            app_url: optional("APP_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            cors_origin: optional("CORS_ORIGIN", "*"),
            trust_identity_header,
            log_format,
        })
    }
}
