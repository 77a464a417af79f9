//! Tracing subscriber setup for the lambdas.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local runs.
    Pretty,
    /// JSON lines for CloudWatch.
    Json,
}

/// Installs the global subscriber. Call once, at the top of `main`.
///
/// `RUST_LOG` overrides `default_level` when set. CloudWatch stamps each
/// line itself, so the JSON layer leaves the time out.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(true).with_line_number(true))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(false)
                        .without_time(),
                )
                .init();
        }
    }

    tracing::info!("logging initialized (format={:?})", format);
}
