//! Clients and plumbing shared by the lambdas: configuration, logging,
//! the media host and payment gateway clients, webhook verification and
//! request identity.

pub mod auth;
pub mod cloudinary;
pub mod config;
pub mod cors;
pub mod logging;
pub mod stripe;
pub mod svix;

use std::sync::Arc;

use aivana_atoms::media::MediaHost;
use aivana_atoms::Store;

pub use config::{Config, ConfigError};
pub use stripe::PaymentGateway;

/// Everything a request handler needs, built once per cold start.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaHost>,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: Config,
}
