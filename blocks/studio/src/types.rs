use aivana_atoms::media::{Artifact, Transformation};
use aivana_atoms::pagination::Page;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct TransformRequest {
    pub public_id: String,
    pub transformation: Transformation,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TransformResult {
    pub transformed_url: String,
    pub fee: i64,
    pub credit_balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GalleryPage {
    #[serde(flatten)]
    pub page: Page<Artifact>,
    /// Every stored artifact, regardless of the search.
    pub saved_images: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutPayload {
    pub plan: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CheckoutRedirect {
    pub checkout_id: String,
    pub url: String,
}

/// What a webhook delivery led to.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    Created,
    Updated,
    Deleted,
    Credited,
    Duplicate,
    Ignored,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
    pub event_type: String,
    pub action: WebhookAction,
}

impl WebhookAck {
    pub fn new(event_type: impl Into<String>, action: WebhookAction) -> Self {
        Self {
            received: true,
            event_type: event_type.into(),
            action,
        }
    }
}
