use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::Transformation;
use crate::AppError;

/// What the media host hands back after ingesting a source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub public_id: String,
    pub secure_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Remote image host. Rendering happens on its side; this crate only
/// stores locators and asks for variant URLs.
#[async_trait]
pub trait MediaHost: Send + Sync + 'static {
    /// Ingests `source_url` into the configured folder.
    async fn upload(&self, source_url: &str) -> Result<UploadedMedia, AppError>;

    /// Runs a search expression and returns the matching locators.
    async fn search(&self, expression: &str, max_results: u32) -> Result<Vec<String>, AppError>;

    /// URL of the transformed variant of `public_id`.
    fn variant_url(
        &self,
        public_id: &str,
        transformation: &Transformation,
        width: Option<u32>,
        height: Option<u32>,
    ) -> String;

    /// Folder uploads land in and searches are scoped to.
    fn folder(&self) -> &str;
}
