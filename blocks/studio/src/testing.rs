//! In-process stand-ins for the media host and payment gateway.

use std::collections::HashMap;

use aivana_atoms::media::{MediaHost, Transformation, UploadedMedia};
use aivana_atoms::AppError;
use aivana_shared::stripe::{CheckoutRequest, CheckoutSession, PaymentGateway};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Media host that keeps uploads and search results in memory.
#[derive(Default)]
pub struct FakeMediaHost {
    uploads: Mutex<Vec<String>>,
    search_hits: Mutex<HashMap<String, Vec<String>>>,
    searches: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl FakeMediaHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes searches for `expression` return `public_ids`.
    pub fn set_search_hits(&self, expression: &str, public_ids: &[&str]) {
        self.search_hits.lock().insert(
            expression.to_string(),
            public_ids.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Every call fails with an upstream error from now on.
    pub fn fail(&self) {
        *self.failing.lock() = true;
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().clone()
    }

    fn check(&self) -> Result<(), AppError> {
        if *self.failing.lock() {
            Err(AppError::upstream("media host", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MediaHost for FakeMediaHost {
    async fn upload(&self, source_url: &str) -> Result<UploadedMedia, AppError> {
        self.check()?;
        let mut uploads = self.uploads.lock();
        uploads.push(source_url.to_string());
        let public_id = format!("aivana/upload-{}", uploads.len());
        Ok(UploadedMedia {
            secure_url: format!("https://media.test/{}", public_id),
            public_id,
            width: Some(800),
            height: Some(600),
        })
    }

    async fn search(&self, expression: &str, max_results: u32) -> Result<Vec<String>, AppError> {
        self.check()?;
        self.searches.lock().push(expression.to_string());
        let hits = self.search_hits.lock().get(expression).cloned().unwrap_or_default();
        Ok(hits.into_iter().take(max_results as usize).collect())
    }

    fn variant_url(
        &self,
        public_id: &str,
        transformation: &Transformation,
        _width: Option<u32>,
        _height: Option<u32>,
    ) -> String {
        let kind = serde_json::to_value(transformation.kind())
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        format!("https://media.test/{}/{}", kind, public_id)
    }

    fn folder(&self) -> &str {
        "aivana"
    }
}

/// Payment gateway that records checkout requests.
#[derive(Default)]
pub struct FakePaymentGateway {
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        let mut requests = self.requests.lock();
        requests.push(req.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/{}", id),
            id,
        })
    }
}
