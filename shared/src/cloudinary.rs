//! Cloudinary implementation of the media host.

use std::collections::BTreeMap;

use aivana_atoms::media::{MediaHost, Transformation, UploadedMedia};
use aivana_atoms::AppError;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use sha1::{Digest, Sha1};

const SERVICE: &str = "media host";
const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: Vec<SearchResource>,
}

#[derive(Deserialize)]
struct SearchResource {
    public_id: String,
}

impl CloudinaryClient {
    pub fn new(
        http: reqwest::Client,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            folder: folder.into(),
        }
    }

    /// Signs upload parameters: SHA-1 over `k=v` pairs sorted by key and
    /// joined with `&`, followed by the API secret.
    pub fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let joined = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha1::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Transformation segment of a delivery URL.
pub fn transformation_segment(
    transformation: &Transformation,
    width: Option<u32>,
    height: Option<u32>,
) -> String {
    let effect = match transformation {
        Transformation::Restore => "e_gen_restore".to_string(),
        Transformation::RemoveBackground => "e_background_removal".to_string(),
        Transformation::Fill { aspect_ratio } => {
            let (w, h) = aspect_ratio.dimensions();
            // the ratio fixes the output size
            return format!("b_gen_fill,c_pad,ar_{},w_{},h_{}", aspect_ratio.as_str(), w, h);
        }
        Transformation::Remove {
            prompt,
            remove_shadow,
        } => {
            let mut s = format!("e_gen_remove:prompt_{}", encode(prompt));
            if *remove_shadow {
                s.push_str(";remove-shadow_true");
            }
            s
        }
        Transformation::Recolor {
            prompt,
            to,
            multiple,
        } => {
            let mut s = format!(
                "e_gen_recolor:prompt_{};to-color_{}",
                encode(prompt),
                encode(to.trim_start_matches('#'))
            );
            if *multiple {
                s.push_str(";multiple_true");
            }
            s
        }
    };

    match (width, height) {
        (Some(w), Some(h)) => format!("{}/c_limit,w_{},h_{}", effect, w, h),
        _ => effect,
    }
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    async fn upload(&self, source_url: &str) -> Result<UploadedMedia, AppError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut params = BTreeMap::new();
        params.insert("folder", self.folder.clone());
        params.insert("timestamp", timestamp);
        let signature = self.sign(&params);

        let mut form: Vec<(&str, String)> = params.into_iter().collect();
        form.push(("file", source_url.to_string()));
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));

        let url = format!("{}/{}/image/upload", API_BASE, self.cloud_name);
        tracing::debug!(folder = %self.folder, "uploading source to media host");
        let resp: UploadResponse = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::upstream(SERVICE, e))?
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e))?;

        Ok(UploadedMedia {
            public_id: resp.public_id,
            secure_url: resp.secure_url,
            width: resp.width,
            height: resp.height,
        })
    }

    async fn search(&self, expression: &str, max_results: u32) -> Result<Vec<String>, AppError> {
        let url = format!("{}/{}/resources/search", API_BASE, self.cloud_name);
        let resp: SearchResponse = self
            .http
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&serde_json::json!({
                "expression": expression,
                "max_results": max_results,
            }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::upstream(SERVICE, e))?
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e))?;

        tracing::debug!(expression, hits = resp.resources.len(), "🔍 media search");
        Ok(resp.resources.into_iter().map(|r| r.public_id).collect())
    }

    fn variant_url(
        &self,
        public_id: &str,
        transformation: &Transformation,
        width: Option<u32>,
        height: Option<u32>,
    ) -> String {
        format!(
            "{}/{}/image/upload/{}/{}",
            DELIVERY_BASE,
            self.cloud_name,
            transformation_segment(transformation, width, height),
            public_id
        )
    }

    fn folder(&self) -> &str {
        &self.folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivana_atoms::media::AspectRatio;

    fn client() -> CloudinaryClient {
        CloudinaryClient::new(reqwest::Client::new(), "demo", "key", "abcd", "aivana")
    }

    #[test]
    fn variant_urls_per_kind() {
        let c = client();
        assert_eq!(
            c.variant_url("aivana/cat", &Transformation::Restore, None, None),
            "https://res.cloudinary.com/demo/image/upload/e_gen_restore/aivana/cat"
        );
        assert_eq!(
            c.variant_url(
                "aivana/cat",
                &Transformation::Fill {
                    aspect_ratio: AspectRatio::Portrait
                },
                Some(10),
                Some(10)
            ),
            "https://res.cloudinary.com/demo/image/upload/b_gen_fill,c_pad,ar_3:4,w_1000,h_1334/aivana/cat"
        );
        assert_eq!(
            c.variant_url("aivana/cat", &Transformation::RemoveBackground, Some(640), Some(480)),
            "https://res.cloudinary.com/demo/image/upload/e_background_removal/c_limit,w_640,h_480/aivana/cat"
        );
    }

    #[test]
    fn prompts_are_encoded() {
        let remove = Transformation::Remove {
            prompt: "red car".into(),
            remove_shadow: true,
        };
        assert_eq!(
            transformation_segment(&remove, None, None),
            "e_gen_remove:prompt_red%20car;remove-shadow_true"
        );

        let recolor = Transformation::Recolor {
            prompt: "shirt".into(),
            to: "#00FF00".into(),
            multiple: true,
        };
        assert_eq!(
            transformation_segment(&recolor, None, None),
            "e_gen_recolor:prompt_shirt;to-color_00FF00;multiple_true"
        );
    }

    #[test]
    fn upload_signature_covers_sorted_params() {
        let c = client();
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("folder", "aivana".to_string());

        let mut hasher = Sha1::new();
        hasher.update(b"folder=aivana&timestamp=1315060510abcd");
        assert_eq!(c.sign(&params), hex::encode(hasher.finalize()));
    }
}
