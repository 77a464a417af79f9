//! Verification of identity-provider webhooks delivered through Svix.

use aivana_atoms::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

/// The three Svix delivery headers.
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SvixHeaders<'a> {
    /// Reads the delivery headers, reporting the first one missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let get = |name: &str| {
            lookup(name).ok_or_else(|| AppError::validation(format!("missing {} header", name)))
        };
        Ok(Self {
            id: get("svix-id")?,
            timestamp: get("svix-timestamp")?,
            signature: get("svix-signature")?,
        })
    }
}

fn signing_key(secret: &str) -> Result<Vec<u8>, AppError> {
    STANDARD
        .decode(secret.trim_start_matches("whsec_"))
        .map_err(|e| AppError::validation(format!("unusable webhook secret: {}", e)))
}

/// Base64 HMAC-SHA256 over `{id}.{timestamp}.{body}`.
pub fn sign(secret: &str, id: &str, timestamp: &str, body: &[u8]) -> Result<String, AppError> {
    let key = signing_key(secret)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| AppError::validation(format!("unusable webhook secret: {}", e)))?;
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks the delivery against `secret`. The signature header is a
/// space-separated list of `v1,<base64>` entries; any one may match.
pub fn verify(secret: &str, headers: &SvixHeaders<'_>, body: &[u8], now: i64) -> Result<(), AppError> {
    let timestamp: i64 = headers
        .timestamp
        .parse()
        .map_err(|_| AppError::validation("svix-timestamp is not a unix time"))?;
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::validation("webhook timestamp outside tolerance"));
    }

    let expected = sign(secret, headers.id, headers.timestamp, body)?;
    let matched = headers
        .signature
        .split_whitespace()
        .filter_map(|entry| entry.split_once(','))
        .any(|(version, sig)| version == "v1" && constant_time_eq(sig.as_bytes(), expected.as_bytes()));

    if matched {
        Ok(())
    } else {
        tracing::warn!(svix_id = headers.id, "🚫 identity webhook signature mismatch");
        Err(AppError::validation("identity webhook signature mismatch"))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64 of "identity-secret"
    const SECRET: &str = "whsec_aWRlbnRpdHktc2VjcmV0";
    const BODY: &[u8] = br#"{"type":"user.created","data":{}}"#;

    fn headers<'a>(signature: &'a str) -> SvixHeaders<'a> {
        SvixHeaders {
            id: "msg_1",
            timestamp: "1700000000",
            signature,
        }
    }

    #[test]
    fn signature_matches_a_manual_hmac() {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"identity-secret").unwrap();
        mac.update(b"msg_1.1700000000.");
        mac.update(BODY);
        let manual = STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(sign(SECRET, "msg_1", "1700000000", BODY).unwrap(), manual);
    }

    #[test]
    fn any_v1_entry_may_match() {
        let sig = sign(SECRET, "msg_1", "1700000000", BODY).unwrap();
        let header = format!("v1,bm9wZQ== v1,{}", sig);
        assert!(verify(SECRET, &headers(&header), BODY, 1_700_000_010).is_ok());
    }

    #[test]
    fn rejects_bad_deliveries() {
        let sig = sign(SECRET, "msg_1", "1700000000", BODY).unwrap();
        let header = format!("v1,{}", sig);
        assert!(verify(SECRET, &headers(&header), b"{}", 1_700_000_000).is_err());
        assert!(verify(SECRET, &headers(&header), BODY, 1_700_000_400).is_err());
        let wrong_version = format!("v2,{}", sig);
        assert!(verify(SECRET, &headers(&wrong_version), BODY, 1_700_000_000).is_err());
    }

    #[test]
    fn extreme_timestamps_are_rejected() {
        for timestamp in ["-9223372036854775808", "9223372036854775807"] {
            let sig = sign(SECRET, "msg_1", timestamp, BODY).unwrap();
            let header = format!("v1,{}", sig);
            let headers = SvixHeaders {
                id: "msg_1",
                timestamp,
                signature: &header,
            };
            assert!(matches!(
                verify(SECRET, &headers, BODY, 1_700_000_000),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn missing_headers_are_named() {
        let err = SvixHeaders::from_lookup(|name| match name {
            "svix-id" => Some("msg_1"),
            _ => None,
        })
        .unwrap_err();
        assert_eq!(err, AppError::validation("missing svix-timestamp header"));
    }
}
