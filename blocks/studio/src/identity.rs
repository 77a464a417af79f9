use aivana_atoms::http::respond;
use aivana_atoms::users::{self, NewAccount, ProfileUpdate};
use aivana_atoms::{AppError, Store};
use aivana_shared::svix::{self, SvixHeaders};
use chrono::Utc;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Deserialize;

use crate::types::{WebhookAck, WebhookAction};

/// Stored when the provider sends a user with no email address.
pub const PLACEHOLDER_EMAIL: &str = "no-email@example.com";

#[derive(Debug, Deserialize)]
struct IdentityEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: IdentityUser,
}

#[derive(Debug, Deserialize)]
struct IdentityUser {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    image_url: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

impl IdentityUser {
    /// The provider's view of the profile replaces ours wholesale.
    fn profile(&self) -> ProfileUpdate {
        ProfileUpdate {
            username: Some(
                self.username
                    .clone()
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| users::default_username(&self.id)),
            ),
            photo: Some(self.image_url.clone().unwrap_or_default()),
            first_name: Some(self.first_name.clone().unwrap_or_default()),
            last_name: Some(self.last_name.clone().unwrap_or_default()),
        }
    }
}

/// Applies an identity-provider notification after checking its signature.
pub async fn handle_identity_event(
    store: &dyn Store,
    secret: &str,
    headers: &SvixHeaders<'_>,
    body: &[u8],
    now: i64,
) -> Result<WebhookAck, AppError> {
    svix::verify(secret, headers, body, now)?;
    let event: IdentityEvent = serde_json::from_slice(body)?;
    let user = event.data;
    if user.id.is_empty() {
        return Err(AppError::validation("identity event has no user id"));
    }

    let action = match event.event_type.as_str() {
        "user.created" => {
            let profile = user.profile();
            let (_, created) = users::create_account_if_absent(
                store,
                NewAccount {
                    email: user
                        .email_addresses
                        .into_iter()
                        .map(|e| e.email_address)
                        .find(|e| !e.is_empty())
                        .unwrap_or_else(|| PLACEHOLDER_EMAIL.to_string()),
                    account_id: user.id,
                    username: profile.username,
                    photo: profile.photo,
                    first_name: profile.first_name,
                    last_name: profile.last_name,
                },
            )
            .await?;
            if created {
                WebhookAction::Created
            } else {
                WebhookAction::Duplicate
            }
        }
        "user.updated" => match users::update_profile(store, &user.id, &user.profile()).await {
            Ok(_) => WebhookAction::Updated,
            // deleted already, or the create notice was never delivered
            Err(AppError::NotFound { .. }) => WebhookAction::Ignored,
            Err(e) => return Err(e),
        },
        "user.deleted" => match users::delete_account(store, &user.id).await {
            Ok(_) => WebhookAction::Deleted,
            // redelivery after a successful delete
            Err(AppError::NotFound { .. }) => WebhookAction::Duplicate,
            Err(e) => return Err(e),
        },
        other => {
            tracing::debug!(event_type = other, "identity event ignored");
            WebhookAction::Ignored
        }
    };

    tracing::info!(event_type = %event.event_type, ?action, "👤 identity event handled");
    Ok(WebhookAck::new(event.event_type, action))
}

/// HTTP Handler: POST /webhooks/identity
pub async fn identity_webhook_handler<'a, F>(
    store: &dyn Store,
    secret: &str,
    header: F,
    body: &[u8],
) -> Result<Response<Body>, Error>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let result = match SvixHeaders::from_lookup(header) {
        Ok(headers) => handle_identity_event(store, secret, &headers, body, Utc::now().timestamp()).await,
        Err(e) => Err(e),
    };
    respond(StatusCode::OK, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivana_atoms::MemoryStore;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // base64 of "clerk-signing-key"
    const SECRET: &str = "whsec_Y2xlcmstc2lnbmluZy1rZXk=";
    const NOW: i64 = 1_700_000_000;

    fn deliver(body: &str) -> (String, String) {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"clerk-signing-key").unwrap();
        mac.update(format!("msg_1.{}.", NOW).as_bytes());
        mac.update(body.as_bytes());
        (
            NOW.to_string(),
            format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())),
        )
    }

    async fn send(store: &MemoryStore, body: &str) -> Result<WebhookAck, AppError> {
        let (timestamp, signature) = deliver(body);
        let headers = SvixHeaders {
            id: "msg_1",
            timestamp: &timestamp,
            signature: &signature,
        };
        handle_identity_event(store, SECRET, &headers, body.as_bytes(), NOW).await
    }

    const CREATED: &str = r#"{"type":"user.created","data":{"id":"user_2xYz9abc",
        "email_addresses":[{"email_address":"jane@example.com"}],"first_name":"Jane"}}"#;

    #[tokio::test]
    async fn created_user_gets_an_account_once() {
        let store = MemoryStore::new();
        assert_eq!(send(&store, CREATED).await.unwrap().action, WebhookAction::Created);
        // duplicate delivery
        assert_eq!(send(&store, CREATED).await.unwrap().action, WebhookAction::Duplicate);

        let account = users::get_account(&store, "user_2xYz9abc").await.unwrap();
        assert_eq!(account.email, "jane@example.com");
        assert_eq!(account.username, "user_user_2");
        assert_eq!(account.first_name, "Jane");
        assert_eq!(account.credit_balance, users::STARTING_CREDITS);
    }

    #[tokio::test]
    async fn missing_email_gets_the_placeholder() {
        let store = MemoryStore::new();
        send(&store, r#"{"type":"user.created","data":{"id":"user_9"}}"#)
            .await
            .unwrap();
        assert_eq!(
            users::get_account(&store, "user_9").await.unwrap().email,
            PLACEHOLDER_EMAIL
        );
    }

    #[tokio::test]
    async fn update_and_delete_follow_the_provider() {
        let store = MemoryStore::new();
        send(&store, CREATED).await.unwrap();

        let updated = r#"{"type":"user.updated","data":{"id":"user_2xYz9abc",
            "username":"jane","last_name":"Doe","image_url":"https://img/j.png"}}"#;
        assert_eq!(send(&store, updated).await.unwrap().action, WebhookAction::Updated);
        let account = users::get_account(&store, "user_2xYz9abc").await.unwrap();
        assert_eq!(account.username, "jane");
        assert_eq!(account.last_name, "Doe");
        assert_eq!(account.first_name, "");

        let deleted = r#"{"type":"user.deleted","data":{"id":"user_2xYz9abc","deleted":true}}"#;
        assert_eq!(send(&store, deleted).await.unwrap().action, WebhookAction::Deleted);
        assert_eq!(send(&store, deleted).await.unwrap().action, WebhookAction::Duplicate);
    }

    #[tokio::test]
    async fn update_for_an_unknown_user_is_acknowledged() {
        let store = MemoryStore::new();
        let updated = r#"{"type":"user.updated","data":{"id":"user_gone","username":"ghost"}}"#;
        let ack = send(&store, updated).await.unwrap();
        assert_eq!(ack.action, WebhookAction::Ignored);
        assert!(store.get_account("user_gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsigned_deliveries_change_nothing() {
        let store = MemoryStore::new();
        let headers = SvixHeaders {
            id: "msg_1",
            timestamp: "1700000000",
            signature: "v1,Zm9yZ2Vk",
        };
        assert!(matches!(
            handle_identity_event(&store, SECRET, &headers, CREATED.as_bytes(), NOW).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.get_account("user_2xYz9abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn other_events_are_acknowledged() {
        let store = MemoryStore::new();
        let body = r#"{"type":"session.created","data":{"id":"sess_1"}}"#;
        assert_eq!(send(&store, body).await.unwrap().action, WebhookAction::Ignored);
    }

    #[tokio::test]
    async fn handler_reports_missing_headers() {
        let store = MemoryStore::new();
        let resp = identity_webhook_handler(&store, SECRET, |_| None, CREATED.as_bytes())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
