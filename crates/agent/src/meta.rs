//! Instagram messaging through the Meta Graph API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use voicely_core::tenant::MetaCredentials;

pub const SUBSCRIBE_MODE: &str = "subscribe";
const MESSAGING_TYPE_RESPONSE: &str = "RESPONSE";

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("tenant has no Meta page id or page access token configured")]
    MissingCredentials,
    #[error("graph request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("graph API rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// One text DM from an Instagram user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InboundEvent {
    /// Page-scoped id of the sender.
    pub psid: String,
    pub text: String,
}

/// Answers Meta's subscription handshake. Returns the challenge to echo
/// back, or `None` when the request must be refused.
pub fn verify_challenge<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: &str,
) -> Option<&'a str> {
    if expected_token.is_empty() {
        return None;
    }
    if mode == Some(SUBSCRIBE_MODE) && token == Some(expected_token) {
        return challenge;
    }
    None
}

/// Text messages in an Instagram webhook payload, in delivery order.
/// Anything that is not an Instagram text message is skipped.
pub fn extract_events(payload: &Value) -> Vec<InboundEvent> {
    if payload.get("object").and_then(Value::as_str) != Some("instagram") {
        return Vec::new();
    }

    let Some(entries) = payload.get("entry").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| entry.get("messaging").and_then(Value::as_array))
        .flatten()
        .filter_map(|messaging| {
            let text = messaging.get("message")?.get("text")?.as_str()?;
            let psid = messaging.get("sender")?.get("id")?.as_str()?;
            if text.is_empty() || psid.is_empty() {
                return None;
            }
            Some(InboundEvent { psid: psid.to_string(), text: text.to_string() })
        })
        .collect()
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        credentials: &MetaCredentials,
        psid: &str,
        text: &str,
    ) -> Result<(), MessagingError>;
}

#[derive(Clone)]
pub struct GraphMessenger {
    http: Client,
    graph_base_url: String,
}

impl GraphMessenger {
    pub fn new(http: Client, graph_base_url: impl Into<String>) -> Self {
        Self { http, graph_base_url: graph_base_url.into() }
    }

    pub fn messages_url(&self, page_id: &str) -> String {
        format!("{}/{page_id}/messages", self.graph_base_url.trim_end_matches('/'))
    }
}

pub fn send_payload(psid: &str, text: &str) -> Value {
    json!({
        "recipient": {"id": psid},
        "messaging_type": MESSAGING_TYPE_RESPONSE,
        "message": {"text": text}
    })
}

#[async_trait]
impl Messenger for GraphMessenger {
    async fn send_text(
        &self,
        credentials: &MetaCredentials,
        psid: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        if credentials.page_id.trim().is_empty() || credentials.page_access_token.trim().is_empty() {
            return Err(MessagingError::MissingCredentials);
        }

        let response = self
            .http
            .post(self.messages_url(&credentials.page_id))
            .query(&[("access_token", credentials.page_access_token.as_str())])
            .json(&send_payload(psid, text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Rejected { status: status.as_u16(), body });
        }

        debug!(event_name = "meta.message.sent", psid, "message delivered to graph API");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use reqwest::Client;
    use serde_json::json;
    use voicely_core::tenant::MetaCredentials;

    use crate::test_support::spawn_capture_server;

    use super::{extract_events, verify_challenge, GraphMessenger, MessagingError, Messenger};

    fn credentials() -> MetaCredentials {
        MetaCredentials { page_id: "1789".to_string(), page_access_token: "page-token".to_string() }
    }

    #[test]
    fn subscribe_with_matching_token_echoes_challenge() {
        assert_eq!(
            verify_challenge(Some("subscribe"), Some("s3cret"), Some("12345"), "s3cret"),
            Some("12345")
        );
    }

    #[test]
    fn wrong_mode_or_token_is_refused() {
        assert_eq!(verify_challenge(Some("unsubscribe"), Some("s3cret"), Some("1"), "s3cret"), None);
        assert_eq!(verify_challenge(Some("subscribe"), Some("guess"), Some("1"), "s3cret"), None);
        assert_eq!(verify_challenge(Some("subscribe"), None, Some("1"), "s3cret"), None);
        assert_eq!(verify_challenge(Some("subscribe"), Some(""), Some("1"), ""), None);
    }

    #[test]
    fn extracts_text_messages_across_entries() {
        let payload = json!({
            "object": "instagram",
            "entry": [
                {"id": "1789", "messaging": [
                    {"sender": {"id": "u1"}, "message": {"text": "hi!"}},
                    {"sender": {"id": "u2"}, "message": {"attachments": []}},
                    {"sender": {"id": "u3"}, "read": {"mid": "m1"}}
                ]},
                {"id": "1789", "messaging": [
                    {"sender": {"id": "u4"}, "message": {"text": "how much for a mini?"}}
                ]},
                {"id": "1789"}
            ]
        });

        let events = extract_events(&payload);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].psid, "u1");
        assert_eq!(events[1].text, "how much for a mini?");
    }

    #[test]
    fn non_instagram_or_malformed_payloads_yield_nothing() {
        assert!(extract_events(&json!({"object": "page", "entry": []})).is_empty());
        assert!(extract_events(&json!({"object": "instagram", "entry": "nope"})).is_empty());
        assert!(extract_events(&json!("garbage")).is_empty());
    }

    #[tokio::test]
    async fn sends_response_message_with_page_token() {
        let server =
            spawn_capture_server(vec![(StatusCode::OK, json!({"message_id": "m.1"}))]).await;
        let messenger = GraphMessenger::new(Client::new(), format!("{}/v19.0", server.base_url));

        messenger.send_text(&credentials(), "u1", "Hey there!").await.expect("send succeeds");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/v19.0/1789/messages");
        assert_eq!(requests[0].query.as_deref(), Some("access_token=page-token"));
        assert_eq!(requests[0].body["recipient"]["id"], "u1");
        assert_eq!(requests[0].body["messaging_type"], "RESPONSE");
        assert_eq!(requests[0].body["message"]["text"], "Hey there!");
    }

    #[tokio::test]
    async fn graph_errors_surface_status() {
        let server = spawn_capture_server(vec![(
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "Invalid OAuth access token"}}),
        )])
        .await;
        let messenger = GraphMessenger::new(Client::new(), server.base_url.clone());

        let error = messenger.send_text(&credentials(), "u1", "hi").await.expect_err("must fail");
        assert!(matches!(error, MessagingError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let messenger = GraphMessenger::new(Client::new(), "http://127.0.0.1:9");
        let error = messenger
            .send_text(&MetaCredentials::default(), "u1", "hi")
            .await
            .expect_err("must fail");
        assert!(matches!(error, MessagingError::MissingCredentials));
    }
}
