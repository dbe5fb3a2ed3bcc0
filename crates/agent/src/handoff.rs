//! Telling the creator a conversation needs a human.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

const ATTACHMENT_COLOR: &str = "#ff6b6b";
const ATTACHMENT_FOOTER: &str = "Voicely DM Bot";

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("slack webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("slack webhook returned HTTP {0}")]
    Rejected(u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HandoffNotice {
    pub tenant_id: String,
    pub psid: String,
    /// The message that triggered the handoff.
    pub text: String,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffDelivery {
    Slack,
    Logged,
}

#[async_trait]
pub trait HandoffNotifier: Send + Sync {
    /// Always records the notice somewhere; failures fall back to logging.
    async fn notify(&self, notice: &HandoffNotice) -> HandoffDelivery;
}

/// Posts to a Slack incoming webhook when one is configured.
#[derive(Clone)]
pub struct SlackWebhookNotifier {
    http: Client,
    webhook_url: Option<SecretString>,
}

impl SlackWebhookNotifier {
    pub fn new(http: Client, webhook_url: Option<SecretString>) -> Self {
        Self { http, webhook_url }
    }

    async fn post(&self, url: &str, notice: &HandoffNotice) -> Result<(), HandoffError> {
        let response = self.http.post(url).json(&slack_payload(notice)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HandoffError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

pub fn slack_payload(notice: &HandoffNotice) -> Value {
    json!({
        "text": format!(
            "🤖 *DM Handoff Required*\n\n*Tenant:* {}\n*User ID:* {}\n*Reason:* {}\n*Last Message:* {}",
            notice.tenant_id, notice.psid, notice.reason, notice.text
        ),
        "attachments": [{
            "color": ATTACHMENT_COLOR,
            "fields": [
                {"title": "User ID", "value": notice.psid, "short": true},
                {"title": "Reason", "value": notice.reason, "short": true}
            ],
            "footer": ATTACHMENT_FOOTER
        }]
    })
}

fn log_notice(notice: &HandoffNotice) {
    warn!(
        event_name = "handoff.required",
        tenant_id = %notice.tenant_id,
        psid = %notice.psid,
        reason = %notice.reason,
        text = %notice.text,
        "handoff required"
    );
}

#[async_trait]
impl HandoffNotifier for SlackWebhookNotifier {
    async fn notify(&self, notice: &HandoffNotice) -> HandoffDelivery {
        let Some(url) = &self.webhook_url else {
            log_notice(notice);
            return HandoffDelivery::Logged;
        };

        match self.post(url.expose_secret(), notice).await {
            Ok(()) => {
                info!(
                    event_name = "handoff.slack.sent",
                    tenant_id = %notice.tenant_id,
                    psid = %notice.psid,
                    "handoff notification sent to slack"
                );
                HandoffDelivery::Slack
            }
            Err(error) => {
                warn!(
                    event_name = "handoff.slack.failed",
                    tenant_id = %notice.tenant_id,
                    error = %error,
                    "slack notification failed; logging handoff instead"
                );
                log_notice(notice);
                HandoffDelivery::Logged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use reqwest::Client;
    use serde_json::json;

    use crate::test_support::spawn_capture_server;

    use super::{slack_payload, HandoffDelivery, HandoffNotice, HandoffNotifier, SlackWebhookNotifier};

    fn notice() -> HandoffNotice {
        HandoffNotice {
            tenant_id: "photographer_sarah".to_string(),
            psid: "u1".to_string(),
            text: "I want a refund".to_string(),
            reason: "refund request".to_string(),
        }
    }

    #[test]
    fn payload_carries_fields_colour_and_footer() {
        let payload = slack_payload(&notice());
        let text = payload["text"].as_str().expect("text");
        assert!(text.starts_with("🤖 *DM Handoff Required*"));
        assert!(text.contains("*Reason:* refund request"));
        assert!(text.contains("*Last Message:* I want a refund"));

        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "#ff6b6b");
        assert_eq!(attachment["footer"], "Voicely DM Bot");
        assert_eq!(attachment["fields"][0], json!({"title": "User ID", "value": "u1", "short": true}));
    }

    #[tokio::test]
    async fn without_webhook_the_notice_is_logged() {
        let notifier = SlackWebhookNotifier::new(Client::new(), None);
        assert_eq!(notifier.notify(&notice()).await, HandoffDelivery::Logged);
    }

    #[tokio::test]
    async fn posts_to_configured_webhook() {
        let server = spawn_capture_server(vec![(StatusCode::OK, json!("ok"))]).await;
        let url = format!("{}/services/T000/B000/XXXX", server.base_url);
        let notifier = SlackWebhookNotifier::new(Client::new(), Some(url.into()));

        assert_eq!(notifier.notify(&notice()).await, HandoffDelivery::Slack);
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/services/T000/B000/XXXX");
        assert_eq!(requests[0].body["attachments"][0]["fields"][1]["value"], "refund request");
    }

    #[tokio::test]
    async fn webhook_failure_falls_back_to_logging() {
        let server =
            spawn_capture_server(vec![(StatusCode::INTERNAL_SERVER_ERROR, json!("boom"))]).await;
        let notifier = SlackWebhookNotifier::new(Client::new(), Some(server.base_url.clone().into()));

        assert_eq!(notifier.notify(&notice()).await, HandoffDelivery::Logged);
    }
}
