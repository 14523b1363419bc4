//! Slack incoming-webhook delivery

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::io::HttpClient;
use crate::notifier::{Delivery, Payload};
use crate::HostwatchError;

/// Color Slack draws next to a highlighted attachment
pub const HIGHLIGHT_COLOR: &str = "#FF0000";

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
    mrkdwn: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<WebhookAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct WebhookAttachment<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'static str>,
}

impl<'a> WebhookMessage<'a> {
    fn new(payload: &'a Payload, channel: Option<&'a str>, username: Option<&'a str>) -> Self {
        Self {
            text: &payload.headline,
            mrkdwn: true,
            channel,
            username,
            attachments: payload
                .attachments
                .iter()
                .map(|a| WebhookAttachment {
                    text: &a.text,
                    color: a.highlighted.then_some(HIGHLIGHT_COLOR),
                })
                .collect(),
        }
    }
}

/// Delivers payloads to Slack incoming webhooks
pub struct SlackWebhook {
    username: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for SlackWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebhook")
            .field("username", &self.username)
            .finish()
    }
}

impl SlackWebhook {
    pub fn new(username: Option<String>, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created SlackWebhook with username {:?}", username);
        Self { username, http }
    }
}

#[async_trait]
impl Delivery for SlackWebhook {
    fn type_name(&self) -> &str {
        "slack"
    }

    async fn deliver(
        &self,
        endpoint: &str,
        channel: Option<&str>,
        payload: &Payload,
    ) -> Vec<HostwatchError> {
        let message = WebhookMessage::new(payload, channel, self.username.as_deref());
        let body = match serde_json::to_string(&message) {
            Ok(body) => body,
            Err(e) => return vec![HostwatchError::Json(e)],
        };

        tracing::debug!(
            "Sending Slack message: text='{}', attachments={}",
            payload.headline,
            payload.attachments.len()
        );

        match self.http.post_json(endpoint, &body).await {
            Ok(response) if response.is_success() => {
                tracing::debug!("Slack message sent successfully");
                Vec::new()
            }
            Ok(response) => vec![HostwatchError::Http(format!(
                "Slack webhook returned status {}: {}",
                response.status, response.body
            ))],
            Err(e) => vec![e],
        }
    }
}
