//! Notifier: renders headline + attachment payloads and hands them to a delivery backend

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ChannelConfig, NotifierConfig};
use crate::markup::{is_marked, strip_escapes};
use crate::HostwatchError;

/// The two destinations a notifier can deliver to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Errors,
    Stats,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Errors => write!(f, "errors"),
            Channel::Stats => write!(f, "stats"),
        }
    }
}

/// Endpoint of a single channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub endpoint: String,
    pub enabled: bool,
}

impl From<&ChannelConfig> for NotificationChannel {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            endpoint: config.webhook.trim().to_string(),
            enabled: config.enabled,
        }
    }
}

/// One line of a delivered report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub text: String,
    pub highlighted: bool,
}

impl Attachment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: true,
        }
    }

    /// Plain or highlighted depending on `alert`
    pub fn marked(text: impl Into<String>, alert: bool) -> Self {
        Self {
            text: text.into(),
            highlighted: alert,
        }
    }
}

/// Raw lines are highlighted when they carry [`crate::markup::ALERT_MARKER`]
impl From<&str> for Attachment {
    fn from(raw: &str) -> Self {
        Self::marked(raw, is_marked(raw))
    }
}

impl From<String> for Attachment {
    fn from(raw: String) -> Self {
        let highlighted = is_marked(&raw);
        Self::marked(raw, highlighted)
    }
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub headline: String,
    pub attachments: Vec<Attachment>,
}

/// External collaborator that transports a payload to an endpoint.
///
/// Returns every failure encountered; an empty list means the payload was delivered.
#[async_trait]
pub trait Delivery: Send + Sync + fmt::Debug {
    /// Get the delivery backend name (e.g. "slack")
    fn type_name(&self) -> &str;

    async fn deliver(
        &self,
        endpoint: &str,
        channel: Option<&str>,
        payload: &Payload,
    ) -> Vec<HostwatchError>;
}

/// Formats reports and delivers them to the errors or stats channel
pub struct Notifier {
    errors: NotificationChannel,
    stats: Option<NotificationChannel>,
    max_attachments: Option<usize>,
    channel_override: Option<String>,
    delivery: Arc<dyn Delivery>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("errors", &self.errors)
            .field("stats", &self.stats)
            .field("max_attachments", &self.max_attachments)
            .field("delivery", &self.delivery.type_name())
            .finish()
    }
}

impl Notifier {
    /// Build a notifier, rejecting an enabled channel without an endpoint
    pub fn new(config: &NotifierConfig, delivery: Arc<dyn Delivery>) -> crate::Result<Self> {
        let errors = NotificationChannel::from(&config.errors);
        if errors.enabled && errors.endpoint.is_empty() {
            return Err(HostwatchError::Config(
                "errors channel webhook is not defined".to_string(),
            ));
        }

        let stats = config.stats.as_ref().map(NotificationChannel::from);
        if let Some(stats) = &stats {
            if stats.enabled && stats.endpoint.is_empty() {
                return Err(HostwatchError::Config(
                    "stats channel webhook is not defined".to_string(),
                ));
            }
        }

        tracing::debug!(
            "Created Notifier via '{}' (stats channel: {}, max attachments: {:?})",
            delivery.type_name(),
            stats.is_some(),
            config.max_attachments
        );

        Ok(Self {
            errors,
            stats,
            max_attachments: config.max_attachments,
            channel_override: config.channel.clone().filter(|c| !c.is_empty()),
            delivery,
        })
    }

    /// Deliver a stats report to the stats channel
    pub async fn deliver_stats<I, L>(&self, headline: &str, lines: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = L>,
        L: Into<Attachment>,
    {
        let payload = self.render(headline, lines);
        let channel = self
            .stats
            .as_ref()
            .ok_or(HostwatchError::ChannelUnconfigured(Channel::Stats))?;
        self.send(Channel::Stats, channel, &payload).await
    }

    /// Deliver an error report to the errors channel
    pub async fn deliver_error<I, L>(&self, headline: &str, lines: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = L>,
        L: Into<Attachment>,
    {
        let payload = self.render(headline, lines);
        self.send(Channel::Errors, &self.errors, &payload).await
    }

    /// Render a headline and lines into a plain-text payload.
    ///
    /// Escape sequences are stripped, the headline is emphasised and the
    /// attachment list is cut to the configured maximum.
    pub fn render<I, L>(&self, headline: &str, lines: I) -> Payload
    where
        I: IntoIterator<Item = L>,
        L: Into<Attachment>,
    {
        let attachments = lines
            .into_iter()
            .take(self.max_attachments.unwrap_or(usize::MAX))
            .map(|line| {
                let line = line.into();
                Attachment {
                    text: strip_escapes(&line.text),
                    highlighted: line.highlighted,
                }
            })
            .collect();

        Payload {
            headline: format!("_*{}*_", strip_escapes(headline)),
            attachments,
        }
    }

    async fn send(
        &self,
        kind: Channel,
        channel: &NotificationChannel,
        payload: &Payload,
    ) -> crate::Result<()> {
        if !channel.enabled {
            tracing::debug!(
                "Channel '{}' is disabled, dropping '{}'",
                kind,
                payload.headline
            );
            return Ok(());
        }
        if channel.endpoint.is_empty() {
            return Err(HostwatchError::ChannelUnconfigured(kind));
        }

        tracing::debug!(
            "Delivering '{}' with {} attachment(s) to channel '{}'",
            payload.headline,
            payload.attachments.len(),
            kind
        );

        let failures = self
            .delivery
            .deliver(&channel.endpoint, self.channel_override.as_deref(), payload)
            .await;

        if failures.is_empty() {
            return Ok(());
        }

        let message = failures
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        tracing::warn!("Delivery to channel '{}' failed: {}", kind, message);
        Err(HostwatchError::Delivery(message))
    }
}
