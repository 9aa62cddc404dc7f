//! Notification sink.
//!
//! A [`Notifier`] makes exactly one delivery attempt per call. There is no
//! retry and no queue: the caller logs a failure and moves on.

use async_trait::async_trait;
use mintwatch_sdk::client::{ClientError, WebhookClient};
use mintwatch_sdk::objects::discord::{
    DiscordEmbed, DiscordEmbedField, DiscordEmbedFooter, DiscordWebhookPayload,
};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::NotifierConfig;
use crate::events::{ConfirmedEvent, SourceTag};

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport failure or non-2xx response.
    #[error("delivery failed: {0}")]
    Client(#[from] ClientError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event` once.
    async fn send(&self, event: &ConfirmedEvent) -> Result<(), NotifyError>;
}

/// Posts each event as a single-embed message to a Discord webhook.
pub struct DiscordNotifier {
    client: WebhookClient,
    config: NotifierConfig,
}

impl DiscordNotifier {
    pub fn with_client(client: WebhookClient, config: NotifierConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, event: &ConfirmedEvent) -> Result<(), NotifyError> {
        let payload = build_payload(event, &self.config, OffsetDateTime::now_utc());
        self.client.post(&payload).await?;
        Ok(())
    }
}

/// Render `event` into the webhook body, stamped with `at`.
pub fn build_payload(
    event: &ConfirmedEvent,
    config: &NotifierConfig,
    at: OffsetDateTime,
) -> DiscordWebhookPayload {
    let style = match event.source {
        SourceTag::Api => &config.api_style,
        SourceTag::Ledger => &config.ledger_style,
    };

    let embed = DiscordEmbed {
        title: style.title.clone(),
        color: style.color,
        fields: event
            .display_fields
            .iter()
            .map(|f| DiscordEmbedField {
                name: f.name.clone(),
                value: f.value.clone(),
                inline: f.inline,
            })
            .collect(),
        footer: style
            .footer
            .as_ref()
            .map(|text| DiscordEmbedFooter { text: text.clone() }),
        timestamp: at.format(&Rfc3339).unwrap_or_default(),
    };

    let content = config.mention.as_ref().map(|id| format!("<@{id}>"));
    DiscordWebhookPayload::single(config.username.clone(), content, embed)
}
