//! Discord-compatible webhook payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordWebhookPayload {
    /// Message text outside the embed; used for mentions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Display name of the sender.
    pub username: String,
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbed {
    pub title: String,
    /// RGB colour as an integer, e.g. `0x2ecc71`.
    pub color: u32,
    pub fields: Vec<DiscordEmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<DiscordEmbedFooter>,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbedFooter {
    pub text: String,
}

impl DiscordWebhookPayload {
    /// A payload carrying a single embed.
    pub fn single(
        username: impl Into<String>,
        content: Option<String>,
        embed: DiscordEmbed,
    ) -> Self {
        Self {
            content,
            username: username.into(),
            embeds: vec![embed],
        }
    }
}
