//! Notification formatting configuration.

use url::Url;

/// Look of the embed for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedStyle {
    pub title: String,
    pub color: u32,
    pub footer: Option<String>,
}

impl EmbedStyle {
    pub fn api_default() -> Self {
        Self {
            title: "✅ New SOAR Curated Project".to_string(),
            color: 0x2ecc71,
            footer: Some("SOAR Curated / Verified".to_string()),
        }
    }

    pub fn ledger_default() -> Self {
        Self {
            title: "🪙 New Token Mint".to_string(),
            color: 0x9b59b6,
            footer: Some("Ledger / Deployer Verified".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub webhook_url: Url,
    /// Sender display name.
    pub username: String,
    /// User id to mention in the message content.
    pub mention: Option<String>,
    pub api_style: EmbedStyle,
    pub ledger_style: EmbedStyle,
}

impl NotifierConfig {
    pub fn new(webhook_url: Url) -> Self {
        Self {
            webhook_url,
            username: "SOAR Curated Alerts".to_string(),
            mention: None,
            api_style: EmbedStyle::api_default(),
            ledger_style: EmbedStyle::ledger_default(),
        }
    }
}
