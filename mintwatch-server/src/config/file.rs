//! TOML file configuration structures.
//!
//! These structs directly map to the `mintwatch.toml` file format. Every
//! field has a default, so an empty file (or no file at all) describes the
//! stock feed-only deployment.

use mintwatch_core::config::{
    DEFAULT_EXPLORER_LINK_BASE, DEFAULT_FEED_ENDPOINT, DEFAULT_LOG_MARKER,
    DEFAULT_PROJECT_LINK_BASE, DEFAULT_REQUEST_TIMEOUT, MintCriteria,
};
use mintwatch_sdk::objects::ledger::Commitment;
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Durable dedup file. Relative paths resolve against the working
    /// directory.
    #[serde(default = "default_dedup_file")]
    pub dedup_file: Option<PathBuf>,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Timeout for each HTTP request: feed fetches, transaction lookups and
    /// webhook posts.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub notifier: NotifierSection,
    #[serde(default)]
    pub feed: FeedSection,
    /// Absent section disables the ledger source.
    #[serde(default)]
    pub ledger: Option<LedgerSection>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dedup_file: default_dedup_file(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            notifier: NotifierSection::default(),
            feed: FeedSection::default(),
            ledger: None,
        }
    }
}

fn default_dedup_file() -> Option<PathBuf> {
    Some(PathBuf::from("seen.json"))
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Webhook section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierSection {
    /// Usually supplied through `DISCORD_WEBHOOK` instead.
    #[serde(default)]
    pub webhook_url: Option<Url>,
    #[serde(default = "default_username")]
    pub username: String,
    /// User id mentioned in each message.
    #[serde(default)]
    pub mention: Option<String>,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: default_username(),
            mention: None,
        }
    }
}

fn default_username() -> String {
    "SOAR Curated Alerts".to_string()
}

/// Curation feed section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_feed_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_project_link_base")]
    pub project_link_base: String,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_feed_endpoint(),
            page_size: default_page_size(),
            poll_interval_secs: default_poll_interval_secs(),
            project_link_base: default_project_link_base(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_feed_endpoint() -> String {
    DEFAULT_FEED_ENDPOINT.to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_project_link_base() -> String {
    DEFAULT_PROJECT_LINK_BASE.to_string()
}

/// Ledger subscription section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSection {
    pub rpc_url: Url,
    pub ws_url: Url,
    /// Deployer identity whose mints are reported.
    pub deployer: String,
    #[serde(default = "default_commitment")]
    pub subscribe_commitment: Commitment,
    #[serde(default = "default_commitment")]
    pub lookup_commitment: Commitment,
    #[serde(default = "default_resubscribe_delay_secs")]
    pub resubscribe_delay_secs: u64,
    #[serde(default = "default_explorer_link_base")]
    pub explorer_link_base: String,
    /// Target program ids. Defaults to SPL Token and Token-2022.
    #[serde(default = "default_programs")]
    pub programs: Vec<String>,
    #[serde(default = "default_operation_kinds")]
    pub operation_kinds: Vec<String>,
    #[serde(default = "default_log_marker")]
    pub log_marker: String,
}

fn default_commitment() -> Commitment {
    Commitment::Confirmed
}

fn default_resubscribe_delay_secs() -> u64 {
    5
}

fn default_explorer_link_base() -> String {
    DEFAULT_EXPLORER_LINK_BASE.to_string()
}

fn default_programs() -> Vec<String> {
    MintCriteria::default().programs
}

fn default_operation_kinds() -> Vec<String> {
    MintCriteria::default().operation_kinds
}

fn default_log_marker() -> String {
    DEFAULT_LOG_MARKER.to_string()
}
