//! Runtime configuration types for the pipeline.
//!
//! These are validated values; reading them from files, flags and the
//! environment is handled by the server crate.

mod feed;
mod ledger;
mod notifier;

pub use feed::{DEFAULT_FEED_ENDPOINT, DEFAULT_PROJECT_LINK_BASE, FeedConfig};
pub use ledger::{DEFAULT_EXPLORER_LINK_BASE, DEFAULT_LOG_MARKER, LedgerConfig, MintCriteria};
pub use notifier::{EmbedStyle, NotifierConfig};

use std::path::PathBuf;
use std::time::Duration;

/// How long the coordinator waits for in-flight work after a stop signal.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Per-request timeout of the HTTP clients (feed, ledger lookups, webhook).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to assemble a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Feed polling; `None` disables the feed source.
    pub feed: Option<FeedConfig>,
    /// Ledger subscription; `None` disables the ledger source.
    pub ledger: Option<LedgerConfig>,
    pub notifier: NotifierConfig,
    /// Durable dedup file; `None` keeps the dedup set in memory only.
    pub dedup_path: Option<PathBuf>,
    pub shutdown_grace: Duration,
    /// Bounds every feed fetch, transaction lookup and webhook post.
    pub request_timeout: Duration,
}
