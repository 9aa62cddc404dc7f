//! Seams to the external services the pipeline reads from.
//!
//! `FeedSource` is the paginated curation API; `LedgerSource` is the ledger
//! node's push subscription plus point lookup. Production implementations
//! wrap the sdk clients; tests substitute in-memory fakes.

mod solana;

pub use solana::SolanaLedger;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use mintwatch_sdk::client::{ClientError, FeedClient};
use mintwatch_sdk::objects::ledger::{Commitment, LogsNotification};
use thiserror::Error;

/// Errors raised while reading from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport or protocol failure reported by the sdk client.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The source answered with something the adapter cannot read.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Log notifications for one subscription. Dropping it releases the
/// subscription.
pub type LogStream = BoxStream<'static, Result<LogsNotification, SourceError>>;

/// Pull-based curation feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Up to `limit` most recent items, as raw JSON.
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<serde_json::Value>, SourceError>;
}

/// Push subscription plus point lookup against the ledger.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Subscribe to log notifications of transactions that mention
    /// `identity`.
    async fn subscribe(
        &self,
        identity: &str,
        commitment: Commitment,
    ) -> Result<LogStream, SourceError>;

    /// Fetch a transaction by signature. `Ok(None)` means the ledger does not
    /// (yet) have it at the requested commitment.
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<TransactionDetail>, SourceError>;
}

/// The parts of a transaction the verifier looks at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDetail {
    /// Fee payer; `None` if the transaction lists no signer first.
    pub initiating_identity: Option<String>,
    /// Whether the transaction executed with an error.
    pub failed: bool,
    /// Top-level instructions followed by inner instructions.
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instruction {
    pub program_id: String,
    /// Decoded operation name, if the ledger could decode it.
    pub kind: Option<String>,
    /// Decoded arguments; empty when not decoded.
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl Instruction {
    /// A string-valued argument, if present and non-empty.
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.args
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<serde_json::Value>, SourceError> {
        Ok(FeedClient::fetch_latest(self, limit).await?)
    }
}
