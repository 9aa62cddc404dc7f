//! Ledger source configuration.

use mintwatch_sdk::objects::ledger::{Commitment, SPL_TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID};
use std::time::Duration;
use url::Url;

/// Matches both `InitializeMint` and `InitializeMint2` log lines.
pub const DEFAULT_LOG_MARKER: &str = "Instruction: InitializeMint";
pub const DEFAULT_EXPLORER_LINK_BASE: &str = "https://solscan.io/token/";

/// What a qualifying mint-creation transaction looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintCriteria {
    /// Program ids whose instructions may create the mint.
    pub programs: Vec<String>,
    /// Parsed instruction types that count as mint creation.
    pub operation_kinds: Vec<String>,
    /// Substring that must appear in a log line before the transaction is
    /// fetched at all.
    pub log_marker: String,
}

impl Default for MintCriteria {
    fn default() -> Self {
        Self {
            programs: vec![
                SPL_TOKEN_PROGRAM_ID.to_string(),
                TOKEN_2022_PROGRAM_ID.to_string(),
            ],
            operation_kinds: vec!["initializeMint".to_string(), "initializeMint2".to_string()],
            log_marker: DEFAULT_LOG_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// HTTP JSON-RPC endpoint used for transaction lookups.
    pub rpc_url: Url,
    /// WebSocket pub/sub endpoint used for the log subscription.
    pub ws_url: Url,
    /// The deployer whose mints are reported. Used both as the server-side
    /// subscription filter and as the required fee payer.
    pub deployer: String,
    pub criteria: MintCriteria,
    pub subscribe_commitment: Commitment,
    /// Must be `confirmed` or `finalized`.
    pub lookup_commitment: Commitment,
    /// Pause before subscribing again after the stream ended or failed.
    pub resubscribe_delay: Duration,
    pub explorer_link_base: String,
}

impl LedgerConfig {
    pub fn new(rpc_url: Url, ws_url: Url, deployer: impl Into<String>) -> Self {
        Self {
            rpc_url,
            ws_url,
            deployer: deployer.into(),
            criteria: MintCriteria::default(),
            subscribe_commitment: Commitment::Confirmed,
            lookup_commitment: Commitment::Confirmed,
            resubscribe_delay: Duration::from_secs(5),
            explorer_link_base: DEFAULT_EXPLORER_LINK_BASE.to_string(),
        }
    }
}
