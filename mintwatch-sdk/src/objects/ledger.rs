//! Ledger JSON-RPC objects.
//!
//! Covers the two calls the watcher makes against a Solana-compatible node:
//! `logsSubscribe` over the pub/sub WebSocket and `getTransaction` with
//! `jsonParsed` encoding over HTTP.

use serde::{Deserialize, Serialize};

/// SPL Token program.
pub const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
/// SPL Token-2022 program.
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Durability level requested for a subscription or lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Commitment::Processed => write!(f, "processed"),
            Commitment::Confirmed => write!(f, "confirmed"),
            Commitment::Finalized => write!(f, "finalized"),
        }
    }
}

/// Outgoing JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: P,
}

impl<P: Serialize> RpcRequest<P> {
    pub fn new(id: u64, method: &'static str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response. `result` is `null` when the node has nothing to
/// return, e.g. a transaction that is not yet available.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Server-pushed notification frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcNotification<T> {
    pub method: String,
    pub params: NotificationParams<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams<T> {
    pub subscription: u64,
    pub result: WithContext<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithContext<T> {
    pub context: SlotContext,
    pub value: T,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlotContext {
    pub slot: u64,
}

/// `logsSubscribe` filter: only transactions mentioning the given address.
#[derive(Debug, Clone, Serialize)]
pub struct LogsFilter {
    pub mentions: [String; 1],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CommitmentConfig {
    pub commitment: Commitment,
}

/// `getTransaction` options.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfig {
    pub encoding: &'static str,
    pub commitment: Commitment,
    pub max_supported_transaction_version: u8,
}

impl TransactionConfig {
    pub fn json_parsed(commitment: Commitment) -> Self {
        Self {
            encoding: "jsonParsed",
            commitment,
            max_supported_transaction_version: 0,
        }
    }
}

/// Value of a `logsNotification`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsNotification {
    pub signature: String,
    /// Non-null when the transaction failed.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub logs: Vec<String>,
}

/// `getTransaction` result in `jsonParsed` encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: EncodedTransaction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructions>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InnerInstructions {
    pub index: u32,
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodedTransaction {
    pub signatures: Vec<String>,
    pub message: ParsedMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub account_keys: Vec<ParsedAccountKey>,
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default)]
    pub writable: bool,
}

/// An instruction as rendered by `jsonParsed`.
///
/// Instructions of programs the node knows how to decode carry `parsed`
/// (usually `{"type": ..., "info": {...}}`, a plain string for memos);
/// everything else only has `programId`, `accounts` and `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    pub program_id: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub parsed: Option<serde_json::Value>,
}

impl ParsedInstruction {
    /// The decoded operation name, e.g. `initializeMint2`.
    pub fn kind(&self) -> Option<&str> {
        self.parsed.as_ref()?.get("type")?.as_str()
    }

    /// The decoded arguments object.
    pub fn info(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.parsed.as_ref()?.get("info")?.as_object()
    }
}

impl TransactionResponse {
    /// The account that paid for and initiated the transaction.
    pub fn fee_payer(&self) -> Option<&str> {
        self.transaction
            .message
            .account_keys
            .first()
            .filter(|key| key.signer)
            .map(|key| key.pubkey.as_str())
    }

    /// Whether the transaction executed with an error.
    pub fn failed(&self) -> bool {
        self.meta.as_ref().is_some_and(|meta| meta.err.is_some())
    }

    /// Top-level instructions followed by every inner (CPI) instruction.
    pub fn all_instructions(&self) -> impl Iterator<Item = &ParsedInstruction> {
        let inner = self
            .meta
            .iter()
            .flat_map(|meta| meta.inner_instructions.iter().flatten())
            .flat_map(|group| group.instructions.iter());
        self.transaction.message.instructions.iter().chain(inner)
    }
}
