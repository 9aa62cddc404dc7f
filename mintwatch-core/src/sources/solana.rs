//! `LedgerSource` backed by a Solana-compatible node.

use async_trait::async_trait;
use futures_util::StreamExt;
use mintwatch_sdk::client::{PubsubClient, RpcClient};
use mintwatch_sdk::objects::ledger::{Commitment, ParsedInstruction, TransactionResponse};

use super::{Instruction, LedgerSource, LogStream, SourceError, TransactionDetail};

/// Ledger adapter combining the pub/sub WebSocket and the HTTP RPC endpoint.
pub struct SolanaLedger {
    rpc: RpcClient,
    pubsub: PubsubClient,
}

impl SolanaLedger {
    pub fn with_clients(rpc: RpcClient, pubsub: PubsubClient) -> Self {
        Self { rpc, pubsub }
    }
}

#[async_trait]
impl LedgerSource for SolanaLedger {
    async fn subscribe(
        &self,
        identity: &str,
        commitment: Commitment,
    ) -> Result<LogStream, SourceError> {
        let stream = self.pubsub.logs_subscribe(identity, commitment).await?;
        Ok(stream
            .map(|item| item.map_err(SourceError::from))
            .boxed())
    }

    async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<TransactionDetail>, SourceError> {
        let tx = self.rpc.get_transaction(signature, commitment).await?;
        Ok(tx.map(TransactionDetail::from))
    }
}

impl From<TransactionResponse> for TransactionDetail {
    fn from(tx: TransactionResponse) -> Self {
        Self {
            initiating_identity: tx.fee_payer().map(str::to_string),
            failed: tx.failed(),
            instructions: tx.all_instructions().map(Instruction::from).collect(),
        }
    }
}

impl From<&ParsedInstruction> for Instruction {
    fn from(ix: &ParsedInstruction) -> Self {
        Self {
            program_id: ix.program_id.clone(),
            kind: ix.kind().map(str::to_string),
            args: ix.info().cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_detail_from_parsed_response() {
        let tx: TransactionResponse = serde_json::from_value(json!({
            "slot": 1,
            "meta": {"err": {"InstructionError": [0, "Custom"]}, "innerInstructions": []},
            "transaction": {
                "signatures": ["s"],
                "message": {
                    "accountKeys": [{"pubkey": "Payer", "signer": true, "writable": true}],
                    "instructions": [{
                        "program": "spl-token",
                        "programId": "Tok",
                        "parsed": {"type": "initializeMint", "info": {"mint": "M1"}}
                    }]
                }
            }
        }))
        .unwrap();

        let detail = TransactionDetail::from(tx);
        assert_eq!(detail.initiating_identity.as_deref(), Some("Payer"));
        assert!(detail.failed);
        assert_eq!(detail.instructions.len(), 1);
        assert_eq!(detail.instructions[0].kind.as_deref(), Some("initializeMint"));
        assert_eq!(detail.instructions[0].str_arg("mint"), Some("M1"));
    }

    #[test]
    fn test_unsigned_first_key_has_no_identity() {
        let tx: TransactionResponse = serde_json::from_value(json!({
            "slot": 1,
            "transaction": {
                "signatures": [],
                "message": {
                    "accountKeys": [{"pubkey": "NotSigner", "signer": false}],
                    "instructions": []
                }
            }
        }))
        .unwrap();

        let detail = TransactionDetail::from(tx);
        assert!(detail.initiating_identity.is_none());
        assert!(!detail.failed);
    }
}
