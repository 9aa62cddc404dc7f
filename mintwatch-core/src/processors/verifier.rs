//! Authoritative verification of candidates.
//!
//! - `FeedVerifier`: the curated feed is authoritative, so verification is
//!   decoding the item and extracting its natural key (`id`, else `slug`).
//! - `LedgerVerifier`: fetches the full transaction and confirms it both
//!   contains a mint-creation instruction of a target program *and* was
//!   initiated by the configured deployer. Matching on the instruction alone
//!   would report any third party creating a mint in a transaction that
//!   merely mentions the deployer.

use std::convert::Infallible;
use std::sync::Arc;

use kanau::processor::Processor;
use mintwatch_sdk::objects::feed::FeedItem;
use mintwatch_sdk::objects::ledger::Commitment;
use tracing::debug;

use crate::config::{LedgerConfig, MintCriteria};
use crate::events::{
    CandidateEvent, CanonicalId, ConfirmedEvent, DisplayField, RawRecord, SourceTag,
};
use crate::sources::{LedgerSource, SourceError, TransactionDetail};

/// Result of verifying one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Confirmed(ConfirmedEvent),
    Rejected(Rejection),
}

/// Why a candidate did not become a confirmed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The candidate was routed to a verifier for the other source.
    WrongSource(SourceTag),
    /// The record could not be decoded.
    Malformed(String),
    /// No usable natural key could be extracted.
    MissingKey,
    /// The ledger has no transaction for the signature (yet).
    NotFound,
    /// The transaction executed with an error.
    FailedTransaction,
    /// The transaction was initiated by someone other than the deployer.
    IdentityMismatch { found: Option<String> },
    /// No instruction of a target program has a mint-creation kind.
    NoMatchingInstruction,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::WrongSource(tag) => write!(f, "record from {tag} routed to wrong verifier"),
            Rejection::Malformed(reason) => write!(f, "malformed record: {reason}"),
            Rejection::MissingKey => write!(f, "no natural key"),
            Rejection::NotFound => write!(f, "transaction not found"),
            Rejection::FailedTransaction => write!(f, "transaction failed"),
            Rejection::IdentityMismatch { found: Some(found) } => {
                write!(f, "initiated by {found}, not the deployer")
            }
            Rejection::IdentityMismatch { found: None } => write!(f, "no initiating identity"),
            Rejection::NoMatchingInstruction => write!(f, "no mint-creation instruction"),
        }
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub struct FeedVerifier {
    project_link_base: String,
}

impl FeedVerifier {
    pub fn new(project_link_base: impl Into<String>) -> Self {
        Self {
            project_link_base: project_link_base.into(),
        }
    }

    pub fn verify(&self, candidate: CandidateEvent) -> Verification {
        let RawRecord::Feed(value) = candidate.record else {
            return Verification::Rejected(Rejection::WrongSource(candidate.source));
        };

        let item: FeedItem = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(e) => return Verification::Rejected(Rejection::Malformed(e.to_string())),
        };

        let Some(canonical_id) = item.natural_key().and_then(CanonicalId::new) else {
            return Verification::Rejected(Rejection::MissingKey);
        };

        let project = first_non_blank(&[item.name.as_deref(), item.slug.as_deref()])
            .unwrap_or("Unknown");
        let category = first_non_blank(&[item.category.as_deref()]).unwrap_or("—");
        let slug = first_non_blank(&[item.slug.as_deref()]).unwrap_or(canonical_id.as_str());
        let link = format!("[Open on SOAR]({}{})", self.project_link_base, slug);

        Verification::Confirmed(ConfirmedEvent {
            canonical_id,
            display_fields: vec![
                DisplayField::new("Project", project),
                DisplayField::new("Category", category).inline(),
                DisplayField::new("View", link),
            ],
            source: SourceTag::Api,
        })
    }
}

impl Processor<CandidateEvent> for FeedVerifier {
    type Output = Verification;
    type Error = Infallible;

    async fn process(&self, candidate: CandidateEvent) -> Result<Verification, Infallible> {
        Ok(self.verify(candidate))
    }
}

fn first_non_blank<'a>(values: &[Option<&'a str>]) -> Option<&'a str> {
    values
        .iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct LedgerVerifier {
    ledger: Arc<dyn LedgerSource>,
    deployer: String,
    criteria: MintCriteria,
    commitment: Commitment,
    explorer_link_base: String,
}

impl LedgerVerifier {
    pub fn new(ledger: Arc<dyn LedgerSource>, config: &LedgerConfig) -> Self {
        Self {
            ledger,
            deployer: config.deployer.clone(),
            criteria: config.criteria.clone(),
            commitment: config.lookup_commitment,
            explorer_link_base: config.explorer_link_base.clone(),
        }
    }

    /// Decide on an already fetched transaction.
    pub fn verify_transaction(&self, signature: &str, tx: &TransactionDetail) -> Verification {
        if tx.failed {
            return Verification::Rejected(Rejection::FailedTransaction);
        }

        if tx.initiating_identity.as_deref() != Some(self.deployer.as_str()) {
            return Verification::Rejected(Rejection::IdentityMismatch {
                found: tx.initiating_identity.clone(),
            });
        }

        let Some(instruction) = tx.instructions.iter().find(|ix| {
            self.criteria.programs.contains(&ix.program_id)
                && ix
                    .kind
                    .as_ref()
                    .is_some_and(|kind| self.criteria.operation_kinds.contains(kind))
        }) else {
            return Verification::Rejected(Rejection::NoMatchingInstruction);
        };

        let Some(mint) = instruction.str_arg("mint").and_then(CanonicalId::new) else {
            return Verification::Rejected(Rejection::MissingKey);
        };

        let link = format!("[View on Solscan]({}{})", self.explorer_link_base, mint);
        Verification::Confirmed(ConfirmedEvent {
            display_fields: vec![
                DisplayField::new("Mint", mint.as_str()),
                DisplayField::new("Deployer", self.deployer.as_str()),
                DisplayField::new("Signature", signature),
                DisplayField::new("View", link),
            ],
            canonical_id: mint,
            source: SourceTag::Ledger,
        })
    }
}

impl Processor<CandidateEvent> for LedgerVerifier {
    type Output = Verification;
    type Error = SourceError;

    /// Fetch the transaction once; a missing transaction is a rejection, not
    /// an error, and is not retried.
    async fn process(&self, candidate: CandidateEvent) -> Result<Verification, SourceError> {
        let RawRecord::Ledger(notification) = candidate.record else {
            return Ok(Verification::Rejected(Rejection::WrongSource(
                candidate.source,
            )));
        };
        let signature = notification.signature;

        let Some(tx) = self
            .ledger
            .get_transaction(&signature, self.commitment)
            .await?
        else {
            return Ok(Verification::Rejected(Rejection::NotFound));
        };

        let verification = self.verify_transaction(&signature, &tx);
        if let Verification::Rejected(reason) = &verification {
            debug!(%signature, %reason, "Ledger candidate rejected");
        }
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{Instruction, LogStream};
    use async_trait::async_trait;
    use mintwatch_sdk::objects::ledger::{LogsNotification, SPL_TOKEN_PROGRAM_ID};
    use serde_json::json;
    use std::collections::HashMap;

    const DEPLOYER: &str = "Deployer1111111111111111111111111111111111";

    struct FixedLedger {
        txs: HashMap<String, TransactionDetail>,
    }

    #[async_trait]
    impl LedgerSource for FixedLedger {
        async fn subscribe(&self, _: &str, _: Commitment) -> Result<LogStream, SourceError> {
            Err(SourceError::Malformed("not used".to_string()))
        }

        async fn get_transaction(
            &self,
            signature: &str,
            _: Commitment,
        ) -> Result<Option<TransactionDetail>, SourceError> {
            Ok(self.txs.get(signature).cloned())
        }
    }

    fn mint_tx(payer: &str, program: &str, kind: &str, mint: Option<&str>) -> TransactionDetail {
        let mut args = serde_json::Map::new();
        if let Some(mint) = mint {
            args.insert("mint".to_string(), json!(mint));
        }
        TransactionDetail {
            initiating_identity: Some(payer.to_string()),
            failed: false,
            instructions: vec![
                Instruction {
                    program_id: "ComputeBudget111111111111111111111111111111".to_string(),
                    kind: None,
                    args: serde_json::Map::new(),
                },
                Instruction {
                    program_id: program.to_string(),
                    kind: Some(kind.to_string()),
                    args,
                },
            ],
        }
    }

    fn verifier(txs: Vec<(&str, TransactionDetail)>) -> LedgerVerifier {
        let ledger = FixedLedger {
            txs: txs
                .into_iter()
                .map(|(sig, tx)| (sig.to_string(), tx))
                .collect(),
        };
        let config = LedgerConfig::new(
            "http://localhost:8899".parse().unwrap(),
            "ws://localhost:8900".parse().unwrap(),
            DEPLOYER,
        );
        LedgerVerifier::new(Arc::new(ledger), &config)
    }

    fn ledger_candidate(signature: &str) -> CandidateEvent {
        CandidateEvent::new(RawRecord::Ledger(LogsNotification {
            signature: signature.to_string(),
            err: None,
            logs: vec!["Program log: Instruction: InitializeMint2".to_string()],
        }))
    }

    #[tokio::test]
    async fn test_deployer_mint_is_confirmed() {
        let v = verifier(vec![(
            "sig",
            mint_tx(DEPLOYER, SPL_TOKEN_PROGRAM_ID, "initializeMint2", Some("MintM")),
        )]);
        let Verification::Confirmed(event) = v.process(ledger_candidate("sig")).await.unwrap()
        else {
            panic!("expected confirmation");
        };
        assert_eq!(event.canonical_id.as_str(), "MintM");
        assert_eq!(event.source, SourceTag::Ledger);
        assert_eq!(event.field("Deployer"), Some(DEPLOYER));
        assert_eq!(event.field("Signature"), Some("sig"));
        assert_eq!(
            event.field("View"),
            Some("[View on Solscan](https://solscan.io/token/MintM)")
        );
    }

    #[tokio::test]
    async fn test_third_party_mint_is_rejected() {
        // Same program, same operation kind, different initiator.
        let v = verifier(vec![(
            "sig",
            mint_tx("Someone", SPL_TOKEN_PROGRAM_ID, "initializeMint2", Some("MintM")),
        )]);
        assert_eq!(
            v.process(ledger_candidate("sig")).await.unwrap(),
            Verification::Rejected(Rejection::IdentityMismatch {
                found: Some("Someone".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_missing_transaction_is_rejected_not_error() {
        let v = verifier(vec![]);
        assert_eq!(
            v.process(ledger_candidate("unknown")).await.unwrap(),
            Verification::Rejected(Rejection::NotFound)
        );
    }

    #[tokio::test]
    async fn test_wrong_program_or_kind_is_rejected() {
        let v = verifier(vec![
            (
                "other-program",
                mint_tx(DEPLOYER, "FakeToken1111", "initializeMint2", Some("M")),
            ),
            (
                "other-kind",
                mint_tx(DEPLOYER, SPL_TOKEN_PROGRAM_ID, "transfer", Some("M")),
            ),
        ]);
        for sig in ["other-program", "other-kind"] {
            assert_eq!(
                v.process(ledger_candidate(sig)).await.unwrap(),
                Verification::Rejected(Rejection::NoMatchingInstruction)
            );
        }
    }

    #[tokio::test]
    async fn test_missing_mint_argument_is_rejected() {
        let v = verifier(vec![(
            "sig",
            mint_tx(DEPLOYER, SPL_TOKEN_PROGRAM_ID, "initializeMint", None),
        )]);
        assert_eq!(
            v.process(ledger_candidate("sig")).await.unwrap(),
            Verification::Rejected(Rejection::MissingKey)
        );
    }

    #[tokio::test]
    async fn test_failed_transaction_is_rejected() {
        let mut tx = mint_tx(DEPLOYER, SPL_TOKEN_PROGRAM_ID, "initializeMint2", Some("M"));
        tx.failed = true;
        let v = verifier(vec![("sig", tx)]);
        assert_eq!(
            v.process(ledger_candidate("sig")).await.unwrap(),
            Verification::Rejected(Rejection::FailedTransaction)
        );
    }

    #[tokio::test]
    async fn test_feed_item_fields() {
        let v = FeedVerifier::new("https://app.launchonsoar.com/project/");
        let candidate = CandidateEvent::new(RawRecord::Feed(json!({
            "id": 17,
            "slug": "moon-cat",
            "name": "Moon Cat",
            "category": "Memes"
        })));
        let Ok(Verification::Confirmed(event)) = v.process(candidate).await else {
            panic!("expected confirmation");
        };
        assert_eq!(event.canonical_id.as_str(), "17");
        assert_eq!(event.source, SourceTag::Api);
        assert_eq!(event.field("Project"), Some("Moon Cat"));
        assert_eq!(event.field("Category"), Some("Memes"));
        assert_eq!(
            event.field("View"),
            Some("[Open on SOAR](https://app.launchonsoar.com/project/moon-cat)")
        );
    }

    #[test]
    fn test_feed_item_with_structured_category_is_confirmed() {
        let v = FeedVerifier::new("https://x/");
        let candidate = CandidateEvent::new(RawRecord::Feed(json!({
            "id": "abc",
            "slug": "moon",
            "name": "Moon",
            "category": {"id": 3, "name": "Memes"}
        })));
        let Verification::Confirmed(event) = v.verify(candidate) else {
            panic!("expected confirmation");
        };
        assert_eq!(event.canonical_id.as_str(), "abc");
        assert_eq!(event.field("Project"), Some("Moon"));
        assert_eq!(event.field("Category"), Some("—"));
    }

    #[test]
    fn test_feed_item_fallbacks() {
        let v = FeedVerifier::new("https://x/");
        let Verification::Confirmed(event) =
            v.verify(CandidateEvent::new(RawRecord::Feed(json!({"slug": "only-slug"}))))
        else {
            panic!("expected confirmation");
        };
        assert_eq!(event.canonical_id.as_str(), "only-slug");
        assert_eq!(event.field("Project"), Some("only-slug"));
        assert_eq!(event.field("Category"), Some("—"));
    }

    #[test]
    fn test_feed_item_without_key_or_object_is_rejected() {
        let v = FeedVerifier::new("https://x/");
        assert_eq!(
            v.verify(CandidateEvent::new(RawRecord::Feed(json!({"name": "No Key"})))),
            Verification::Rejected(Rejection::MissingKey)
        );
        assert!(matches!(
            v.verify(CandidateEvent::new(RawRecord::Feed(json!("not an object")))),
            Verification::Rejected(Rejection::Malformed(_))
        ));
    }
}
