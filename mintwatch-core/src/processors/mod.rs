//! Pipeline stages.
//!
//! - `PollSource`: polls the curation feed, emits `RawRecord::Feed`
//! - `SubscriptionSource`: holds the ledger log subscription, emits `RawRecord::Ledger`
//! - `CandidateFilter`: cheap local check, `RawRecord` to `CandidateEvent`
//! - `FeedVerifier` / `LedgerVerifier`: authoritative check, `CandidateEvent` to `ConfirmedEvent`
//! - `DedupCache`: admits each `ConfirmedEvent` key at most once
//! - `Notifier`: delivers admitted events
//! - `Coordinator`: receives `RawRecord`s and drives them through the stages above

pub mod candidate_filter;
pub mod coordinator;
pub mod dedup;
pub mod notifier;
pub mod poll_source;
pub mod subscription_source;
pub mod verifier;

pub use candidate_filter::CandidateFilter;
pub use coordinator::{Coordinator, PipelineStats, StatsSnapshot};
pub use dedup::{DedupCache, DedupStore, DedupStoreError};
pub use notifier::{DiscordNotifier, Notifier, NotifyError, build_payload};
pub use poll_source::PollSource;
pub use subscription_source::SubscriptionSource;
pub use verifier::{FeedVerifier, LedgerVerifier, Rejection, Verification};

use tokio::sync::watch;

/// Resolves once shutdown has been signaled, or the signal sender is gone.
pub(crate) async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
