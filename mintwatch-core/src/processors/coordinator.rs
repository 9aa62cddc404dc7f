//! Coordinator processor.
//!
//! The Coordinator is responsible for:
//! - Receiving `RawRecord`s from both sources on one channel
//! - Running each record through its source's filter and verifier
//! - Admitting confirmed events to the `DedupCache` (at most once per key)
//! - Handing admitted events to the `Notifier` in a background task
//! - Draining in-flight work for a bounded grace period on shutdown
//!
//! Feed records are verified and admitted inline, which keeps admission in
//! page order; verification is local so this never waits on the network.
//! Admitted feed events go through one delivery queue, so notifications
//! arrive in admission order. Ledger records need a transaction lookup and
//! are handled in their own task, so a slow lookup never delays unrelated
//! records. Concurrent admissions of the same key are decided by
//! [`DedupCache::admit`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kanau::processor::Processor;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::candidate_filter::CandidateFilter;
use super::dedup::DedupCache;
use super::notifier::Notifier;
use super::verifier::{FeedVerifier, LedgerVerifier, Rejection, Verification};
use super::wait_for_shutdown;
use crate::config::DEFAULT_SHUTDOWN_GRACE;
use crate::events::{
    CandidateEvent, ConfirmedEvent, DedupKey, RawRecord, RawRecordReceiver, SourceTag,
};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running totals of records per terminal state.
#[derive(Debug, Default)]
pub struct PipelineStats {
    filtered: AtomicU64,
    rejected: AtomicU64,
    duplicate: AtomicU64,
    notified: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Dropped by the cheap filter.
    pub filtered: u64,
    /// Negative verification outcome or lookup failure.
    pub rejected: u64,
    /// Lost the admission to an earlier observation.
    pub duplicate: u64,
    pub notified: u64,
    /// Admitted, but the single delivery attempt failed.
    pub failed: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            filtered: self.filtered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            notified: self.notified.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Admission and delivery
// ---------------------------------------------------------------------------

/// State shared between the coordinator loop and its delivery tasks.
struct Delivery {
    dedup: Arc<DedupCache>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<PipelineStats>,
    /// Admitted keys whose notification has not completed yet.
    in_flight: Mutex<HashSet<DedupKey>>,
}

impl Delivery {
    /// Claim the event's key. `None` if it was already admitted.
    async fn admit(&self, event: ConfirmedEvent) -> Option<ConfirmedEvent> {
        let key = event.dedup_key();
        if !self.dedup.admit(key.clone()) {
            debug!(key = %key, "Duplicate event dropped");
            PipelineStats::bump(&self.stats.duplicate);
            return None;
        }
        self.in_flight().insert(key.clone());
        info!(source = %event.source, id = %event.canonical_id, "Event admitted");

        if let Err(e) = self.dedup.persist().await {
            error!(key = %key, error = %e, "Failed to persist dedup set");
        }
        Some(event)
    }

    /// One delivery attempt. Failure is logged; the admission stands.
    async fn notify(&self, event: ConfirmedEvent) {
        let key = event.dedup_key();
        match self.notifier.send(&event).await {
            Ok(()) => {
                info!(key = %key, "Notification sent");
                PipelineStats::bump(&self.stats.notified);
            }
            Err(e) => {
                error!(key = %key, error = %e, "Notification failed, not retrying");
                PipelineStats::bump(&self.stats.failed);
            }
        }
        self.in_flight().remove(&key);
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<DedupKey>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Notify queued events one at a time until the queue closes.
async fn deliver_in_order(
    delivery: Arc<Delivery>,
    mut queue: mpsc::UnboundedReceiver<ConfirmedEvent>,
) {
    while let Some(event) = queue.recv().await {
        delivery.notify(event).await;
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct LedgerStage {
    filter: CandidateFilter,
    verifier: Arc<LedgerVerifier>,
}

pub struct Coordinator {
    feed: Option<FeedVerifier>,
    ledger: Option<LedgerStage>,
    delivery: Arc<Delivery>,
    shutdown_grace: Duration,
}

impl Coordinator {
    pub fn new(dedup: Arc<DedupCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            feed: None,
            ledger: None,
            delivery: Arc::new(Delivery {
                dedup,
                notifier,
                stats: Arc::new(PipelineStats::default()),
                in_flight: Mutex::new(HashSet::new()),
            }),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Accept feed records, verified by `verifier`.
    pub fn with_feed(mut self, verifier: FeedVerifier) -> Self {
        self.feed = Some(verifier);
        self
    }

    /// Accept ledger records that pass `filter`, verified by `verifier`.
    pub fn with_ledger(mut self, filter: CandidateFilter, verifier: LedgerVerifier) -> Self {
        self.ledger = Some(LedgerStage {
            filter,
            verifier: Arc::new(verifier),
        });
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.delivery.stats.clone()
    }

    /// Run until shutdown is signaled or every source has hung up, then
    /// drain. Returns the final totals.
    pub async fn run(
        self,
        mut record_rx: RawRecordReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> StatsSnapshot {
        info!(
            feed = self.feed.is_some(),
            ledger = self.ledger.is_some(),
            "Coordinator started"
        );
        let mut tasks = JoinSet::new();
        let (feed_queue, queued) = mpsc::unbounded_channel();
        if self.feed.is_some() {
            tasks.spawn(deliver_in_order(self.delivery.clone(), queued));
        }

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("Coordinator received shutdown signal");
                    break;
                }

                record = record_rx.recv() => match record {
                    Some(record) => self.dispatch(record, &feed_queue, &mut tasks).await,
                    None => {
                        info!("All sources closed");
                        break;
                    }
                },

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Pipeline task panicked");
                    }
                }
            }
        }

        record_rx.close();
        // Lets the feed delivery task finish once its queue is empty.
        drop(feed_queue);
        self.drain(tasks).await
    }

    async fn dispatch(
        &self,
        record: RawRecord,
        feed_queue: &mpsc::UnboundedSender<ConfirmedEvent>,
        tasks: &mut JoinSet<()>,
    ) {
        let stats = &self.delivery.stats;
        match record.source() {
            SourceTag::Api => {
                let Some(verifier) = &self.feed else {
                    warn!("Feed record received without a feed verifier");
                    PipelineStats::bump(&stats.rejected);
                    return;
                };
                let Some(candidate) = CandidateFilter::PassThrough.check(record) else {
                    PipelineStats::bump(&stats.filtered);
                    return;
                };
                match verifier.verify(candidate) {
                    Verification::Confirmed(event) => {
                        if let Some(event) = self.delivery.admit(event).await {
                            if let Err(mpsc::error::SendError(event)) = feed_queue.send(event) {
                                warn!(key = %event.dedup_key(), "Feed delivery queue closed");
                            }
                        }
                    }
                    Verification::Rejected(reason) => {
                        debug!(%reason, "Feed item dropped");
                        PipelineStats::bump(&stats.rejected);
                    }
                }
            }
            SourceTag::Ledger => {
                let Some(stage) = &self.ledger else {
                    warn!("Ledger record received without a ledger verifier");
                    PipelineStats::bump(&stats.rejected);
                    return;
                };
                let Some(candidate) = stage.filter.check(record) else {
                    PipelineStats::bump(&stats.filtered);
                    return;
                };
                let verifier = stage.verifier.clone();
                let delivery = self.delivery.clone();
                tasks.spawn(async move {
                    verify_and_deliver(&verifier, &delivery, candidate).await
                });
            }
        }
    }

    async fn drain(self, mut tasks: JoinSet<()>) -> StatsSnapshot {
        let pending = tasks.len();
        if pending > 0 {
            info!(
                pending,
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "Draining in-flight tasks"
            );
        }

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "Grace period elapsed, aborting in-flight tasks"
            );
            tasks.shutdown().await;
        }

        for key in self.delivery.in_flight().iter() {
            warn!(key = %key, "Event admitted but never notified");
        }

        let stats = self.delivery.stats.snapshot();
        info!(
            filtered = stats.filtered,
            rejected = stats.rejected,
            duplicate = stats.duplicate,
            notified = stats.notified,
            failed = stats.failed,
            "Coordinator shutdown complete"
        );
        stats
    }
}

async fn verify_and_deliver(
    verifier: &LedgerVerifier,
    delivery: &Delivery,
    candidate: CandidateEvent,
) {
    let signature = match &candidate.record {
        RawRecord::Ledger(notification) => notification.signature.clone(),
        RawRecord::Feed(_) => String::new(),
    };

    match verifier.process(candidate).await {
        Ok(Verification::Confirmed(event)) => {
            if let Some(event) = delivery.admit(event).await {
                delivery.notify(event).await;
            }
        }
        Ok(Verification::Rejected(Rejection::NotFound)) => {
            warn!(%signature, "Transaction not available at lookup, candidate dropped");
            PipelineStats::bump(&delivery.stats.rejected);
        }
        Ok(Verification::Rejected(_)) => {
            PipelineStats::bump(&delivery.stats.rejected);
        }
        Err(e) => {
            warn!(%signature, error = %e, "Transaction lookup failed, candidate dropped");
            PipelineStats::bump(&delivery.stats.rejected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LOG_MARKER, LedgerConfig};
    use crate::events::raw_record_channel;
    use crate::processors::dedup::DedupStore;
    use crate::processors::notifier::NotifyError;
    use crate::sources::{Instruction, LedgerSource, LogStream, SourceError, TransactionDetail};
    use async_trait::async_trait;
    use mintwatch_sdk::client::ClientError;
    use mintwatch_sdk::objects::ledger::{Commitment, LogsNotification, SPL_TOKEN_PROGRAM_ID};
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tokio::time::Instant;

    const DEPLOYER: &str = "Deployer1111111111111111111111111111111111";

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(ConfirmedEvent, Instant)>>,
        /// Per-id latency before the send completes.
        delays: HashMap<String, Duration>,
        fail: bool,
        hang: bool,
    }

    impl RecordingNotifier {
        fn ids(&self) -> Vec<String> {
            let sent = self.sent.lock().unwrap();
            sent.iter().map(|(e, _)| e.canonical_id.to_string()).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, event: &ConfirmedEvent) -> Result<(), NotifyError> {
            if let Some(delay) = self.delays.get(event.canonical_id.as_str()) {
                tokio::time::sleep(*delay).await;
            }
            self.sent.lock().unwrap().push((event.clone(), Instant::now()));
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(NotifyError::Client(ClientError::Closed));
            }
            Ok(())
        }
    }

    /// Lookup-only ledger: each signature maps to a delay and an optional
    /// transaction.
    #[derive(Default)]
    struct FakeLedger {
        txs: HashMap<String, (Duration, Option<TransactionDetail>)>,
    }

    impl FakeLedger {
        fn with_mint(mut self, signature: &str, mint: &str) -> Self {
            self.txs
                .insert(signature.to_string(), (Duration::ZERO, Some(mint_tx(mint))));
            self
        }

        fn with_slow_miss(mut self, signature: &str, delay: Duration) -> Self {
            self.txs.insert(signature.to_string(), (delay, None));
            self
        }
    }

    #[async_trait]
    impl LedgerSource for FakeLedger {
        async fn subscribe(&self, _: &str, _: Commitment) -> Result<LogStream, SourceError> {
            Err(SourceError::Malformed("not used".to_string()))
        }

        async fn get_transaction(
            &self,
            signature: &str,
            _: Commitment,
        ) -> Result<Option<TransactionDetail>, SourceError> {
            let Some((delay, tx)) = self.txs.get(signature).cloned() else {
                return Ok(None);
            };
            tokio::time::sleep(delay).await;
            Ok(tx)
        }
    }

    fn mint_tx(mint: &str) -> TransactionDetail {
        let mut args = serde_json::Map::new();
        args.insert("mint".to_string(), json!(mint));
        TransactionDetail {
            initiating_identity: Some(DEPLOYER.to_string()),
            failed: false,
            instructions: vec![Instruction {
                program_id: SPL_TOKEN_PROGRAM_ID.to_string(),
                kind: Some("initializeMint2".to_string()),
                args,
            }],
        }
    }

    fn log(signature: &str) -> RawRecord {
        RawRecord::Ledger(LogsNotification {
            signature: signature.to_string(),
            err: None,
            logs: vec!["Program log: Instruction: InitializeMint2".to_string()],
        })
    }

    fn feed(id: &str) -> RawRecord {
        RawRecord::Feed(json!({ "id": id, "slug": id }))
    }

    fn coordinator(
        dedup: Arc<DedupCache>,
        notifier: Arc<RecordingNotifier>,
        ledger: FakeLedger,
    ) -> Coordinator {
        let config = LedgerConfig::new(
            "http://localhost:8899".parse().unwrap(),
            "ws://localhost:8900".parse().unwrap(),
            DEPLOYER,
        );
        Coordinator::new(dedup, notifier)
            .with_feed(FeedVerifier::new("https://app.test/project/"))
            .with_ledger(
                CandidateFilter::log_marker(DEFAULT_LOG_MARKER),
                LedgerVerifier::new(Arc::new(ledger), &config),
            )
    }

    /// Feed `records` through a fresh coordinator and wait for it to drain.
    async fn run_records(coordinator: Coordinator, records: Vec<RawRecord>) -> StatsSnapshot {
        let (record_tx, record_rx) = raw_record_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(coordinator.run(record_rx, shutdown_rx));
        for record in records {
            record_tx.send(record).await.unwrap();
        }
        drop(record_tx);
        handle.await.unwrap()
    }

    #[tokio::test]
    async fn test_one_notification_per_distinct_event() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let ledger = FakeLedger::default()
            .with_mint("s1", "M1")
            .with_mint("s2", "M2")
            .with_mint("s3", "M1");

        let records = vec![
            feed("a"),
            log("s1"),
            feed("a"),
            log("s2"),
            log("s3"),
            feed("b"),
            log("s1"),
        ];
        let stats = run_records(coordinator(dedup, notifier.clone(), ledger), records).await;

        let mut ids = notifier.ids();
        ids.sort();
        assert_eq!(ids, ["M1", "M2", "a", "b"]);
        assert_eq!(stats.notified, 4);
        assert_eq!(stats.duplicate, 3);
    }

    #[tokio::test]
    async fn test_overlapping_pages_admit_in_first_seen_order() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let records = vec![feed("a"), feed("b"), feed("b"), feed("c")];

        let stats = run_records(
            coordinator(dedup.clone(), notifier.clone(), FakeLedger::default()),
            records,
        )
        .await;

        let admitted: Vec<String> = dedup.snapshot().iter().map(|k| k.id.to_string()).collect();
        assert_eq!(admitted, ["a", "b", "c"]);
        assert_eq!(notifier.ids().len(), 3);
        assert_eq!(stats.duplicate, 1);
    }

    #[tokio::test]
    async fn test_redelivered_signature_notifies_once() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let ledger = FakeLedger::default().with_mint("sig", "M");

        let stats = run_records(
            coordinator(dedup, notifier.clone(), ledger),
            vec![log("sig"), log("sig")],
        )
        .await;

        assert_eq!(notifier.ids(), ["M"]);
        assert_eq!(stats.notified, 1);
        assert_eq!(stats.duplicate, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_observations_race_to_one_admission() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut ledger = FakeLedger::default();
        let mut records = Vec::new();
        for i in 0..32 {
            let sig = format!("sig-{i}");
            ledger = ledger.with_mint(&sig, "SameMint");
            records.push(log(&sig));
        }

        let stats = run_records(coordinator(dedup, notifier.clone(), ledger), records).await;

        assert_eq!(notifier.ids(), ["SameMint"]);
        assert_eq!(stats.notified, 1);
        assert_eq!(stats.duplicate, 31);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_transaction_does_not_block_others() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let ledger = FakeLedger::default()
            .with_slow_miss("slow", Duration::from_secs(60))
            .with_mint("fast", "M");
        let started = Instant::now();

        let coordinator = coordinator(dedup, notifier.clone(), ledger)
            .with_shutdown_grace(Duration::from_secs(120));
        let stats = run_records(coordinator, vec![log("slow"), log("fast")]).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1 - started < Duration::from_secs(60));
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.notified, 1);
    }

    #[tokio::test]
    async fn test_filtered_and_rejected_records() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let unrelated = RawRecord::Ledger(LogsNotification {
            signature: "transfer".to_string(),
            err: None,
            logs: vec!["Program log: Instruction: Transfer".to_string()],
        });
        let records = vec![
            unrelated,
            log("unknown"),
            RawRecord::Feed(json!({ "name": "no key" })),
        ];

        let coordinator = coordinator(dedup, notifier.clone(), FakeLedger::default());
        let stats = run_records(coordinator, records).await;

        assert!(notifier.ids().is_empty());
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.rejected, 2);
    }

    #[tokio::test]
    async fn test_failed_notification_is_not_retried() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });

        let stats = run_records(
            coordinator(dedup.clone(), notifier.clone(), FakeLedger::default()),
            vec![feed("a")],
        )
        .await;
        assert_eq!(stats.failed, 1);
        assert_eq!(dedup.len(), 1);

        // The admission stands: a later observation is a duplicate.
        let stats = run_records(
            coordinator(dedup, notifier.clone(), FakeLedger::default()),
            vec![feed("a")],
        )
        .await;
        assert_eq!(stats.duplicate, 1);
        assert_eq!(notifier.ids(), ["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_hung_delivery_after_grace() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier {
            hang: true,
            ..Default::default()
        });
        let coordinator = coordinator(dedup.clone(), notifier.clone(), FakeLedger::default())
            .with_shutdown_grace(Duration::from_secs(5));

        let (record_tx, record_rx) = raw_record_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(coordinator.run(record_rx, shutdown_rx));

        record_tx.send(feed("a")).await.unwrap();
        while notifier.ids().is_empty() {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(true).unwrap();

        let stats = handle.await.unwrap();
        assert_eq!(stats.notified, 0);
        assert!(!dedup.is_new(&DedupKey {
            source: SourceTag::Api,
            id: crate::events::CanonicalId::new("a").unwrap(),
        }));
    }

    #[tokio::test]
    async fn test_persisted_id_is_not_renotified_after_restart() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seen.json");
        std::fs::write(&path, r#"["X"]"#).unwrap();

        let dedup = Arc::new(DedupCache::open(DedupStore::new(&path)).await.unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let stats = run_records(
            coordinator(dedup, notifier.clone(), FakeLedger::default()),
            vec![feed("X"), feed("Y")],
        )
        .await;

        assert_eq!(notifier.ids(), ["Y"]);
        assert_eq!(stats.duplicate, 1);

        let stored: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, ["X", "Y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_notifications_arrive_in_admission_order() {
        let dedup = Arc::new(DedupCache::in_memory());
        let notifier = Arc::new(RecordingNotifier {
            delays: HashMap::from([("a".to_string(), Duration::from_secs(5))]),
            ..Default::default()
        });

        let stats = run_records(
            coordinator(dedup, notifier.clone(), FakeLedger::default()),
            vec![feed("a"), feed("b"), feed("c")],
        )
        .await;

        assert_eq!(notifier.ids(), ["a", "b", "c"]);
        assert_eq!(stats.notified, 3);
    }

    #[tokio::test]
    async fn test_dedup_save_failure_keeps_admission() {
        let tmp = TempDir::new().unwrap();
        let not_a_dir = tmp.path().join("plain-file");
        std::fs::write(&not_a_dir, "").unwrap();
        let store = DedupStore::new(not_a_dir.join("seen.json"));

        let dedup = Arc::new(DedupCache::with_store(store));
        let notifier = Arc::new(RecordingNotifier::default());
        let stats = run_records(
            coordinator(dedup.clone(), notifier.clone(), FakeLedger::default()),
            vec![feed("a"), feed("a")],
        )
        .await;

        assert_eq!(notifier.ids(), ["a"]);
        assert_eq!(stats.notified, 1);
        assert_eq!(stats.duplicate, 1);
        assert_eq!(dedup.len(), 1);
    }
}
