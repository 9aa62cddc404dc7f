//! Assembles the sources, the coordinator and the notifier into one running
//! pipeline controlled by a single stop signal.

use std::sync::Arc;

use mintwatch_sdk::client::{FeedClient, PubsubClient, RpcClient, WebhookClient, http_client};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::events::raw_record_channel;
use crate::processors::{
    CandidateFilter, Coordinator, DedupCache, DedupStore, DiscordNotifier, FeedVerifier,
    LedgerVerifier, Notifier, PipelineStats, PollSource, StatsSnapshot, SubscriptionSource,
};
use crate::sources::{FeedSource, LedgerSource, SolanaLedger};

/// A running pipeline.
pub struct Pipeline {
    shutdown_tx: watch::Sender<bool>,
    sources: Vec<JoinHandle<()>>,
    coordinator: JoinHandle<StatsSnapshot>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Build the production adapters from `config` and start everything.
    pub async fn from_config(config: PipelineConfig) -> Self {
        let dedup = Arc::new(open_dedup(&config).await);
        let http = http_client(config.request_timeout);

        let webhook =
            WebhookClient::new(config.notifier.webhook_url.clone()).with_http_client(http.clone());
        let notifier: Arc<dyn Notifier> =
            Arc::new(DiscordNotifier::with_client(webhook, config.notifier.clone()));
        let feed = config.feed.as_ref().map(|feed| {
            let client = FeedClient::new(feed.endpoint.clone()).with_http_client(http.clone());
            Arc::new(client) as Arc<dyn FeedSource>
        });
        let ledger = config.ledger.as_ref().map(|ledger| {
            let rpc = RpcClient::new(ledger.rpc_url.clone()).with_http_client(http.clone());
            let pubsub = PubsubClient::new(ledger.ws_url.clone());
            Arc::new(SolanaLedger::with_clients(rpc, pubsub)) as Arc<dyn LedgerSource>
        });

        Self::start(&config, feed, ledger, notifier, dedup)
    }

    /// Start with the given adapters. A source runs only if both its config
    /// section and its adapter are present.
    pub fn start(
        config: &PipelineConfig,
        feed: Option<Arc<dyn FeedSource>>,
        ledger: Option<Arc<dyn LedgerSource>>,
        notifier: Arc<dyn Notifier>,
        dedup: Arc<DedupCache>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (record_tx, record_rx) = raw_record_channel();

        let mut coordinator =
            Coordinator::new(dedup, notifier).with_shutdown_grace(config.shutdown_grace);
        let mut sources = Vec::new();

        if let (Some(feed_config), Some(feed)) = (&config.feed, feed) {
            info!(endpoint = %feed_config.endpoint, "Feed source enabled");
            coordinator =
                coordinator.with_feed(FeedVerifier::new(feed_config.project_link_base.clone()));
            let source = PollSource::new(feed, feed_config);
            sources.push(tokio::spawn(
                source.run(record_tx.clone(), shutdown_rx.clone()),
            ));
        }

        if let (Some(ledger_config), Some(ledger)) = (&config.ledger, ledger) {
            info!(deployer = %ledger_config.deployer, "Ledger source enabled");
            coordinator = coordinator.with_ledger(
                CandidateFilter::log_marker(ledger_config.criteria.log_marker.clone()),
                LedgerVerifier::new(ledger.clone(), ledger_config),
            );
            let source = SubscriptionSource::new(ledger, ledger_config);
            sources.push(tokio::spawn(
                source.run(record_tx.clone(), shutdown_rx.clone()),
            ));
        }

        if sources.is_empty() {
            warn!("No sources enabled; the pipeline will stop immediately");
        }
        // Only the sources hold senders now.
        drop(record_tx);

        let stats = coordinator.stats();
        let coordinator = tokio::spawn(coordinator.run(record_rx, shutdown_rx));

        Self {
            shutdown_tx,
            sources,
            coordinator,
            stats,
        }
    }

    /// Live totals.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Ask every task to stop. Returns immediately; use [`join`](Self::join)
    /// to wait.
    pub fn shutdown(&self) {
        // Err only when every receiver is gone, i.e. everything has stopped.
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the sources and the coordinator to finish.
    pub async fn join(self) -> StatsSnapshot {
        for source in self.sources {
            if let Err(e) = source.await {
                error!(error = %e, "Source task failed");
            }
        }
        match self.coordinator.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Coordinator task failed");
                self.stats.snapshot()
            }
        }
    }
}

/// Load the dedup set. A broken file is moved aside and replaced by an
/// empty set.
async fn open_dedup(config: &PipelineConfig) -> DedupCache {
    let Some(path) = &config.dedup_path else {
        info!("No dedup file configured, dedup set is in memory only");
        return DedupCache::in_memory();
    };
    let store = DedupStore::new(path);
    match DedupCache::open(store.clone()).await {
        Ok(cache) => cache,
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                "Failed to load dedup file, starting empty"
            );
            match store.set_aside().await {
                Ok(moved) => warn!(moved_to = %moved.display(), "Unreadable dedup file kept"),
                Err(e) => error!(error = %e, "Failed to move unreadable dedup file aside"),
            }
            DedupCache::with_store(store)
        }
    }
}
