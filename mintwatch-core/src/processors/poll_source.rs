//! PollSource processor.
//!
//! Reads the most recent page of the curation feed on a fixed interval and
//! forwards every item as a [`RawRecord::Feed`]. A failed fetch yields
//! nothing for that tick; the next tick is the retry. Ticks never overlap:
//! a tick that falls due while a fetch is still running is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::wait_for_shutdown;
use crate::config::FeedConfig;
use crate::events::{RawRecord, RawRecordSender};
use crate::sources::FeedSource;

pub struct PollSource {
    feed: Arc<dyn FeedSource>,
    interval: Duration,
    page_size: usize,
}

impl PollSource {
    pub fn new(feed: Arc<dyn FeedSource>, config: &FeedConfig) -> Self {
        Self {
            feed,
            interval: config.poll_interval,
            page_size: config.page_size,
        }
    }

    /// Run until shutdown is signaled or the coordinator hangs up.
    pub async fn run(self, record_tx: RawRecordSender, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            page_size = self.page_size,
            "PollSource started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("PollSource received shutdown signal");
                    break;
                }

                due = ticker.tick() => {
                    // An in-flight fetch is abandoned on shutdown.
                    let fetched = tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown_rx) => {
                            info!("PollSource received shutdown signal during fetch");
                            break;
                        }
                        fetched = self.feed.fetch_latest(self.page_size) => fetched,
                    };
                    self.skip_missed_ticks(&mut ticker, due);

                    let items = match fetched {
                        Ok(items) => items,
                        Err(e) => {
                            warn!(error = %e, "Feed poll failed, retrying next tick");
                            continue;
                        }
                    };

                    debug!(items = items.len(), "Feed poll returned");
                    for item in items {
                        if record_tx.send(RawRecord::Feed(item)).await.is_err() {
                            info!("Record channel closed, stopping PollSource");
                            return;
                        }
                    }
                }
            }
        }

        info!("PollSource shutdown complete");
    }

    /// Drop every tick that fell due while the fetch started at `due` was
    /// running, so the next fetch starts on the following period boundary.
    fn skip_missed_ticks(&self, ticker: &mut Interval, due: Instant) {
        let now = Instant::now();
        let mut next = due + self.interval;
        if next > now {
            return;
        }
        while next <= now {
            next += self.interval;
        }
        warn!(
            elapsed_ms = (now - due).as_millis() as u64,
            interval_ms = self.interval.as_millis() as u64,
            "Feed poll outlasted the interval, skipping missed ticks"
        );
        ticker.reset_at(next);
    }
}
