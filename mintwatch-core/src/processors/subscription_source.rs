//! SubscriptionSource processor.
//!
//! Holds one log subscription filtered server-side to the deployer and
//! forwards each notification as a [`RawRecord::Ledger`]. A frame that fails
//! to decode is logged and skipped without touching the subscription. When
//! the stream ends or cannot be opened, the source waits
//! `resubscribe_delay` and subscribes again.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use mintwatch_sdk::objects::ledger::Commitment;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::wait_for_shutdown;
use crate::config::LedgerConfig;
use crate::events::{RawRecord, RawRecordSender};
use crate::sources::LedgerSource;

pub struct SubscriptionSource {
    ledger: Arc<dyn LedgerSource>,
    deployer: String,
    commitment: Commitment,
    resubscribe_delay: Duration,
}

impl SubscriptionSource {
    pub fn new(ledger: Arc<dyn LedgerSource>, config: &LedgerConfig) -> Self {
        Self {
            ledger,
            deployer: config.deployer.clone(),
            commitment: config.subscribe_commitment,
            resubscribe_delay: config.resubscribe_delay,
        }
    }

    /// Run until shutdown is signaled or the coordinator hangs up. The
    /// subscription is dropped, and so released, on return.
    pub async fn run(self, record_tx: RawRecordSender, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            deployer = %self.deployer,
            commitment = %self.commitment,
            "SubscriptionSource started"
        );

        'subscription: loop {
            let subscribed = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown_rx) => break 'subscription,
                subscribed = self.ledger.subscribe(&self.deployer, self.commitment) => subscribed,
            };

            match subscribed {
                Ok(mut stream) => loop {
                    tokio::select! {
                        biased;

                        _ = wait_for_shutdown(&mut shutdown_rx) => {
                            info!("SubscriptionSource received shutdown signal");
                            break 'subscription;
                        }

                        next = stream.next() => match next {
                            Some(Ok(notification)) => {
                                let signature = &notification.signature;
                                debug!(%signature, "Log notification received");
                                if record_tx.send(RawRecord::Ledger(notification)).await.is_err() {
                                    info!("Record channel closed, stopping SubscriptionSource");
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "Skipping undecodable log notification");
                            }
                            None => {
                                warn!("Log subscription ended");
                                break;
                            }
                        }
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Failed to open log subscription");
                }
            }

            info!(
                delay_ms = self.resubscribe_delay.as_millis() as u64,
                "Resubscribing after delay"
            );
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown_rx) => break 'subscription,
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
            }
        }

        info!("SubscriptionSource shutdown complete");
    }
}
