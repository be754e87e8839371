//! Subscription loop shared by the shop listener and the customer tracker
//!
//! ```text
//! loop
//!     ├─ subscribe(query)          fail → Degraded, back off, retry
//!     ├─ initial batch             → Live, reset backoff
//!     ├─ batches → handler
//!     └─ Lagged / Closed           → Degraded, resubscribe
//! ```

use super::{Connectivity, ReconnectPolicy};
use crate::orders::store::OrderStore;
use async_trait::async_trait;
use shared::order::{ChangeBatch, OrderQuery};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Consumer of a subscription's batches
#[async_trait]
pub(crate) trait BatchHandler: Send + 'static {
    /// `batch.initial` marks a fresh snapshot after (re)subscribing
    async fn handle(&mut self, batch: ChangeBatch, shutdown: &CancellationToken);
}

pub(crate) struct FeedRunner<H> {
    pub(crate) name: &'static str,
    pub(crate) store: Arc<dyn OrderStore>,
    pub(crate) query: OrderQuery,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) connectivity: watch::Sender<Connectivity>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) handler: H,
}

impl<H: BatchHandler> FeedRunner<H> {
    pub(crate) async fn run(mut self) {
        tracing::info!(listener = self.name, query = ?self.query, "Feed listener started");
        let mut delay = self.policy.base;
        let mut attempt = 0u32;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let subscribed = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.store.subscribe(self.query.clone()) => result,
            };

            let reason = match subscribed {
                Ok(mut subscription) => {
                    let ended = loop {
                        let next = tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => None,
                            result = subscription.next_batch() => Some(result),
                        };
                        match next {
                            None => break None,
                            Some(Ok(batch)) => {
                                if batch.initial {
                                    if attempt > 0 {
                                        tracing::info!(listener = self.name, attempts = attempt, "Feed resubscribed");
                                    }
                                    attempt = 0;
                                    delay = self.policy.base;
                                    self.connectivity.send_replace(Connectivity::Live);
                                }
                                self.handler.handle(batch, &self.shutdown).await;
                            }
                            Some(Err(e)) => break Some(e.to_string()),
                        }
                    };
                    match ended {
                        Some(reason) => reason,
                        None => break,
                    }
                }
                Err(e) => e.to_string(),
            };

            attempt += 1;
            tracing::warn!(listener = self.name, attempt, reason = %reason, "Feed subscription lost");
            self.connectivity.send_replace(Connectivity::Degraded { attempt, reason });

            // First retry after a live session is immediate
            if attempt > 1 {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {},
                }
                delay = self.policy.next(delay);
            }
        }

        self.connectivity.send_replace(Connectivity::Stopped);
        tracing::info!(listener = self.name, "Feed listener stopped");
    }
}
