//! Shop-side change-feed subscriber
//!
//! Keeps the shop's pending queue live and raises exactly one new-order
//! notification per order that enters the queue after `start`.
//!
//! # Seen set
//!
//! Every pending order id the listener has accounted for goes into `seen`.
//! `start` pins the store sequence before spawning; the first snapshot
//! announces only orders written after that point, so orders already
//! waiting at start stay silent while orders created before the feed came
//! up are not lost. A snapshot taken after a resubscribe announces only
//! ids missing from `seen`. Ids leave `seen` once their order leaves the
//! pending queue; orders never return to `pending`, so a pruned id can't be
//! announced again.

use super::runner::{BatchHandler, FeedRunner};
use super::view::LiveView;
use super::{Connectivity, ReconnectPolicy};
use crate::orders::store::OrderStore;
use crate::services::notification::Notifier;
use async_trait::async_trait;
use shared::order::{ChangeBatch, ChangeKind, Order, OrderQuery};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct ShopBatchHandler {
    shop_id: String,
    notifier: Notifier,
    seen: HashSet<String>,
    /// Store sequence at `start`; `None` if it could not be read
    started_after: Option<u64>,
    primed: bool,
    view: LiveView,
}

impl ShopBatchHandler {
    fn new(shop_id: String, notifier: Notifier, started_after: Option<u64>, view: LiveView) -> Self {
        Self {
            shop_id,
            notifier,
            seen: HashSet::new(),
            started_after,
            primed: false,
            view,
        }
    }

    async fn announce(&self, order: &Order, shutdown: &CancellationToken) {
        if shutdown.is_cancelled() {
            return;
        }
        tracing::info!(shop_id = %self.shop_id, order_id = %order.order_id, "New pending order");
        self.notifier.new_pending_order(order).await;
    }
}

#[async_trait]
impl BatchHandler for ShopBatchHandler {
    async fn handle(&mut self, batch: ChangeBatch, shutdown: &CancellationToken) {
        self.view.apply(&batch);
        self.view.publish();

        let mut fresh = Vec::new();
        if batch.initial {
            let first = !self.primed;
            self.primed = true;
            for change in &batch.changes {
                let order = &change.order;
                if !order.is_pending() || !self.seen.insert(order.order_id.clone()) {
                    continue;
                }
                if !first || self.started_after.is_some_and(|seq| order.sequence > seq) {
                    fresh.push(order.clone());
                }
            }
            let view = &self.view;
            self.seen.retain(|id| view.contains(id));
            if first {
                tracing::debug!(
                    shop_id = %self.shop_id,
                    pending = self.seen.len(),
                    new_since_start = fresh.len(),
                    "Seeded pending queue"
                );
            } else if !fresh.is_empty() {
                tracing::info!(shop_id = %self.shop_id, missed = fresh.len(), "Catching up on orders missed while disconnected");
            }
        } else {
            for change in &batch.changes {
                match change.kind {
                    ChangeKind::Added if change.order.is_pending() => {
                        if self.seen.insert(change.order.order_id.clone()) {
                            fresh.push(change.order.clone());
                        }
                    }
                    ChangeKind::Removed => {
                        self.seen.remove(&change.order.order_id);
                    }
                    _ => {}
                }
            }
        }

        for order in &fresh {
            self.announce(order, shutdown).await;
        }
    }
}

/// Factory for per-shop listeners
#[derive(Clone)]
pub struct ShopOrderListener {
    store: Arc<dyn OrderStore>,
    notifier: Notifier,
    policy: ReconnectPolicy,
}

impl ShopOrderListener {
    pub fn new(store: Arc<dyn OrderStore>, notifier: Notifier, policy: ReconnectPolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// Subscribe to the shop's pending queue
    pub fn start(&self, shop_id: impl Into<String>) -> ShopListenerHandle {
        let shop_id = shop_id.into();
        let started_after = match self.store.committed_sequence() {
            Ok(sequence) => Some(sequence),
            Err(e) => {
                tracing::warn!(
                    shop_id = %shop_id,
                    error = %e,
                    "Store sequence unavailable, first snapshot will be seeded silently"
                );
                None
            }
        };
        let shutdown = CancellationToken::new();
        let (view, orders) = LiveView::new();
        let (connectivity_tx, connectivity) = watch::channel(Connectivity::Connecting);

        let runner = FeedRunner {
            name: "shop",
            store: self.store.clone(),
            query: OrderQuery::pending_for_shop(shop_id.clone()),
            policy: self.policy,
            connectivity: connectivity_tx,
            shutdown: shutdown.clone(),
            handler: ShopBatchHandler::new(
                shop_id.clone(),
                self.notifier.clone(),
                started_after,
                view,
            ),
        };
        let task = tokio::spawn(runner.run());

        ShopListenerHandle {
            shop_id,
            shutdown,
            task: Some(task),
            orders,
            connectivity,
        }
    }
}

/// Running shop listener
///
/// Dropping the handle cancels the listener without waiting for it.
pub struct ShopListenerHandle {
    shop_id: String,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    orders: watch::Receiver<Vec<Order>>,
    connectivity: watch::Receiver<Connectivity>,
}

impl ShopListenerHandle {
    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    /// Pending queue, newest first
    pub fn pending_orders(&self) -> Vec<Order> {
        self.orders.borrow().clone()
    }

    pub fn watch_orders(&self) -> watch::Receiver<Vec<Order>> {
        self.orders.clone()
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.borrow().clone()
    }

    pub fn watch_connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.clone()
    }

    /// Wait until the subscription is live (or the listener stopped)
    pub async fn wait_live(&self) -> Connectivity {
        let mut rx = self.connectivity.clone();
        match rx
            .wait_for(|c| matches!(c, Connectivity::Live | Connectivity::Stopped))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => Connectivity::Stopped,
        }
    }

    /// Stop the listener; no notification is raised once this returns
    ///
    /// Calling it again is a no-op.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::error!(shop_id = %self.shop_id, error = %e, "Shop listener task failed");
        }
    }
}

impl Drop for ShopListenerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notification::{NotificationSurface, NotifyError};
    use parking_lot::Mutex;
    use shared::order::{DeliveryLocation, OrderChange, OrderStatus};

    #[derive(Default)]
    struct Recording {
        modals: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSurface for Recording {
        async fn play_alert(&self, _order: &Order) -> Result<(), NotifyError> {
            Ok(())
        }
        async fn show_modal(&self, order: &Order) {
            self.modals.lock().push(order.order_id.clone());
        }
    }

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            order_id: id.to_string(),
            submission_id: format!("sub-{id}"),
            customer_id: "c1".to_string(),
            customer_name: "Ayesha".to_string(),
            customer_phone: None,
            shop_id: "s1".to_string(),
            shop_name: "Loom House".to_string(),
            items: vec![],
            subtotal: 0.0,
            delivery_fee: 0.0,
            total_amount: 0.0,
            status,
            status_reason: None,
            delivery_location: DeliveryLocation::new(0.0, 0.0),
            created_at: 1,
            updated_at: 1,
            accepted_at: None,
            expires_at: 300_001,
            version: 0,
            sequence: 0,
        }
    }

    fn batch(initial: bool, changes: Vec<(ChangeKind, &str)>) -> ChangeBatch {
        ChangeBatch {
            sequence: 0,
            initial,
            changes: changes
                .into_iter()
                .map(|(kind, id)| OrderChange {
                    kind,
                    order: order(
                        id,
                        if kind == ChangeKind::Removed {
                            OrderStatus::Confirmed
                        } else {
                            OrderStatus::Pending
                        },
                    ),
                })
                .collect(),
        }
    }

    fn handler() -> (ShopBatchHandler, Arc<Recording>, watch::Receiver<Vec<Order>>) {
        let surface = Arc::new(Recording::default());
        let (view, rx) = LiveView::new();
        let handler =
            ShopBatchHandler::new("s1".to_string(), Notifier::new(surface.clone()), Some(0), view);
        (handler, surface, rx)
    }

    #[tokio::test]
    async fn test_seen_set_across_resubscribe() {
        let (mut handler, surface, view) = handler();
        let token = CancellationToken::new();
        use ChangeKind::*;

        // Pending at start: silent
        handler.handle(batch(true, vec![(Added, "a")]), &token).await;
        assert!(surface.modals.lock().is_empty());

        handler.handle(batch(false, vec![(Added, "b")]), &token).await;
        // Replayed add for a seen id
        handler.handle(batch(false, vec![(Added, "b")]), &token).await;
        assert_eq!(*surface.modals.lock(), vec!["b"]);

        // Resubscribe: "c" arrived while disconnected, "a" was accepted meanwhile
        handler
            .handle(batch(true, vec![(Added, "b"), (Added, "c")]), &token)
            .await;
        assert_eq!(*surface.modals.lock(), vec!["b", "c"]);
        assert!(!handler.seen.contains("a"));

        handler.handle(batch(false, vec![(Removed, "b")]), &token).await;
        let ids: Vec<_> = view.borrow().iter().map(|o| o.order_id.clone()).collect();
        assert_eq!(ids, vec!["c"]);
        assert_eq!(handler.seen.len(), 1);
    }

    #[tokio::test]
    async fn test_no_announcement_after_cancel() {
        let (mut handler, surface, _view) = handler();
        let token = CancellationToken::new();
        handler.handle(batch(true, vec![]), &token).await;

        token.cancel();
        handler
            .handle(batch(false, vec![(ChangeKind::Added, "late")]), &token)
            .await;
        assert!(surface.modals.lock().is_empty());
    }

    #[tokio::test]
    async fn test_first_snapshot_announces_orders_written_after_start() {
        let surface = Arc::new(Recording::default());
        let (view, _rx) = LiveView::new();
        let mut handler =
            ShopBatchHandler::new("s1".to_string(), Notifier::new(surface.clone()), Some(4), view);
        let token = CancellationToken::new();

        let mut first = batch(true, vec![(ChangeKind::Added, "waiting"), (ChangeKind::Added, "raced")]);
        first.changes[0].order.sequence = 3;
        first.changes[1].order.sequence = 5;
        handler.handle(first, &token).await;
        assert_eq!(*surface.modals.lock(), vec!["raced"]);

        // The live event for the same order is a replay
        let mut replay = batch(false, vec![(ChangeKind::Added, "raced")]);
        replay.changes[0].order.sequence = 5;
        handler.handle(replay, &token).await;
        assert_eq!(*surface.modals.lock(), vec!["raced"]);
    }

    #[tokio::test]
    async fn test_unknown_start_point_seeds_silently() {
        let surface = Arc::new(Recording::default());
        let (view, _rx) = LiveView::new();
        let mut handler =
            ShopBatchHandler::new("s1".to_string(), Notifier::new(surface.clone()), None, view);
        let mut first = batch(true, vec![(ChangeKind::Added, "a")]);
        first.changes[0].order.sequence = 9;
        handler.handle(first, &CancellationToken::new()).await;
        assert!(surface.modals.lock().is_empty());
    }
}
