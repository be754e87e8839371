//! Customer Order Tracker
//!
//! Read-only live list of one customer's orders. Statuses come from the
//! store only; nothing is inferred locally.

use super::runner::{BatchHandler, FeedRunner};
use super::view::LiveView;
use super::{Connectivity, ReconnectPolicy};
use crate::orders::store::OrderStore;
use async_trait::async_trait;
use shared::order::{ChangeBatch, Order, OrderQuery, OrderStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TrackerBatchHandler {
    view: LiveView,
}

#[async_trait]
impl BatchHandler for TrackerBatchHandler {
    async fn handle(&mut self, batch: ChangeBatch, _shutdown: &CancellationToken) {
        self.view.apply(&batch);
        self.view.publish();
    }
}

#[derive(Clone)]
pub struct CustomerOrderTracker {
    store: Arc<dyn OrderStore>,
    policy: ReconnectPolicy,
}

impl CustomerOrderTracker {
    pub fn new(store: Arc<dyn OrderStore>, policy: ReconnectPolicy) -> Self {
        Self { store, policy }
    }

    pub fn watch(&self, customer_id: impl Into<String>) -> TrackerHandle {
        let customer_id = customer_id.into();
        let shutdown = CancellationToken::new();
        let (view, orders) = LiveView::new();
        let (connectivity_tx, connectivity) = watch::channel(Connectivity::Connecting);

        let task = tokio::spawn(
            FeedRunner {
                name: "customer",
                store: self.store.clone(),
                query: OrderQuery::for_customer(customer_id.clone()),
                policy: self.policy,
                connectivity: connectivity_tx,
                shutdown: shutdown.clone(),
                handler: TrackerBatchHandler { view },
            }
            .run(),
        );

        TrackerHandle {
            customer_id,
            shutdown,
            task: Some(task),
            orders,
            connectivity,
        }
    }
}

pub struct TrackerHandle {
    customer_id: String,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    orders: watch::Receiver<Vec<Order>>,
    connectivity: watch::Receiver<Connectivity>,
}

impl TrackerHandle {
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// Customer's orders, newest first
    pub fn orders(&self) -> Vec<Order> {
        self.orders.borrow().clone()
    }

    /// Status from the live view
    pub fn status_of(&self, order_id: &str) -> Option<OrderStatus> {
        self.orders
            .borrow()
            .iter()
            .find(|o| o.order_id == order_id)
            .map(|o| o.status)
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

    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::error!(customer_id = %self.customer_id, error = %e, "Order tracker task failed");
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
