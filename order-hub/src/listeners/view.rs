//! Live result set published to the UI

use shared::order::{ChangeBatch, ChangeKind, Order, OrderQuery};
use std::collections::HashMap;
use tokio::sync::watch;

pub(crate) struct LiveView {
    orders: HashMap<String, Order>,
    tx: watch::Sender<Vec<Order>>,
}

impl LiveView {
    pub(crate) fn new() -> (Self, watch::Receiver<Vec<Order>>) {
        let (tx, rx) = watch::channel(Vec::new());
        (
            Self {
                orders: HashMap::new(),
                tx,
            },
            rx,
        )
    }

    /// Fold a batch in; an `initial` batch replaces the whole view
    pub(crate) fn apply(&mut self, batch: &ChangeBatch) {
        if batch.initial {
            self.orders.clear();
        }
        for change in &batch.changes {
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    self.orders
                        .insert(change.order.order_id.clone(), change.order.clone());
                }
                ChangeKind::Removed => {
                    self.orders.remove(&change.order.order_id);
                }
            }
        }
    }

    pub(crate) fn contains(&self, order_id: &str) -> bool {
        self.orders.contains_key(order_id)
    }

    /// Send the sorted view to watchers
    pub(crate) fn publish(&self) {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        OrderQuery::sort(&mut orders);
        self.tx.send_replace(orders);
    }
}
