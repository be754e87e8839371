//! Change-feed subscriptions
//!
//! A subscription starts with the query's result set as one `initial`
//! batch (every order `Added`), then turns committed store events into
//! added/modified/removed changes relative to the query.
//!
//! ```text
//! subscribe(query)
//!     ├─ snapshot @ seq N        → initial batch
//!     └─ broadcast events > N    → classify → batch
//! ```
//!
//! Lag or a closed feed ends the subscription with a [`FeedError`]; the
//! consumer resubscribes and receives a fresh `initial` batch.

use shared::ErrorCode;
use shared::order::{ChangeBatch, ChangeKind, Order, OrderChange, OrderEvent, OrderQuery};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Subscription ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Change feed lagged, {0} events dropped")]
    Lagged(u64),

    #[error("Change feed closed")]
    Closed,
}

impl FeedError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::FeedDisconnected
    }
}

/// Live subscription to one [`OrderQuery`]
pub struct FeedSubscription {
    query: OrderQuery,
    rx: broadcast::Receiver<OrderEvent>,
    initial: Option<ChangeBatch>,
    last_sequence: u64,
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("query", &self.query)
            .field("last_sequence", &self.last_sequence)
            .finish_non_exhaustive()
    }
}

impl FeedSubscription {
    /// Build from a receiver obtained before `snapshot` was read at `sequence`
    pub fn new(
        query: OrderQuery,
        rx: broadcast::Receiver<OrderEvent>,
        snapshot: Vec<Order>,
        sequence: u64,
    ) -> Self {
        let initial = ChangeBatch {
            sequence,
            changes: snapshot
                .into_iter()
                .map(|order| OrderChange {
                    kind: ChangeKind::Added,
                    order,
                })
                .collect(),
            initial: true,
        };
        Self {
            query,
            rx,
            initial: Some(initial),
            last_sequence: sequence,
        }
    }

    pub fn query(&self) -> &OrderQuery {
        &self.query
    }

    /// Sequence the subscriber's view is up to
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Next non-empty batch of changes
    ///
    /// The first call returns the initial snapshot (possibly empty). Events
    /// already queued are coalesced into one batch.
    pub async fn next_batch(&mut self) -> Result<ChangeBatch, FeedError> {
        if let Some(initial) = self.initial.take() {
            return Ok(initial);
        }

        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(n)) => return Err(FeedError::Lagged(n)),
                Err(RecvError::Closed) => return Err(FeedError::Closed),
            };

            let mut batch = ChangeBatch::default();
            self.absorb(event, &mut batch);
            loop {
                match self.rx.try_recv() {
                    Ok(event) => self.absorb(event, &mut batch),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    Err(TryRecvError::Lagged(n)) => return Err(FeedError::Lagged(n)),
                }
            }

            if !batch.is_empty() {
                batch.sequence = self.last_sequence;
                return Ok(batch);
            }
        }
    }

    fn absorb(&mut self, event: OrderEvent, batch: &mut ChangeBatch) {
        // Already covered by the snapshot
        if event.sequence <= self.last_sequence {
            return;
        }
        self.last_sequence = event.sequence;
        if let Some(change) = event.classify(&self.query) {
            batch.changes.push(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{Actor, DeliveryLocation, OrderEventType, OrderStatus};

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

    fn created(sequence: u64, id: &str) -> OrderEvent {
        OrderEvent {
            sequence,
            timestamp: 1,
            actor: Actor::Customer("c1".to_string()),
            event_type: OrderEventType::OrderCreated,
            before: None,
            order: order(id, OrderStatus::Pending),
        }
    }

    #[tokio::test]
    async fn test_initial_then_live_batches() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = FeedSubscription::new(
            OrderQuery::pending_for_shop("s1"),
            rx,
            vec![order("a", OrderStatus::Pending)],
            1,
        );

        let initial = sub.next_batch().await.unwrap();
        assert!(initial.initial);
        assert_eq!(initial.changes.len(), 1);

        // Sequence 1 is already in the snapshot
        tx.send(created(1, "a")).unwrap();
        tx.send(created(2, "b")).unwrap();
        tx.send(created(3, "c")).unwrap();

        let batch = sub.next_batch().await.unwrap();
        assert!(!batch.initial);
        assert_eq!(batch.sequence, 3);
        let (added, modified, removed) = batch.partition();
        let ids: Vec<_> = added.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(modified.is_empty() && removed.is_empty());
    }

    #[tokio::test]
    async fn test_closed_and_lagged() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = FeedSubscription::new(OrderQuery::default(), rx, vec![], 0);
        sub.next_batch().await.unwrap();

        for seq in 1..=5 {
            tx.send(created(seq, &format!("o{seq}"))).unwrap();
        }
        assert!(matches!(sub.next_batch().await, Err(FeedError::Lagged(_))));

        drop(tx);
        let mut drained = 0;
        loop {
            match sub.next_batch().await {
                Ok(_) => drained += 1,
                Err(e) => {
                    assert_eq!(e, FeedError::Closed);
                    break;
                }
            }
        }
        assert!(drained <= 2);
    }
}
