//! Order Store
//!
//! [`OrderStore`] is the seam between the coordination logic and the
//! persistence technology. [`LocalOrderStore`] backs it with redb tables and
//! an in-process `broadcast` change feed.
//!
//! Commits and their broadcast happen under one lock, so subscribers see
//! events in commit order and a subscription's snapshot never races a
//! commit.

use super::feed::FeedSubscription;
use super::storage::{CreateOutcome, OrderStorage, StorageError};
use crate::utils::Transient;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared::ErrorCode;
use shared::order::{
    Actor, CartLine, DeliveryLocation, Order, OrderEvent, OrderEventType, OrderQuery, OrderStatus,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Committed write as carried on the change feed
pub type StoreEvent = OrderEvent;

/// Default change-feed capacity
pub const DEFAULT_FEED_CAPACITY: usize = 4096;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {} was modified concurrently (now {})", current.order_id, current.status)]
    Conflict { current: Box<Order> },

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OrderNotFound(id) => StoreError::OrderNotFound(id),
            StorageError::Conflict { current } => StoreError::Conflict { current },
            other => StoreError::Storage(other),
        }
    }
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            StoreError::Conflict { .. } => ErrorCode::OrderConflict,
            StoreError::Storage(e) if e.is_corrupted() => ErrorCode::StorageCorrupted,
            StoreError::Storage(_) => ErrorCode::SystemBusy,
            StoreError::Unavailable(_) => ErrorCode::StoreUnavailable,
            StoreError::Join(_) => ErrorCode::InternalError,
        }
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Storage(e) => !e.is_corrupted(),
            StoreError::OrderNotFound(_) | StoreError::Conflict { .. } | StoreError::Join(_) => {
                false
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Order fields supplied by submission; the store assigns id and version
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub submission_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub shop_id: String,
    pub shop_name: String,
    pub items: Vec<CartLine>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub delivery_location: DeliveryLocation,
    pub created_at: i64,
    pub expires_at: i64,
}

impl NewOrder {
    pub fn into_order(self, order_id: String) -> Order {
        Order {
            order_id,
            submission_id: self.submission_id,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            shop_id: self.shop_id,
            shop_name: self.shop_name,
            items: self.items,
            subtotal: self.subtotal,
            delivery_fee: self.delivery_fee,
            total_amount: self.total_amount,
            status: OrderStatus::Pending,
            status_reason: None,
            delivery_location: self.delivery_location,
            created_at: self.created_at,
            updated_at: self.created_at,
            accepted_at: None,
            expires_at: self.expires_at,
            version: 0,
            sequence: 0,
        }
    }
}

/// Compare-and-swap status write
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub order_id: String,
    /// Version the caller validated against
    pub expected_version: u64,
    pub status: OrderStatus,
    pub updated_at: i64,
    /// Set only when the write accepts the order
    pub accepted_at: Option<i64>,
    pub status_reason: Option<String>,
    pub actor: Actor,
}

impl StatusUpdate {
    fn apply(&self, order: &mut Order) {
        order.status = self.status;
        order.updated_at = self.updated_at;
        if let Some(accepted_at) = self.accepted_at {
            order.accepted_at = Some(accepted_at);
        }
        if let Some(reason) = &self.status_reason {
            order.status_reason = Some(reason.clone());
        }
    }
}

/// Durable, subscribable order collection
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Atomically create an order
    ///
    /// Re-sending a `submission_id` returns the order created the first time.
    async fn create(&self, new_order: NewOrder) -> StoreResult<Order>;

    /// Atomically apply a status write if the order is still at the expected version
    async fn update_status(&self, update: StatusUpdate) -> StoreResult<Order>;

    async fn get(&self, order_id: &str) -> StoreResult<Option<Order>>;

    /// Matching orders, newest first
    async fn query(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;

    /// Continuous subscription to a query's result set
    async fn subscribe(&self, query: OrderQuery) -> StoreResult<FeedSubscription>;

    /// Sequence of the last committed write
    ///
    /// Synchronous so a listener can pin its start point before spawning.
    fn committed_sequence(&self) -> StoreResult<u64>;
}

/// redb-backed store with an in-process change feed
#[derive(Clone)]
pub struct LocalOrderStore {
    storage: OrderStorage,
    feed: Arc<RwLock<broadcast::Sender<OrderEvent>>>,
    commit_lock: Arc<Mutex<()>>,
    capacity: usize,
}

impl std::fmt::Debug for LocalOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalOrderStore")
            .field("storage", &"<OrderStorage>")
            .field("feed", &"<broadcast::Sender>")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl LocalOrderStore {
    pub fn new(storage: OrderStorage, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            storage,
            feed: Arc::new(RwLock::new(tx)),
            commit_lock: Arc::new(Mutex::new(())),
            capacity,
        }
    }

    /// In-memory store with the default feed capacity
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self::new(
            OrderStorage::open_in_memory()?,
            DEFAULT_FEED_CAPACITY,
        ))
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    /// Replace the change feed
    ///
    /// Every open subscription ends with `FeedError::Closed` and must
    /// resubscribe. Used when the feed is rebuilt after a fault.
    pub fn restart_feed(&self) {
        let _guard = self.commit_lock.lock();
        let (tx, _) = broadcast::channel(self.capacity);
        *self.feed.write() = tx;
        tracing::info!("Order change feed restarted");
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.feed.read().receiver_count()
    }

    fn publish(&self, event: OrderEvent) {
        // No receivers is fine: nobody is listening yet
        let _ = self.feed.read().send(event);
    }
}

#[async_trait]
impl OrderStore for LocalOrderStore {
    async fn create(&self, new_order: NewOrder) -> StoreResult<Order> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<Order> {
            let order = new_order.into_order(uuid::Uuid::new_v4().to_string());
            let _guard = this.commit_lock.lock();
            match this.storage.create_order(order)? {
                CreateOutcome::Created { order, sequence } => {
                    tracing::info!(
                        order_id = %order.order_id,
                        shop_id = %order.shop_id,
                        customer_id = %order.customer_id,
                        sequence,
                        "Order created"
                    );
                    this.publish(OrderEvent {
                        sequence,
                        timestamp: order.created_at,
                        actor: Actor::Customer(order.customer_id.clone()),
                        event_type: OrderEventType::OrderCreated,
                        before: None,
                        order: order.clone(),
                    });
                    Ok(order)
                }
                CreateOutcome::Duplicate(order) => {
                    tracing::info!(
                        order_id = %order.order_id,
                        submission_id = %order.submission_id,
                        "Duplicate submission, returning existing order"
                    );
                    Ok(order)
                }
            }
        })
        .await?
    }

    async fn update_status(&self, update: StatusUpdate) -> StoreResult<Order> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<Order> {
            let _guard = this.commit_lock.lock();
            let outcome = this
                .storage
                .update_if_version(&update.order_id, update.expected_version, |order| {
                    update.apply(order)
                })?;
            tracing::info!(
                order_id = %update.order_id,
                from = %outcome.before.status,
                to = %outcome.after.status,
                actor = %update.actor.label(),
                sequence = outcome.sequence,
                "Order status changed"
            );
            this.publish(OrderEvent {
                sequence: outcome.sequence,
                timestamp: update.updated_at,
                actor: update.actor,
                event_type: OrderEventType::StatusChanged {
                    from: outcome.before.status,
                    to: outcome.after.status,
                },
                before: Some(outcome.before),
                order: outcome.after.clone(),
            });
            Ok(outcome.after)
        })
        .await?
    }

    async fn get(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let storage = self.storage.clone();
        let order_id = order_id.to_string();
        Ok(tokio::task::spawn_blocking(move || storage.get_order(&order_id)).await??)
    }

    async fn query(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let storage = self.storage.clone();
        let query = query.clone();
        let (orders, _) = tokio::task::spawn_blocking(move || storage.query(&query)).await??;
        Ok(orders)
    }

    async fn subscribe(&self, query: OrderQuery) -> StoreResult<FeedSubscription> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<FeedSubscription> {
            let _guard = this.commit_lock.lock();
            let rx = this.feed.read().subscribe();
            let (snapshot, sequence) = this.storage.query(&query)?;
            tracing::debug!(?query, sequence, initial = snapshot.len(), "Feed subscription opened");
            Ok(FeedSubscription::new(query, rx, snapshot, sequence))
        })
        .await?
    }

    fn committed_sequence(&self) -> StoreResult<u64> {
        Ok(self.storage.current_sequence()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::ChangeKind;

    fn new_order(submission_id: &str, shop: &str, created_at: i64) -> NewOrder {
        NewOrder {
            submission_id: submission_id.to_string(),
            customer_id: "c1".to_string(),
            customer_name: "Ayesha".to_string(),
            customer_phone: None,
            shop_id: shop.to_string(),
            shop_name: "Loom House".to_string(),
            items: vec![],
            subtotal: 1200.0,
            delivery_fee: 150.0,
            total_amount: 1350.0,
            delivery_location: DeliveryLocation::new(24.86, 67.0),
            created_at,
            expires_at: created_at + 300_000,
        }
    }

    fn confirm(order: &Order, at: i64) -> StatusUpdate {
        StatusUpdate {
            order_id: order.order_id.clone(),
            expected_version: order.version,
            status: OrderStatus::Confirmed,
            updated_at: at,
            accepted_at: Some(at),
            status_reason: None,
            actor: Actor::Shop(order.shop_id.clone()),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_uuid_and_is_idempotent() {
        let store = LocalOrderStore::in_memory().unwrap();
        let first = store.create(new_order("sub-1", "s1", 10)).await.unwrap();
        assert!(uuid::Uuid::parse_str(&first.order_id).is_ok());
        assert_eq!(first.status, OrderStatus::Pending);

        let again = store.create(new_order("sub-1", "s1", 99)).await.unwrap();
        assert_eq!(again, first);
        assert_eq!(store.query(&OrderQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_one_wins() {
        let store = LocalOrderStore::in_memory().unwrap();
        let order = store.create(new_order("sub-1", "s1", 10)).await.unwrap();

        let (a, b) = tokio::join!(
            store.update_status(confirm(&order, 20)),
            store.update_status(confirm(&order, 21)),
        );
        let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        let loser = if a.is_err() { a } else { b };
        match loser {
            Err(StoreError::Conflict { current }) => {
                assert_eq!(current.status, OrderStatus::Confirmed)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscription_sees_commits_in_order() {
        let store = LocalOrderStore::in_memory().unwrap();
        let existing = store.create(new_order("sub-0", "s1", 5)).await.unwrap();

        let mut sub = store
            .subscribe(OrderQuery::pending_for_shop("s1"))
            .await
            .unwrap();
        let initial = sub.next_batch().await.unwrap();
        assert!(initial.initial);
        assert_eq!(initial.changes[0].order.order_id, existing.order_id);

        store.create(new_order("sub-1", "s1", 10)).await.unwrap();
        store.create(new_order("sub-x", "s2", 11)).await.unwrap();
        store.update_status(confirm(&existing, 12)).await.unwrap();

        let mut kinds = Vec::new();
        while kinds.len() < 2 {
            let batch = sub.next_batch().await.unwrap();
            kinds.extend(batch.changes.iter().map(|c| c.kind));
        }
        assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Removed]);
    }

    #[tokio::test]
    async fn test_restart_feed_closes_subscriptions() {
        let store = LocalOrderStore::in_memory().unwrap();
        let mut sub = store.subscribe(OrderQuery::default()).await.unwrap();
        sub.next_batch().await.unwrap();
        assert_eq!(store.subscriber_count(), 1);

        store.restart_feed();
        assert_eq!(sub.next_batch().await.unwrap_err(), crate::orders::feed::FeedError::Closed);
    }

    #[test]
    fn test_error_classification() {
        let corrupt = StoreError::Storage(StorageError::Serialization(
            serde_json::from_str::<u8>("x").unwrap_err(),
        ));
        assert!(!corrupt.is_transient());
        assert_eq!(corrupt.code(), ErrorCode::StorageCorrupted);

        let down = StoreError::Unavailable("connection reset".into());
        assert!(down.is_transient());
        assert_eq!(down.code(), ErrorCode::StoreUnavailable);

        assert!(!StoreError::OrderNotFound("x".into()).is_transient());

        let damaged = StoreError::Storage(StorageError::Storage(redb::StorageError::Corrupted(
            "bad page".into(),
        )));
        assert!(!damaged.is_transient());
        assert_eq!(damaged.code(), ErrorCode::StorageCorrupted);

        let io = StoreError::Storage(StorageError::Storage(redb::StorageError::Io(
            std::io::Error::other("invalid database handle"),
        )));
        assert!(io.is_transient());
        assert_eq!(io.code(), ErrorCode::SystemBusy);
    }
}
