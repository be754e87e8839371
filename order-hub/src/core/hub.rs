//! OrderHub - wires storage, services and listeners together
//!
//! ```text
//! OrderHub::open(config)
//!     ├─ orders.redb → OrderStorage → LocalOrderStore (change feed)
//!     ├─ cart.redb   → RedbCartStorage
//!     ├─ OrderSubmissionService  ─┐
//!     ├─ OrderStateMachine        ├─ share store, clock, health
//!     ├─ ShopOrderListener        │
//!     └─ CustomerOrderTracker    ─┘
//! ```

use super::config::Config;
use super::error::{HubError, Result};
use super::health::{HealthReporter, StoreHealth};
use super::tasks::BackgroundTasks;
use crate::auth::CustomerSession;
use crate::cart::{CartAggregator, RedbCartStorage};
use crate::listeners::{CustomerOrderTracker, ShopListenerHandle, ShopOrderListener, TrackerHandle};
use crate::orders::{
    ExpirySweeper, LocalOrderStore, OrderStateMachine, OrderStorage, OrderStore,
    OrderSubmissionService, StoreError,
};
use crate::services::location::LocationProvider;
use crate::services::notification::{NotificationSurface, Notifier};
use crate::utils::{SharedClock, SystemClock};
use std::sync::Arc;
use tokio::sync::watch;

pub struct OrderHub {
    config: Config,
    store: Arc<LocalOrderStore>,
    carts: Arc<RedbCartStorage>,
    clock: SharedClock,
    health: HealthReporter,
    submission: OrderSubmissionService,
    machine: Arc<OrderStateMachine>,
    shop_listener: ShopOrderListener,
    tracker: CustomerOrderTracker,
}

impl std::fmt::Debug for OrderHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderHub")
            .field("work_dir", &self.config.work_dir)
            .field("health", &self.health.current())
            .finish_non_exhaustive()
    }
}

impl OrderHub {
    /// Open the hub on disk under `config.work_dir`
    pub fn open(
        config: Config,
        location: Arc<dyn LocationProvider>,
        surface: Arc<dyn NotificationSurface>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|source| HubError::WorkDir {
            path: config.work_dir.clone(),
            source,
        })?;

        let storage = OrderStorage::open(config.orders_db_path()).map_err(StoreError::from)?;
        let carts = RedbCartStorage::open(config.cart_db_path())?;
        tracing::info!(work_dir = %config.work_dir, "Order hub storage opened");

        Ok(Self::assemble(
            config,
            storage,
            carts,
            location,
            surface,
            Arc::new(SystemClock),
        ))
    }

    /// Hub backed by in-memory databases
    pub fn in_memory(
        config: Config,
        location: Arc<dyn LocationProvider>,
        surface: Arc<dyn NotificationSurface>,
        clock: SharedClock,
    ) -> Result<Self> {
        let storage = OrderStorage::open_in_memory().map_err(StoreError::from)?;
        let carts = RedbCartStorage::open_in_memory()?;
        Ok(Self::assemble(
            config, storage, carts, location, surface, clock,
        ))
    }

    fn assemble(
        config: Config,
        storage: OrderStorage,
        carts: RedbCartStorage,
        location: Arc<dyn LocationProvider>,
        surface: Arc<dyn NotificationSurface>,
        clock: SharedClock,
    ) -> Self {
        let store = Arc::new(LocalOrderStore::new(storage, config.feed_capacity));
        let dyn_store: Arc<dyn OrderStore> = store.clone();
        let health = HealthReporter::new();
        let retry = config.write_retry();

        let submission = OrderSubmissionService::new(dyn_store.clone(), location, clock.clone())
            .with_ttl(config.order_ttl())
            .with_default_fee(config.delivery_fee)
            .with_retry(retry)
            .with_health(health.clone());
        let machine = Arc::new(
            OrderStateMachine::new(dyn_store.clone(), clock.clone())
                .with_retry(retry)
                .with_health(health.clone()),
        );
        let shop_listener =
            ShopOrderListener::new(dyn_store.clone(), Notifier::new(surface), config.reconnect());
        let tracker = CustomerOrderTracker::new(dyn_store, config.reconnect());

        Self {
            config,
            store,
            carts: Arc::new(carts),
            clock,
            health,
            submission,
            machine,
            shop_listener,
            tracker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocalOrderStore> {
        &self.store
    }

    pub fn submission(&self) -> &OrderSubmissionService {
        &self.submission
    }

    pub fn machine(&self) -> &Arc<OrderStateMachine> {
        &self.machine
    }

    pub fn health(&self) -> StoreHealth {
        self.health.current()
    }

    pub fn watch_health(&self) -> watch::Receiver<StoreHealth> {
        self.health.subscribe()
    }

    /// The session's cart, restored from its persisted snapshot
    pub fn cart_for(&self, session: &CustomerSession) -> CartAggregator {
        CartAggregator::restore(session, self.carts.clone())
    }

    /// Start the merchant's pending-order listener
    pub fn watch_shop(&self, shop_id: impl Into<String>) -> ShopListenerHandle {
        self.shop_listener.start(shop_id)
    }

    /// Start the customer's order tracker
    pub fn track_customer(&self, customer_id: impl Into<String>) -> TrackerHandle {
        self.tracker.watch(customer_id)
    }

    /// Spawn the hub's periodic tasks
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let sweeper = ExpirySweeper::new(
            self.store.clone(),
            self.machine.clone(),
            self.clock.clone(),
            self.config.expiry_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("expiry_sweeper", sweeper.run());
        tasks
    }
}
