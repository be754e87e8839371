//! Expiry sweeper
//!
//! Pending orders nobody accepted before `expires_at` are rejected by the
//! system actor with reason `expired`. Registered as a periodic background
//! task; acceptance of an expired order is blocked by the state machine
//! whether or not a sweep has run.

use super::machine::{OrderStateMachine, TransitionError};
use super::store::OrderStore;
use crate::utils::SharedClock;
use shared::order::{OrderQuery, OrderStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ExpirySweeper {
    store: Arc<dyn OrderStore>,
    machine: Arc<OrderStateMachine>,
    clock: SharedClock,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn OrderStore>,
        machine: Arc<OrderStateMachine>,
        clock: SharedClock,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            machine,
            clock,
            interval,
            shutdown,
        }
    }

    /// Main loop: sweep every `interval` until shutdown
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Expiry sweeper received shutdown signal");
                    break;
                }
            }
            self.sweep_once().await;
        }

        tracing::info!("Expiry sweeper stopped");
    }

    /// Reject every pending order past its deadline; returns how many were rejected
    pub async fn sweep_once(&self) -> usize {
        let now = self.clock.now_millis();
        let query = OrderQuery::default()
            .with_status(OrderStatus::Pending)
            .expiring_before(now);
        let candidates = match self.store.query(&query).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(error = %e, "Expiry sweep query failed");
                return 0;
            }
        };

        let mut expired = 0;
        for order in candidates {
            match self.machine.expire(&order.order_id).await {
                Ok(_) => {
                    expired += 1;
                    tracing::info!(
                        order_id = %order.order_id,
                        shop_id = %order.shop_id,
                        expires_at = %shared::util::format_millis(order.expires_at),
                        "Pending order expired"
                    );
                }
                // The shop acted first
                Err(
                    e @ (TransitionError::InvalidTransition { .. }
                    | TransitionError::NotExpired { .. }
                    | TransitionError::Conflict { .. }),
                ) => {
                    tracing::debug!(order_id = %order.order_id, error = %e, "Skipped expiry");
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.order_id, error = %e, "Failed to expire order");
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::store::{LocalOrderStore, NewOrder};
    use crate::utils::ManualClock;
    use shared::order::{Actor, DeliveryLocation};

    const T0: i64 = 1_700_000_000_000;

    fn new_order(submission_id: &str, created_at: i64) -> NewOrder {
        NewOrder {
            submission_id: submission_id.to_string(),
            customer_id: "cust-1".to_string(),
            customer_name: "Ayesha".to_string(),
            customer_phone: None,
            shop_id: "shop-1".to_string(),
            shop_name: "Loom House".to_string(),
            items: vec![],
            subtotal: 0.0,
            delivery_fee: 0.0,
            total_amount: 0.0,
            delivery_location: DeliveryLocation::new(0.0, 0.0),
            created_at,
            expires_at: created_at + 300_000,
        }
    }

    #[tokio::test]
    async fn test_sweep_rejects_only_expired_pending() {
        let store = Arc::new(LocalOrderStore::in_memory().unwrap());
        let clock = ManualClock::new(T0);
        let machine = Arc::new(OrderStateMachine::new(store.clone(), Arc::new(clock.clone())));
        let sweeper = ExpirySweeper::new(
            store.clone(),
            machine.clone(),
            Arc::new(clock.clone()),
            Duration::from_secs(30),
            CancellationToken::new(),
        );

        let old = store.create(new_order("sub-old", T0)).await.unwrap();
        let accepted = store.create(new_order("sub-acc", T0)).await.unwrap();
        let fresh = store.create(new_order("sub-new", T0 + 200_000)).await.unwrap();
        machine
            .apply_transition(
                &accepted.order_id,
                OrderStatus::Confirmed,
                &Actor::Shop("shop-1".into()),
            )
            .await
            .unwrap();

        assert_eq!(sweeper.sweep_once().await, 0);

        clock.set(T0 + 300_001);
        assert_eq!(sweeper.sweep_once().await, 1);

        let old = store.get(&old.order_id).await.unwrap().unwrap();
        assert_eq!(old.status, OrderStatus::Rejected);
        assert_eq!(old.status_reason.as_deref(), Some("expired"));
        let fresh = store.get(&fresh.order_id).await.unwrap().unwrap();
        assert_eq!(fresh.status, OrderStatus::Pending);
        let accepted = store.get(&accepted.order_id).await.unwrap().unwrap();
        assert_eq!(accepted.status, OrderStatus::Confirmed);

        assert_eq!(sweeper.sweep_once().await, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(LocalOrderStore::in_memory().unwrap());
        let clock: SharedClock = Arc::new(ManualClock::new(T0));
        let machine = Arc::new(OrderStateMachine::new(store.clone(), clock.clone()));
        let token = CancellationToken::new();
        let sweeper = ExpirySweeper::new(
            store,
            machine,
            clock,
            Duration::from_millis(5),
            token.clone(),
        );

        let handle = tokio::spawn(sweeper.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
