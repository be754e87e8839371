//! Order State Machine
//!
//! ```text
//! pending ──► confirmed ──► preparing ──► out_for_delivery ──► delivered
//!    │
//!    └──► rejected
//! ```
//!
//! # Transition Flow
//!
//! ```text
//! apply_transition(order_id, requested, actor)
//!     ├─ 1. Actor role check (customers read-only, system only rejects)
//!     ├─ 2. Load current order
//!     ├─ 3. Ownership, legality and expiry checks
//!     ├─ 4. Compare-and-swap write on the validated version
//!     └─ 5. On conflict: re-run 3-4 against the fresh document
//! ```

mod error;
pub use error::*;

use super::store::{OrderStore, StatusUpdate, StoreError};
use crate::core::health::HealthReporter;
use crate::utils::{RetryPolicy, SharedClock, with_backoff};
use shared::order::{Actor, Order, OrderStatus};
use std::sync::Arc;

/// Re-validation rounds after losing a compare-and-swap
const MAX_CAS_ATTEMPTS: u32 = 3;

/// `status_reason` written by the expiry sweep
pub const EXPIRED_REASON: &str = "expired";

pub struct OrderStateMachine {
    store: Arc<dyn OrderStore>,
    clock: SharedClock,
    retry: RetryPolicy,
    health: HealthReporter,
}

impl OrderStateMachine {
    pub fn new(store: Arc<dyn OrderStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
            health: HealthReporter::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_health(mut self, health: HealthReporter) -> Self {
        self.health = health;
        self
    }

    /// Move an order to `requested` on behalf of `actor`
    pub async fn apply_transition(
        &self,
        order_id: &str,
        requested: OrderStatus,
        actor: &Actor,
    ) -> Result<Order, TransitionError> {
        self.transition(order_id, requested, actor, None, false)
            .await
    }

    /// Move an order to the next status on the delivery path
    pub async fn advance(&self, order_id: &str, actor: &Actor) -> Result<Order, TransitionError> {
        let order = self.load(order_id).await?;
        match order.status.successor() {
            Some(next) => self.apply_transition(order_id, next, actor).await,
            None => Err(TransitionError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                to: order.status,
            }),
        }
    }

    /// Reject a pending order with an optional reason
    pub async fn reject(
        &self,
        order_id: &str,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Order, TransitionError> {
        self.transition(order_id, OrderStatus::Rejected, actor, reason, false)
            .await
    }

    /// Reject a pending order whose acceptance deadline has passed
    pub async fn expire(&self, order_id: &str) -> Result<Order, TransitionError> {
        self.transition(
            order_id,
            OrderStatus::Rejected,
            &Actor::System,
            Some(EXPIRED_REASON.to_string()),
            true,
        )
        .await
    }

    async fn transition(
        &self,
        order_id: &str,
        requested: OrderStatus,
        actor: &Actor,
        reason: Option<String>,
        require_expired: bool,
    ) -> Result<Order, TransitionError> {
        authorize_role(order_id, requested, actor)?;

        let mut order = self.load(order_id).await?;
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let update = self.plan(&order, requested, actor, reason.clone(), require_expired)?;
            let result = with_backoff(&self.retry, "update_status", &self.health, || {
                let store = self.store.clone();
                let update = update.clone();
                async move { store.update_status(update).await }
            })
            .await;

            match result {
                Ok(after) => return Ok(after),
                Err(StoreError::Conflict { current }) => {
                    tracing::debug!(
                        order_id = %order_id,
                        attempt,
                        current = %current.status,
                        "Lost status race, re-validating"
                    );
                    order = *current;
                }
                Err(StoreError::OrderNotFound(id)) => {
                    return Err(TransitionError::OrderNotFound(id));
                }
                Err(e) => {
                    tracing::error!(order_id = %order_id, error = %e, "Status write failed");
                    return Err(e.into());
                }
            }
        }

        tracing::warn!(order_id = %order_id, current = %order.status, "Gave up after repeated conflicts");
        Err(TransitionError::Conflict {
            order_id: order_id.to_string(),
            current: order.status,
        })
    }

    /// Validate `order → requested` and build the write
    fn plan(
        &self,
        order: &Order,
        requested: OrderStatus,
        actor: &Actor,
        reason: Option<String>,
        require_expired: bool,
    ) -> Result<StatusUpdate, TransitionError> {
        if let Actor::Shop(shop_id) = actor
            && *shop_id != order.shop_id
        {
            return Err(TransitionError::Forbidden {
                order_id: order.order_id.clone(),
                actor: actor.label().to_string(),
                current: Some(order.status),
            });
        }

        if !order.status.can_transition_to(requested) {
            return Err(TransitionError::InvalidTransition {
                order_id: order.order_id.clone(),
                from: order.status,
                to: requested,
            });
        }

        let now = self.clock.now_millis();
        let expired = order.is_expired(now);
        if requested == OrderStatus::Confirmed && expired {
            return Err(TransitionError::OrderExpired {
                order_id: order.order_id.clone(),
                expires_at: order.expires_at,
                current: order.status,
            });
        }
        if require_expired && !expired {
            return Err(TransitionError::NotExpired {
                order_id: order.order_id.clone(),
                current: order.status,
            });
        }

        let accepting = order.status == OrderStatus::Pending && requested == OrderStatus::Confirmed;
        Ok(StatusUpdate {
            order_id: order.order_id.clone(),
            expected_version: order.version,
            status: requested,
            updated_at: now,
            accepted_at: accepting.then_some(now),
            status_reason: reason,
            actor: actor.clone(),
        })
    }

    async fn load(&self, order_id: &str) -> Result<Order, TransitionError> {
        let order = with_backoff(&self.retry, "get_order", &self.health, || {
            let store = self.store.clone();
            let order_id = order_id.to_string();
            async move { store.get(&order_id).await }
        })
        .await?;
        order.ok_or_else(|| TransitionError::OrderNotFound(order_id.to_string()))
    }
}

/// Customers never write; the system actor only rejects
fn authorize_role(
    order_id: &str,
    requested: OrderStatus,
    actor: &Actor,
) -> Result<(), TransitionError> {
    let allowed = match actor {
        Actor::Shop(_) => true,
        Actor::System => requested == OrderStatus::Rejected,
        Actor::Customer(_) => false,
    };
    if allowed {
        Ok(())
    } else {
        tracing::warn!(order_id = %order_id, actor = %actor.label(), to = %requested, "Forbidden status change");
        Err(TransitionError::Forbidden {
            order_id: order_id.to_string(),
            actor: actor.label().to_string(),
            current: None,
        })
    }
}
