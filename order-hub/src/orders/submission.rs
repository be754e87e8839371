//! Order Submission Service
//!
//! Turns a finalized cart into one immutable `pending` order.
//!
//! ```text
//! submit(cart, session, shop, location)
//!     ├─ 1. Reject empty cart
//!     ├─ 2. Require customer identity
//!     ├─ 3. Validate line prices/quantities
//!     ├─ 4. Resolve delivery location (provider when not supplied)
//!     ├─ 5. Compute amounts (Decimal)
//!     ├─ 6. Atomic create, retried with the same submission id
//!     └─ 7. Clear cart, return order id
//! ```
//!
//! Any failure before step 7 leaves the cart untouched and creates no order.

use super::store::{NewOrder, OrderStore, StoreError};
use crate::auth::{CustomerSession, ShopInfo};
use crate::cart::CartAggregator;
use crate::core::health::HealthReporter;
use crate::order_money::{self, AmountError};
use crate::services::location::{LocationError, LocationProvider};
use crate::utils::time::duration_millis;
use crate::utils::{RetryPolicy, SharedClock, Transient, with_backoff};
use shared::ErrorCode;
use shared::order::DeliveryLocation;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default pending-order TTL (5 minutes)
pub const DEFAULT_ORDER_TTL: Duration = Duration::from_secs(300);

/// Default delivery fee
pub const DEFAULT_DELIVERY_FEE: f64 = 150.0;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("No authenticated customer")]
    Unauthenticated,

    #[error("Delivery location missing: {0}")]
    MissingLocation(LocationError),

    #[error("Invalid cart: {0}")]
    InvalidCart(#[from] AmountError),

    #[error("Order store write failed: {0}")]
    Store(#[from] StoreError),
}

impl SubmissionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SubmissionError::EmptyCart => ErrorCode::EmptyCart,
            SubmissionError::Unauthenticated => ErrorCode::NotAuthenticated,
            SubmissionError::MissingLocation(e) => e.code(),
            SubmissionError::InvalidCart(_) => ErrorCode::InvalidCartLine,
            SubmissionError::Store(e) if e.is_transient() => ErrorCode::StoreUnavailable,
            SubmissionError::Store(e) => e.code(),
        }
    }
}

pub struct OrderSubmissionService {
    store: Arc<dyn OrderStore>,
    location: Arc<dyn LocationProvider>,
    clock: SharedClock,
    ttl: Duration,
    default_fee: f64,
    retry: RetryPolicy,
    health: HealthReporter,
}

impl OrderSubmissionService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        location: Arc<dyn LocationProvider>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            location,
            clock,
            ttl: DEFAULT_ORDER_TTL,
            default_fee: DEFAULT_DELIVERY_FEE,
            retry: RetryPolicy::default(),
            health: HealthReporter::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_default_fee(mut self, fee: f64) -> Self {
        self.default_fee = fee;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_health(mut self, health: HealthReporter) -> Self {
        self.health = health;
        self
    }

    /// Submit the cart as a new order and return its id
    ///
    /// The cart is cleared only after the store confirms the create.
    pub async fn submit(
        &self,
        cart: &mut CartAggregator,
        session: Option<&CustomerSession>,
        shop: &ShopInfo,
        location: Option<DeliveryLocation>,
    ) -> Result<String, SubmissionError> {
        if cart.is_empty() {
            return Err(SubmissionError::EmptyCart);
        }
        let session = session.ok_or(SubmissionError::Unauthenticated)?;

        let items = cart.snapshot();
        for line in &items {
            if let Err(e) = order_money::validate_line(line) {
                tracing::warn!(product_id = %line.product_id, error = %e, "Rejected cart line");
                return Err(e.into());
            }
        }
        let fee = shop.delivery_fee.unwrap_or(self.default_fee);
        order_money::validate_amount(fee, "delivery_fee")?;

        let delivery_location = self.resolve_location(location).await?;

        let now = self.clock.now_millis();
        let (subtotal, delivery_fee, total_amount) = order_money::order_amounts(&items, fee);
        let new_order = NewOrder {
            submission_id: uuid::Uuid::new_v4().to_string(),
            customer_id: session.customer_id.clone(),
            customer_name: session.name.clone(),
            customer_phone: session.phone.clone(),
            shop_id: shop.shop_id.clone(),
            shop_name: shop.shop_name.clone(),
            items,
            subtotal,
            delivery_fee,
            total_amount,
            delivery_location,
            created_at: now,
            expires_at: now.saturating_add(duration_millis(self.ttl)),
        };

        let order = with_backoff(&self.retry, "create_order", &self.health, || {
            let store = self.store.clone();
            let new_order = new_order.clone();
            async move { store.create(new_order).await }
        })
        .await?;

        cart.clear();
        tracing::info!(
            order_id = %order.order_id,
            shop_id = %order.shop_id,
            customer_id = %order.customer_id,
            total = order.total_amount,
            "Order submitted"
        );
        Ok(order.order_id)
    }

    async fn resolve_location(
        &self,
        supplied: Option<DeliveryLocation>,
    ) -> Result<DeliveryLocation, SubmissionError> {
        let location = match supplied {
            Some(location) => location,
            None => self
                .location
                .current_location()
                .await
                .map_err(SubmissionError::MissingLocation)?,
        };
        if !location.is_valid() {
            return Err(SubmissionError::MissingLocation(LocationError::Invalid));
        }
        Ok(location)
    }
}
