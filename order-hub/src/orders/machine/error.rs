use crate::orders::store::StoreError;
use crate::utils::Transient;
use shared::ErrorCode;
use shared::order::OrderStatus;
use thiserror::Error;

/// Rejected or failed status transitions
///
/// Variants carry the order's current status where it is known so the shop
/// UI can re-display the truth.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order {order_id} expired at {expires_at} before it was accepted")]
    OrderExpired {
        order_id: String,
        expires_at: i64,
        current: OrderStatus,
    },

    #[error("{actor} may not change order {order_id}")]
    Forbidden {
        order_id: String,
        actor: String,
        current: Option<OrderStatus>,
    },

    #[error("Order {order_id} kept changing concurrently (now {current})")]
    Conflict {
        order_id: String,
        current: OrderStatus,
    },

    #[error("Order {order_id} has not expired")]
    NotExpired {
        order_id: String,
        current: OrderStatus,
    },

    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

impl TransitionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransitionError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            TransitionError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            TransitionError::OrderExpired { .. } => ErrorCode::OrderExpired,
            TransitionError::Forbidden { .. } => ErrorCode::PermissionDenied,
            TransitionError::Conflict { .. } => ErrorCode::OrderConflict,
            TransitionError::NotExpired { .. } => ErrorCode::ValidationFailed,
            TransitionError::Store(e) if e.is_transient() => ErrorCode::StoreUnavailable,
            TransitionError::Store(e) => e.code(),
        }
    }

    /// Status of the order as last seen, if known
    pub fn current_status(&self) -> Option<OrderStatus> {
        match self {
            TransitionError::InvalidTransition { from, .. } => Some(*from),
            TransitionError::OrderExpired { current, .. }
            | TransitionError::Conflict { current, .. }
            | TransitionError::NotExpired { current, .. } => Some(*current),
            TransitionError::Forbidden { current, .. } => *current,
            TransitionError::Store(StoreError::Conflict { current }) => Some(current.status),
            TransitionError::OrderNotFound(_) | TransitionError::Store(_) => None,
        }
    }
}
