//! Order Module
//!
//! Types shared by customer, shop and hub:
//! - Cart lines and catalog input
//! - The order record and its status lifecycle
//! - Queries and change-feed events

pub mod event;
pub mod query;
pub mod snapshot;
pub mod types;

// Re-exports
pub use event::{Actor, ChangeBatch, ChangeKind, OrderChange, OrderEvent, OrderEventType};
pub use query::OrderQuery;
pub use snapshot::{MerchantLabel, Order, OrderStatus, ParseStatusError};
pub use types::*;
