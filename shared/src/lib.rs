//! Shared types for the Souk workspace
//!
//! Common types used by the order hub and its customer/shop clients:
//! cart lines, the order record, change-feed events and error codes.

pub mod error;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::ErrorCode;
pub use order::{Order, OrderStatus};
