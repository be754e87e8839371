//! Unified error codes shared by hub and clients
//!
//! Every component error in `order-hub` maps to an [`ErrorCode`] through its
//! `code()` method, so clients can localize messages without parsing text.
//!
//! # Example
//!
//! ```
//! use shared::error::ErrorCode;
//!
//! let code = ErrorCode::try_from(4002).unwrap();
//! assert_eq!(code, ErrorCode::InvalidTransition);
//! ```

mod codes;

pub use codes::{ErrorCode, InvalidErrorCode};
