//! Unified error codes for the Souk workspace
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 6xxx: Cart errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 1xxx: Auth ====================
    /// No authenticated customer identity
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Actor may not perform this operation
    PermissionDenied = 2001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Requested status is not a legal next step
    InvalidTransition = 4002,
    /// Pending order passed its acceptance deadline
    OrderExpired = 4003,
    /// Concurrent write won the race
    OrderConflict = 4004,
    /// No delivery location could be resolved
    MissingLocation = 4005,
    /// Location permission denied by the device
    LocationPermissionDenied = 4006,

    // ==================== 6xxx: Cart ====================
    /// Cart has no lines
    EmptyCart = 6001,
    /// Cart line has an invalid price or quantity
    InvalidCartLine = 6002,
    /// Cart snapshot could not be persisted
    CartPersistFailed = 6003,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Store unreachable or write failed after retries
    StoreUnavailable = 9002,
    /// Change feed subscription dropped
    FeedDisconnected = 9003,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            ErrorCode::NotAuthenticated => "Customer is not authenticated",

            ErrorCode::PermissionDenied => "Permission denied",

            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Status change is not allowed from the current status",
            ErrorCode::OrderExpired => "Order expired before it was accepted",
            ErrorCode::OrderConflict => "Order was changed concurrently",
            ErrorCode::MissingLocation => "Delivery location is required",
            ErrorCode::LocationPermissionDenied => "Location permission denied",

            ErrorCode::EmptyCart => "Cart is empty",
            ErrorCode::InvalidCartLine => "Cart line is invalid",
            ErrorCode::CartPersistFailed => "Cart could not be saved",

            ErrorCode::InternalError => "Internal error",
            ErrorCode::StoreUnavailable => "Order store is unavailable",
            ErrorCode::FeedDisconnected => "Live order feed disconnected",
            ErrorCode::StorageCorrupted => "Storage is corrupted",
            ErrorCode::SystemBusy => "System busy, retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            1001 => Ok(ErrorCode::NotAuthenticated),

            2001 => Ok(ErrorCode::PermissionDenied),

            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::OrderExpired),
            4004 => Ok(ErrorCode::OrderConflict),
            4005 => Ok(ErrorCode::MissingLocation),
            4006 => Ok(ErrorCode::LocationPermissionDenied),

            6001 => Ok(ErrorCode::EmptyCart),
            6002 => Ok(ErrorCode::InvalidCartLine),
            6003 => Ok(ErrorCode::CartPersistFailed),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StoreUnavailable),
            9003 => Ok(ErrorCode::FeedDisconnected),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::InvalidTransition.code(), 4002);
        assert_eq!(ErrorCode::OrderExpired.code(), 4003);
        assert_eq!(ErrorCode::EmptyCart.code(), 6001);
        assert_eq!(ErrorCode::StoreUnavailable.code(), 9002);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::EmptyCart.is_success());
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&ErrorCode::OrderNotFound).unwrap();
        assert_eq!(json, "4001");
    }

    #[test]
    fn test_deserialize() {
        let code: ErrorCode = serde_json::from_str("6001").unwrap();
        assert_eq!(code, ErrorCode::EmptyCart);

        let result: Result<ErrorCode, _> = serde_json::from_str("999");
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_all_codes() {
        for raw in [0u16, 1, 2, 3, 1001, 2001, 4001, 4002, 4003, 4004, 4005, 4006, 6001, 6002, 6003, 9001, 9002, 9003, 9403, 9404] {
            let code = ErrorCode::try_from(raw).unwrap();
            assert_eq!(u16::from(code), raw);
            assert!(!code.message().is_empty());
        }
    }
}
