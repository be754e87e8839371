//! Device location provider seam

use async_trait::async_trait;
use shared::ErrorCode;
use shared::order::DeliveryLocation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("Location coordinates out of range")]
    Invalid,
}

impl LocationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LocationError::PermissionDenied => ErrorCode::LocationPermissionDenied,
            LocationError::Unavailable(_) | LocationError::Invalid => ErrorCode::MissingLocation,
        }
    }
}

/// Source of the device's current coordinates
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<DeliveryLocation, LocationError>;
}

/// Fixed answer, for hosts that resolve location up front and for tests
#[derive(Debug, Clone)]
pub struct StaticLocationProvider {
    result: Result<DeliveryLocation, LocationError>,
}

impl StaticLocationProvider {
    pub fn granted(location: DeliveryLocation) -> Self {
        Self {
            result: Ok(location),
        }
    }

    pub fn denied() -> Self {
        Self {
            result: Err(LocationError::PermissionDenied),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            result: Err(LocationError::Unavailable(reason.into())),
        }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn current_location(&self) -> Result<DeliveryLocation, LocationError> {
        self.result.clone()
    }
}
