//! External collaborators of the hub

pub mod location;
pub mod notification;

pub use location::{LocationError, LocationProvider, StaticLocationProvider};
pub use notification::{NotificationSurface, Notifier, NotifyError, TracingSurface};
