//! Hub core - configuration, wiring, health and background tasks
//!
//! - [`Config`] - environment-driven settings
//! - [`OrderHub`] - assembled services
//! - [`HealthReporter`] - store write health
//! - [`BackgroundTasks`] - task registry

pub mod config;
pub mod error;
pub mod health;
pub mod hub;
pub mod tasks;

pub use config::Config;
pub use error::{HubError, Result};
pub use health::{HealthReporter, StoreHealth};
pub use hub::OrderHub;
pub use tasks::BackgroundTasks;
