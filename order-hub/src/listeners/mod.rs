//! Change-feed consumers
//!
//! - [`ShopOrderListener`]: merchant's pending queue + one-shot new-order notification
//! - [`CustomerOrderTracker`]: customer's order list, read-only
//!
//! Both run a [`runner::FeedRunner`] task that keeps one subscription open,
//! resubscribes with exponential backoff when it drops, and publishes the
//! live view and connectivity through `watch` channels.

pub mod customer;
mod runner;
pub mod shop;
mod view;

pub use customer::{CustomerOrderTracker, TrackerHandle};
pub use shop::{ShopListenerHandle, ShopOrderListener};

use std::time::Duration;

/// Subscription health as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// First subscription not yet established
    #[default]
    Connecting,
    /// Subscribed and up to date
    Live,
    /// Subscription dropped; resubscribing
    Degraded { attempt: u32, reason: String },
    /// Stopped by the owner
    Stopped,
}

impl Connectivity {
    pub fn is_live(&self) -> bool {
        matches!(self, Connectivity::Live)
    }
}

/// Resubscribe delays: `base`, doubling up to `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay after `delay`
    pub fn next(&self, delay: Duration) -> Duration {
        delay.saturating_mul(2).min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(10))
    }
}
