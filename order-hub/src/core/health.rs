//! Store write health
//!
//! Write paths (submission, status transitions) retry transient store
//! failures. While they do, the hub reports `Degraded` so clients can show a
//! connectivity banner instead of a hard error.

use std::sync::Arc;
use tokio::sync::watch;

/// Store write health as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreHealth {
    #[default]
    Healthy,
    Degraded {
        attempt: u32,
        reason: String,
    },
}

impl StoreHealth {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StoreHealth::Degraded { .. })
    }
}

/// Cloneable publisher for [`StoreHealth`]
#[derive(Debug, Clone)]
pub struct HealthReporter {
    tx: Arc<watch::Sender<StoreHealth>>,
}

impl HealthReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StoreHealth::Healthy);
        Self { tx: Arc::new(tx) }
    }

    pub fn degraded(&self, attempt: u32, reason: impl Into<String>) {
        self.tx.send_replace(StoreHealth::Degraded {
            attempt,
            reason: reason.into(),
        });
    }

    pub fn recovered(&self) {
        self.tx.send_if_modified(|health| {
            if health.is_degraded() {
                *health = StoreHealth::Healthy;
                true
            } else {
                false
            }
        });
    }

    pub fn current(&self) -> StoreHealth {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreHealth> {
        self.tx.subscribe()
    }
}

impl Default for HealthReporter {
    fn default() -> Self {
        Self::new()
    }
}
