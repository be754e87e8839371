#![allow(dead_code)]

use async_trait::async_trait;
use order_hub::core::{Config, OrderHub};
use order_hub::services::{NotificationSurface, NotifyError, StaticLocationProvider};
use order_hub::utils::ManualClock;
use parking_lot::Mutex;
use shared::order::{DeliveryLocation, Order, ProductRef};
use std::sync::Arc;
use std::time::Duration;

pub const T0: i64 = 1_700_000_000_000;

/// Surface that records every modal
#[derive(Default)]
pub struct RecordingSurface {
    modals: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn modals(&self) -> Vec<String> {
        self.modals.lock().clone()
    }

    pub fn count_for(&self, order_id: &str) -> usize {
        self.modals.lock().iter().filter(|id| *id == order_id).count()
    }

    /// Wait until at least `n` modals were shown
    pub async fn wait_for(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.modals.lock().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notification not raised in time");
    }
}

#[async_trait]
impl NotificationSurface for RecordingSurface {
    async fn play_alert(&self, _order: &Order) -> Result<(), NotifyError> {
        Err(NotifyError::AudioUnavailable("no speaker in tests".into()))
    }

    async fn show_modal(&self, order: &Order) {
        self.modals.lock().push(order.order_id.clone());
    }
}

pub fn karachi() -> DeliveryLocation {
    DeliveryLocation::new(24.8607, 67.0011)
}

pub fn kurta() -> ProductRef {
    ProductRef::new("Kurta", "Kurta", 3500.0)
}

pub fn scarf() -> ProductRef {
    ProductRef::new("Scarf", "Scarf", 1200.0)
}

pub fn test_config() -> Config {
    Config::default()
        .with_reconnect(5, 50)
        .with_write_retry(2, 1)
}

pub struct TestHub {
    pub hub: OrderHub,
    pub clock: ManualClock,
    pub surface: Arc<RecordingSurface>,
}

pub fn hub() -> TestHub {
    let clock = ManualClock::new(T0);
    let surface = Arc::new(RecordingSurface::default());
    let hub = OrderHub::in_memory(
        test_config(),
        Arc::new(StaticLocationProvider::granted(karachi())),
        surface.clone(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    TestHub {
        hub,
        clock,
        surface,
    }
}

/// Poll until `check` holds
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
