//! New-order notification dispatch
//!
//! The modal is the guaranteed channel. Audio is best-effort: a failing or
//! hanging alert is logged and never delays or suppresses the modal.

use async_trait::async_trait;
use shared::order::Order;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on how long an alert may hold up the listener
const ALERT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("Audio unavailable: {0}")]
    AudioUnavailable(String),
}

/// UI surface of the merchant app
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Play the new-order sound
    async fn play_alert(&self, order: &Order) -> Result<(), NotifyError>;

    /// Show the blocking new-order modal
    async fn show_modal(&self, order: &Order);
}

/// Dispatches one new-pending-order notification to a surface
#[derive(Clone)]
pub struct Notifier {
    surface: Arc<dyn NotificationSurface>,
    alert_timeout: Duration,
}

impl Notifier {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            surface,
            alert_timeout: ALERT_TIMEOUT,
        }
    }

    pub fn with_alert_timeout(mut self, timeout: Duration) -> Self {
        self.alert_timeout = timeout;
        self
    }

    /// Alert and modal run together; returns once both have finished
    pub async fn new_pending_order(&self, order: &Order) {
        let alert = async {
            match tokio::time::timeout(self.alert_timeout, self.surface.play_alert(order)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(order_id = %order.order_id, error = %e, "New-order alert failed")
                }
                Err(_) => {
                    tracing::warn!(order_id = %order.order_id, "New-order alert timed out")
                }
            }
        };
        tokio::join!(alert, self.surface.show_modal(order));
    }
}

/// Surface that only logs, used when no UI is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSurface;

#[async_trait]
impl NotificationSurface for TracingSurface {
    async fn play_alert(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::debug!(order_id = %order.order_id, "🔔 New order alert");
        Ok(())
    }

    async fn show_modal(&self, order: &Order) {
        tracing::info!(
            order_id = %order.order_id,
            customer = %order.customer_name,
            items = order.item_count(),
            total = order.total_amount,
            "📦 New pending order"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared::order::{DeliveryLocation, OrderStatus};

    #[derive(Default)]
    struct Recording {
        audio: Option<bool>,
        modals: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSurface for Recording {
        async fn play_alert(&self, _order: &Order) -> Result<(), NotifyError> {
            match self.audio {
                Some(true) => Ok(()),
                Some(false) => Err(NotifyError::AudioUnavailable("muted".into())),
                None => std::future::pending().await,
            }
        }

        async fn show_modal(&self, order: &Order) {
            self.modals.lock().push(order.order_id.clone());
        }
    }

    fn order() -> Order {
        Order {
            order_id: "o1".to_string(),
            submission_id: "sub-o1".to_string(),
            customer_id: "c1".to_string(),
            customer_name: "Ayesha".to_string(),
            customer_phone: None,
            shop_id: "s1".to_string(),
            shop_name: "Loom House".to_string(),
            items: vec![],
            subtotal: 0.0,
            delivery_fee: 0.0,
            total_amount: 0.0,
            status: OrderStatus::Pending,
            status_reason: None,
            delivery_location: DeliveryLocation::new(0.0, 0.0),
            created_at: 0,
            updated_at: 0,
            accepted_at: None,
            expires_at: 0,
            version: 0,
            sequence: 0,
        }
    }

    #[tokio::test]
    async fn test_modal_shown_when_audio_fails() {
        let surface = Arc::new(Recording {
            audio: Some(false),
            ..Default::default()
        });
        Notifier::new(surface.clone()).new_pending_order(&order()).await;
        assert_eq!(*surface.modals.lock(), vec!["o1".to_string()]);
    }

    #[tokio::test]
    async fn test_modal_shown_when_audio_hangs() {
        let surface = Arc::new(Recording::default());
        Notifier::new(surface.clone())
            .with_alert_timeout(Duration::from_millis(10))
            .new_pending_order(&order())
            .await;
        assert_eq!(surface.modals.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_hanging_audio_does_not_delay_modal() {
        let surface = Arc::new(Recording::default());
        let notifier = Notifier::new(surface.clone()).with_alert_timeout(Duration::from_secs(30));
        let task = tokio::spawn(async move { notifier.new_pending_order(&order()).await });

        tokio::time::timeout(Duration::from_secs(1), async {
            while surface.modals.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("modal waited for the alert");
        assert!(!task.is_finished());
        task.abort();
    }
}
