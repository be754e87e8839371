//! Filtered, ordered order queries

use super::snapshot::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Filter for order queries and subscriptions
///
/// All set fields must match. Results are ordered by `created_at`
/// descending, ties broken by `order_id` descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// Only orders with `expires_at` strictly before this timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_before: Option<i64>,
}

impl OrderQuery {
    /// Pending orders for one shop (the merchant's incoming queue)
    pub fn pending_for_shop(shop_id: impl Into<String>) -> Self {
        Self {
            shop_id: Some(shop_id.into()),
            status: Some(OrderStatus::Pending),
            ..Default::default()
        }
    }

    /// Every order of one customer
    pub fn for_customer(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn expiring_before(mut self, timestamp: i64) -> Self {
        self.expires_before = Some(timestamp);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.shop_id.as_deref().is_none_or(|id| id == order.shop_id)
            && self
                .customer_id
                .as_deref()
                .is_none_or(|id| id == order.customer_id)
            && self.status.is_none_or(|s| s == order.status)
            && self.expires_before.is_none_or(|t| order.expires_at < t)
    }

    /// Sort in result order (newest first)
    pub fn sort(orders: &mut [Order]) {
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_id.cmp(&a.order_id))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Actor, ChangeKind, DeliveryLocation, OrderEvent, OrderEventType};

    fn order(id: &str, shop: &str, created_at: i64, status: OrderStatus) -> Order {
        Order {
            order_id: id.to_string(),
            submission_id: format!("sub-{id}"),
            customer_id: "cust-1".to_string(),
            customer_name: "Ayesha".to_string(),
            customer_phone: None,
            shop_id: shop.to_string(),
            shop_name: "Loom House".to_string(),
            items: vec![],
            subtotal: 0.0,
            delivery_fee: 0.0,
            total_amount: 0.0,
            status,
            status_reason: None,
            delivery_location: DeliveryLocation::new(24.86, 67.0),
            created_at,
            updated_at: created_at,
            accepted_at: None,
            expires_at: created_at + 300_000,
            version: 0,
            sequence: 0,
        }
    }

    fn status_event(before: &Order, to: OrderStatus) -> OrderEvent {
        let mut after = before.clone();
        after.status = to;
        OrderEvent {
            sequence: 2,
            timestamp: 0,
            actor: Actor::Shop(before.shop_id.clone()),
            event_type: OrderEventType::StatusChanged {
                from: before.status,
                to,
            },
            before: Some(before.clone()),
            order: after,
        }
    }

    #[test]
    fn test_pending_for_shop_matches() {
        let query = OrderQuery::pending_for_shop("shop-a");
        assert!(query.matches(&order("1", "shop-a", 10, OrderStatus::Pending)));
        assert!(!query.matches(&order("2", "shop-b", 10, OrderStatus::Pending)));
        assert!(!query.matches(&order("3", "shop-a", 10, OrderStatus::Confirmed)));
    }

    #[test]
    fn test_expiring_before() {
        let query = OrderQuery::default()
            .with_status(OrderStatus::Pending)
            .expiring_before(400_000);
        assert!(query.matches(&order("1", "shop-a", 0, OrderStatus::Pending)));
        assert!(!query.matches(&order("2", "shop-a", 200_000, OrderStatus::Pending)));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut orders = vec![
            order("a", "s", 10, OrderStatus::Pending),
            order("b", "s", 30, OrderStatus::Pending),
            order("c", "s", 20, OrderStatus::Pending),
        ];
        OrderQuery::sort(&mut orders);
        let ids: Vec<_> = orders.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_classify_creation_and_status_changes() {
        let pending = OrderQuery::pending_for_shop("shop-a");
        let created = OrderEvent {
            sequence: 1,
            timestamp: 0,
            actor: Actor::Customer("cust-1".to_string()),
            event_type: OrderEventType::OrderCreated,
            before: None,
            order: order("1", "shop-a", 10, OrderStatus::Pending),
        };
        assert!(pending.matches(&created.order));
        assert_eq!(created.classify(&pending).unwrap().kind, ChangeKind::Added);

        // Leaving the pending set is a removal for the shop queue...
        let confirmed = status_event(&created.order, OrderStatus::Confirmed);
        assert_eq!(confirmed.classify(&pending).unwrap().kind, ChangeKind::Removed);

        // ...but a modification for the customer's full list
        let mine = OrderQuery::for_customer("cust-1");
        assert_eq!(confirmed.classify(&mine).unwrap().kind, ChangeKind::Modified);

        // Another shop never sees it
        let other = OrderQuery::pending_for_shop("shop-b");
        assert!(created.classify(&other).is_none());
        assert!(confirmed.classify(&other).is_none());
    }
}
