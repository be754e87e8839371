//! Order record and status lifecycle
//!
//! ```text
//! pending ──► confirmed ──► preparing ──► out_for_delivery ──► delivered
//!    │
//!    └──► rejected
//! ```
//!
//! `delivered` and `rejected` are terminal.

use super::types::{CartLine, DeliveryLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Rejected,
}

impl OrderStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Rejected,
    ];

    /// Next status on the main delivery path
    pub const fn successor(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::OutForDelivery),
            OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Rejected => None,
        }
    }

    /// Whether `self → target` is a legal single step
    ///
    /// Legal steps are the immediate successor plus `pending → rejected`.
    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.successor() == Some(target)
            || (self == OrderStatus::Pending && target == OrderStatus::Rejected)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Rejected)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Label used by the merchant app's condensed status column
    pub const fn merchant_label(self) -> MerchantLabel {
        match self {
            OrderStatus::Pending => MerchantLabel::Pending,
            OrderStatus::Confirmed | OrderStatus::Preparing => MerchantLabel::Processing,
            OrderStatus::OutForDelivery => MerchantLabel::Ready,
            OrderStatus::Delivered => MerchantLabel::Completed,
            OrderStatus::Rejected => MerchantLabel::Rejected,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Condensed merchant-app vocabulary (display only, never stored)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MerchantLabel {
    Pending,
    Processing,
    Ready,
    Completed,
    Rejected,
}

/// Order record
///
/// `items`, `total_amount` and `created_at` are fixed at submission.
/// Only `status`, `status_reason`, `updated_at`, `accepted_at` and `version`
/// change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Order ID (assigned by the store)
    pub order_id: String,
    /// Idempotency key of the submission that created this order
    pub submission_id: String,
    pub customer_id: String,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub shop_id: String,
    pub shop_name: String,
    /// Cart snapshot at submission time
    pub items: Vec<CartLine>,
    /// Sum of line totals
    pub subtotal: f64,
    pub delivery_fee: f64,
    /// subtotal + delivery_fee
    pub total_amount: f64,
    pub status: OrderStatus,
    /// Why the order reached its current status (e.g. "expired")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub delivery_location: DeliveryLocation,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<i64>,
    pub expires_at: i64,
    /// Incremented on every committed status write
    #[serde(default)]
    pub version: u64,
    /// Store sequence of the write that produced this document
    #[serde(default)]
    pub sequence: u64,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Pending and past its acceptance deadline
    pub fn is_expired(&self, now: i64) -> bool {
        self.is_pending() && now > self.expires_at
    }

    /// Item count across lines
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_matrix() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = matches!(
                    (from, to),
                    (OrderStatus::Pending, OrderStatus::Confirmed)
                        | (OrderStatus::Pending, OrderStatus::Rejected)
                        | (OrderStatus::Confirmed, OrderStatus::Preparing)
                        | (OrderStatus::Preparing, OrderStatus::OutForDelivery)
                        | (OrderStatus::OutForDelivery, OrderStatus::Delivered)
                );
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} legality mismatch"
                );
            }
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_successor() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert_eq!(OrderStatus::Delivered.successor(), None);
        assert_eq!(OrderStatus::Rejected.successor(), None);
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        let parsed: OrderStatus = "out_for_delivery".parse().unwrap();
        assert_eq!(parsed, OrderStatus::OutForDelivery);
        assert!("Processing".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_merchant_labels() {
        assert_eq!(OrderStatus::Confirmed.merchant_label(), MerchantLabel::Processing);
        assert_eq!(OrderStatus::Preparing.merchant_label(), MerchantLabel::Processing);
        assert_eq!(OrderStatus::OutForDelivery.merchant_label(), MerchantLabel::Ready);
        assert_eq!(OrderStatus::Delivered.merchant_label(), MerchantLabel::Completed);
    }
}
