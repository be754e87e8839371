//! Order events - committed store writes and per-query change classification

use super::query::OrderQuery;
use super::snapshot::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Who performed a write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(String),
    Shop(String),
    /// Housekeeping performed by the hub itself (expiry)
    System,
}

impl Actor {
    pub fn label(&self) -> &str {
        match self {
            Actor::Customer(id) | Actor::Shop(id) => id,
            Actor::System => "system",
        }
    }
}

/// Committed write, broadcast after the transaction commits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Global sequence number, strictly increasing in commit order
    pub sequence: u64,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
    pub actor: Actor,
    pub event_type: OrderEventType,
    /// Document before the write (`None` for creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Order>,
    /// Document after the write
    pub order: Order,
}

/// Event type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventType {
    OrderCreated,
    StatusChanged {
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// How a write affected a query's result set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Document entered the result set
    Added,
    /// Document stayed in the result set with new field values
    Modified,
    /// Document left the result set
    Removed,
}

/// One classified change for a subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderChange {
    pub kind: ChangeKind,
    pub order: Order,
}

/// Changes delivered together, tagged with the sequence they bring the view up to
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeBatch {
    pub sequence: u64,
    pub changes: Vec<OrderChange>,
    /// Snapshot taken when the subscription (re)started; every change is `Added`
    #[serde(default)]
    pub initial: bool,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Split into (added, modified, removed)
    pub fn partition(&self) -> (Vec<&Order>, Vec<&Order>, Vec<&Order>) {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();
        for change in &self.changes {
            match change.kind {
                ChangeKind::Added => added.push(&change.order),
                ChangeKind::Modified => modified.push(&change.order),
                ChangeKind::Removed => removed.push(&change.order),
            }
        }
        (added, modified, removed)
    }
}

impl OrderEvent {
    /// Classify this event against a query
    ///
    /// Returns `None` when the document is outside the result set both before
    /// and after the write.
    pub fn classify(&self, query: &OrderQuery) -> Option<OrderChange> {
        let was_in = self.before.as_ref().is_some_and(|b| query.matches(b));
        let is_in = query.matches(&self.order);
        let kind = match (was_in, is_in) {
            (false, true) => ChangeKind::Added,
            (true, true) => ChangeKind::Modified,
            (true, false) => ChangeKind::Removed,
            (false, false) => return None,
        };
        Some(OrderChange {
            kind,
            order: self.order.clone(),
        })
    }
}
