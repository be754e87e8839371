//! Cart Aggregator
//!
//! Per-customer, session-scoped set of cart lines keyed by
//! `(product_id, selected_variant)`. Totals are always recomputed from the
//! lines. Every mutation writes the full snapshot through to [`CartStorage`];
//! a failed write is logged and the in-memory cart stays as mutated.

pub mod storage;

pub use storage::{CartStorage, CartStorageError, RedbCartStorage};

use crate::auth::CustomerSession;
use crate::order_money;
use shared::order::{CartLine, ProductRef};
use std::sync::Arc;

/// Clamp a caller-supplied quantity into the `u32` line range
fn clamp_quantity(qty: i64) -> u32 {
    u32::try_from(qty.max(1)).unwrap_or(u32::MAX)
}

pub struct CartAggregator {
    session_key: String,
    lines: Vec<CartLine>,
    storage: Arc<dyn CartStorage>,
}

impl std::fmt::Debug for CartAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartAggregator")
            .field("session_key", &self.session_key)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

impl CartAggregator {
    /// Empty cart for a session (does not read storage)
    pub fn new(session: &CustomerSession, storage: Arc<dyn CartStorage>) -> Self {
        Self {
            session_key: session.session_key(),
            lines: Vec::new(),
            storage,
        }
    }

    /// Cart restored from the session's persisted snapshot
    ///
    /// An unreadable snapshot yields an empty cart. Lines below quantity 1
    /// are dropped.
    pub fn restore(session: &CustomerSession, storage: Arc<dyn CartStorage>) -> Self {
        let mut cart = Self::new(session, storage);
        match cart.storage.load(&cart.session_key) {
            Ok(Some(lines)) => {
                let before = lines.len();
                cart.lines = lines.into_iter().filter(|l| l.quantity >= 1).collect();
                if cart.lines.len() != before {
                    tracing::warn!(
                        session = %cart.session_key,
                        dropped = before - cart.lines.len(),
                        "Dropped zero-quantity lines from restored cart"
                    );
                }
                tracing::debug!(session = %cart.session_key, lines = cart.lines.len(), "Cart restored");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(session = %cart.session_key, error = %e, "Failed to restore cart, starting empty");
            }
        }
        cart
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Add `qty` of a product variant, merging into an existing line
    ///
    /// `qty` below 1 is treated as 1.
    pub fn add_item(&mut self, product: &ProductRef, variant: &str, qty: i64) {
        let qty = clamp_quantity(qty);
        match self
            .lines
            .iter_mut()
            .find(|l| l.matches(&product.product_id, variant))
        {
            Some(line) => line.quantity = line.quantity.saturating_add(qty),
            None => self
                .lines
                .push(CartLine::from_product(product, variant, qty)),
        }
        self.persist();
    }

    /// Remove the matching line (no-op if absent)
    pub fn remove_item(&mut self, product_id: &str, variant: &str) {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(product_id, variant));
        if self.lines.len() != before {
            self.persist();
        }
    }

    /// Replace a line's quantity; below 1 removes the line
    pub fn set_quantity(&mut self, product_id: &str, variant: &str, qty: i64) {
        if qty < 1 {
            self.remove_item(product_id, variant);
            return;
        }
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.matches(product_id, variant))
        {
            line.quantity = clamp_quantity(qty);
            self.persist();
        }
    }

    /// Empty the cart and drop its persisted snapshot
    pub fn clear(&mut self) {
        self.lines.clear();
        if let Err(e) = self.storage.remove(&self.session_key) {
            tracing::warn!(session = %self.session_key, error = %e, "Failed to clear persisted cart");
        }
    }

    /// `Σ unit_price × quantity`, rounded to 2 dp
    pub fn total(&self) -> f64 {
        order_money::to_f64(order_money::subtotal(&self.lines))
    }

    /// `Σ quantity`
    pub fn count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Owned copy of the lines, for order submission
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.session_key, &self.lines) {
            tracing::warn!(
                session = %self.session_key,
                code = %e.code(),
                error = %e,
                "Failed to persist cart"
            );
        }
    }
}
