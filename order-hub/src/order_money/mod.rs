//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts travel as `f64` on the wire. Every sum is computed in `Decimal`
//! and rounded to 2 decimal places (half away from zero) on the way out.

use rust_decimal::prelude::*;
use shared::order::CartLine;
use thiserror::Error;

/// Rounding to 2 decimal places
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: u32 = 9999;

/// Invalid monetary input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmountError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} exceeds maximum allowed ({MAX_PRICE}), got {value}")]
    TooLarge { field: &'static str, value: f64 },

    #[error("quantity must be between 1 and {MAX_QUANTITY}, got {0}")]
    Quantity(u32),
}

/// Validate a monetary value is finite, non-negative and within bounds
pub fn validate_amount(value: f64, field: &'static str) -> Result<(), AmountError> {
    if !value.is_finite() {
        return Err(AmountError::NonFinite { field, value });
    }
    if value < 0.0 {
        return Err(AmountError::Negative { field, value });
    }
    if value > MAX_PRICE {
        return Err(AmountError::TooLarge { field, value });
    }
    Ok(())
}

/// Validate a cart line before it becomes part of an order
pub fn validate_line(line: &CartLine) -> Result<(), AmountError> {
    validate_amount(line.unit_price, "unit_price")?;
    if line.quantity == 0 || line.quantity > MAX_QUANTITY {
        return Err(AmountError::Quantity(line.quantity));
    }
    Ok(())
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// `a + b`, clamped to `Decimal::MAX` on overflow
fn add_or_max(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or_else(|| {
        tracing::warn!(%a, %b, "Monetary sum overflowed, clamping");
        Decimal::MAX
    })
}

/// `unit_price × quantity` for one line, clamped to `Decimal::MAX`
///
/// Carts accept any price; oversized lines are rejected at submission by
/// [`validate_line`], so reads here must never panic.
pub fn line_total(line: &CartLine) -> Decimal {
    to_decimal(line.unit_price)
        .checked_mul(Decimal::from(line.quantity))
        .unwrap_or_else(|| {
            tracing::warn!(
                product_id = %line.product_id,
                unit_price = line.unit_price,
                quantity = line.quantity,
                "Line total overflowed, clamping"
            );
            Decimal::MAX
        })
}

/// Sum of all line totals
pub fn subtotal(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(line_total)
        .fold(Decimal::ZERO, add_or_max)
}

/// Order amounts: `(subtotal, delivery_fee, total)`
pub fn order_amounts(lines: &[CartLine], delivery_fee: f64) -> (f64, f64, f64) {
    let sub = subtotal(lines);
    let fee = to_decimal(delivery_fee);
    (to_f64(sub), to_f64(fee), to_f64(add_or_max(sub, fee)))
}
