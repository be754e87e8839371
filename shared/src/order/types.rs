//! Shared types for carts and order items

use serde::{Deserialize, Serialize};

// ============================================================================
// Catalog Input
// ============================================================================

/// Product as seen by the storefront when the customer taps "add to cart".
///
/// Only the fields needed to build a [`CartLine`] are carried; live catalog
/// data is never re-read after the line is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRef {
    /// Product ID
    pub product_id: String,
    /// Product name
    pub name: String,
    /// Unit price
    pub unit_price: f64,
    /// Image reference (URL or asset key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ProductRef {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, unit_price: f64) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

// ============================================================================
// Cart Line
// ============================================================================

/// One line of a customer's cart.
///
/// Lines are keyed by `(product_id, selected_variant)`; the quantity is
/// always at least 1. A line whose quantity would reach 0 is removed instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    /// Product ID
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    /// Unit price snapshot
    pub unit_price: f64,
    /// Image reference snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Selected variant (e.g. size "M")
    pub selected_variant: String,
    /// Quantity (>= 1)
    pub quantity: u32,
}

impl CartLine {
    /// Build a new line from a product and variant
    pub fn from_product(product: &ProductRef, variant: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product.product_id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            image: product.image.clone(),
            selected_variant: variant.into(),
            quantity: quantity.max(1),
        }
    }

    /// Whether this line has the given `(product_id, variant)` key
    pub fn matches(&self, product_id: &str, variant: &str) -> bool {
        self.product_id == product_id && self.selected_variant == variant
    }
}

// ============================================================================
// Delivery Location
// ============================================================================

/// WGS84 coordinates for delivery
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DeliveryLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl DeliveryLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Coordinates are finite and inside the valid lat/lng ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_product_floors_quantity() {
        let product = ProductRef::new("kurta", "Kurta", 3500.0);
        let line = CartLine::from_product(&product, "M", 0);
        assert_eq!(line.quantity, 1);
        assert!(line.matches("kurta", "M"));
        assert!(!line.matches("kurta", "L"));
    }

    #[test]
    fn test_location_validity() {
        assert!(DeliveryLocation::new(24.86, 67.0).is_valid());
        assert!(!DeliveryLocation::new(91.0, 0.0).is_valid());
        assert!(!DeliveryLocation::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_cart_line_json_shape() {
        let line = CartLine::from_product(&ProductRef::new("scarf", "Scarf", 1200.0), "One Size", 1);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["selected_variant"], "One Size");
        assert!(json.get("image").is_none());
    }
}
