//! Identities supplied by the host application
//!
//! Authentication itself happens outside the hub; these are the already
//! verified identities the hub acts on behalf of.

use serde::{Deserialize, Serialize};
use shared::order::Actor;

/// Signed-in customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSession {
    pub customer_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl CustomerSession {
    pub fn new(customer_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            name: name.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Key the cart is persisted under
    pub fn session_key(&self) -> String {
        format!("cart:{}", self.customer_id)
    }

    pub fn actor(&self) -> Actor {
        Actor::Customer(self.customer_id.clone())
    }
}

/// Signed-in merchant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopIdentity {
    pub shop_id: String,
    pub shop_name: String,
}

impl ShopIdentity {
    pub fn new(shop_id: impl Into<String>, shop_name: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            shop_name: shop_name.into(),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::Shop(self.shop_id.clone())
    }
}

/// Shop an order is placed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopInfo {
    pub shop_id: String,
    pub shop_name: String,
    /// Overrides the hub's default delivery fee when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<f64>,
}

impl ShopInfo {
    pub fn new(shop_id: impl Into<String>, shop_name: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            shop_name: shop_name.into(),
            delivery_fee: None,
        }
    }

    pub fn with_delivery_fee(mut self, fee: f64) -> Self {
        self.delivery_fee = Some(fee);
        self
    }
}

impl From<&ShopIdentity> for ShopInfo {
    fn from(identity: &ShopIdentity) -> Self {
        ShopInfo::new(identity.shop_id.clone(), identity.shop_name.clone())
    }
}
