//! Checkout input.

use common::{CustomerId, OrderStatus, VariantId};
use serde::{Deserialize, Serialize};

/// Channel tag of the in-store point of sale.
pub const POINT_OF_SALE: &str = "pos";

/// One requested line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
        }
    }
}

/// Delivery details supplied at checkout.
///
/// For guest checkout the full name doubles as the buyer identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<String>,
}

impl ShippingAddress {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>, city: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self.city = Some(city.into());
        self
    }
}

/// Request to place an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Existing buyer. Takes precedence over the shipping address name.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,

    #[serde(default)]
    pub payment_method: Option<String>,

    /// Lines in the order they were placed in the cart.
    #[serde(default)]
    pub items: Vec<LineItem>,

    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,

    /// Sales channel tag, e.g. `"pos"` or `"web"`.
    #[serde(default)]
    pub source: Option<String>,
}

impl CreateOrderRequest {
    /// Creates a request for the given lines.
    pub fn new(items: Vec<LineItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    pub fn with_shipping_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns true if the order was rung up at the point of sale.
    pub fn is_point_of_sale(&self) -> bool {
        self.source
            .as_deref()
            .is_some_and(|source| source.trim().eq_ignore_ascii_case(POINT_OF_SALE))
    }

    /// Status a new order starts in.
    ///
    /// Point-of-sale orders are paid and handed over on the spot.
    pub fn initial_status(&self) -> OrderStatus {
        if self.is_point_of_sale() {
            OrderStatus::Completed
        } else {
            OrderStatus::Pending
        }
    }
}
