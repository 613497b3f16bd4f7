//! Rows held by the order store.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, MovementId, OrderId, OrderItemId, OrderStatus, VariantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable unit of a product, owned by the catalog.
///
/// The order engine only reads its price and reads/writes its stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: Uuid,
    /// Display name such as `"M / Black"`.
    pub name: String,
    pub price: Money,
    /// Units on hand. `None` when the catalog never set a value.
    pub stock_quantity: Option<i64>,
}

impl Variant {
    /// Creates a variant with a fresh id and a known stock level.
    pub fn new(name: impl Into<String>, price: Money, stock_quantity: i64) -> Self {
        Self {
            id: VariantId::new(),
            product_id: Uuid::new_v4(),
            name: name.into(),
            price,
            stock_quantity: Some(stock_quantity),
        }
    }

    /// Stock available for sale; an unset counter counts as zero.
    pub fn available_stock(&self) -> i64 {
        self.stock_quantity.unwrap_or(0).max(0)
    }
}

/// A buyer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Fields for inserting a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing number, unique and increasing in creation order.
    pub order_number: i64,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting an order header. The store assigns the order number
/// and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub payment_method: Option<String>,
}

/// A single order line. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Variant price at the moment of purchase.
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Fields for inserting an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// An order header together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An order header with its buyer's name and email, as shown in order lists.
///
/// The customer fields are `None` for anonymous orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub customer_email: Option<String>,
}

impl OrderSummary {
    /// Joins an order header with its buyer, if any.
    pub fn new(order: Order, customer: Option<&Customer>) -> Self {
        Self {
            order,
            customer_first_name: customer.map(|c| c.first_name.clone()),
            customer_last_name: customer.map(|c| c.last_name.clone()),
            customer_email: customer.and_then(|c| c.email.clone()),
        }
    }
}

/// Kind of stock-changing event recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Sale,
    Cancellation,
    Adjustment,
}

impl MovementType {
    /// Returns the wire/database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::Cancellation => "cancellation",
            MovementType::Adjustment => "adjustment",
        }
    }

    /// Parses the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sale" => Some(MovementType::Sale),
            "cancellation" => Some(MovementType::Cancellation),
            "adjustment" => Some(MovementType::Adjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger row. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub variant_id: VariantId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Magnitude of the change.
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    /// `None` for system-initiated movements.
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub variant_id: VariantId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub user_id: Option<i64>,
}

impl NewMovement {
    /// Builds a system-initiated movement from an observed stock change.
    pub fn from_change(
        change: StockChange,
        movement_type: MovementType,
        reference: impl ToString,
        note: impl Into<String>,
    ) -> Self {
        Self {
            variant_id: change.variant_id,
            movement_type,
            quantity: (change.new_stock - change.previous_stock).abs(),
            previous_stock: change.previous_stock,
            new_stock: change.new_stock,
            reference_id: Some(reference.to_string()),
            note: Some(note.into()),
            user_id: None,
        }
    }
}

/// Counter values observed around a single stock update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub variant_id: VariantId,
    pub previous_stock: i64,
    pub new_stock: i64,
}
