use async_trait::async_trait;
use common::{CustomerId, OrderId, OrderStatus, VariantId};

use crate::model::{
    Customer, InventoryMovement, NewCustomer, NewMovement, NewOrder, NewOrderItem, Order,
    OrderDetails, OrderItem, OrderSummary, StockChange, Variant,
};
use crate::{MovementQuery, Result};

/// Core trait for order store implementations.
///
/// Reads on the store itself see committed data only. Every write goes
/// through a [`UnitOfWork`] obtained from [`Store::begin`].
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type handed out by [`Store::begin`].
    type Tx: UnitOfWork;

    /// Starts a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Retrieves a variant by id.
    async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>>;

    /// Retrieves a customer by id.
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Retrieves an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetails>>;

    /// Retrieves an order with its items by its human-facing number.
    async fn get_order_by_number(&self, order_number: i64) -> Result<Option<OrderDetails>>;

    /// Lists order headers with their buyer's contact fields, newest first.
    async fn list_orders(&self) -> Result<Vec<OrderSummary>>;

    /// Retrieves ledger rows matching a query, newest first.
    async fn list_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>>;

    /// Lists variants whose available stock is below `threshold`.
    async fn low_stock_variants(&self, threshold: i64) -> Result<Vec<Variant>>;
}

/// A serializable unit of work over the order store.
///
/// Nothing written through a unit of work is visible to other callers until
/// [`UnitOfWork::commit`] succeeds. Dropping it without committing rolls every
/// write back.
///
/// Callers that lock several variants must lock them in ascending
/// [`VariantId`] order.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads a variant and holds its row lock until the unit of work ends.
    ///
    /// A failure leaves the unit of work usable.
    async fn lock_variant(&mut self, id: VariantId) -> Result<Option<Variant>>;

    /// Returns true if the customer exists.
    async fn customer_exists(&mut self, id: CustomerId) -> Result<bool>;

    /// Inserts a customer.
    ///
    /// A failure leaves the unit of work usable.
    async fn insert_customer(&mut self, customer: NewCustomer) -> Result<Customer>;

    /// Inserts an order header and assigns its order number.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Inserts an order line.
    async fn insert_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    /// Adds `delta` to a variant's stock counter unless the result would be
    /// negative.
    ///
    /// Returns the counter values around the update, or `None` when no row
    /// was updated (unknown variant or not enough stock). A failure leaves the
    /// unit of work usable.
    async fn adjust_stock(&mut self, id: VariantId, delta: i64) -> Result<Option<StockChange>>;

    /// Appends a ledger row.
    ///
    /// A failure leaves the unit of work usable.
    async fn append_movement(&mut self, movement: NewMovement) -> Result<InventoryMovement>;

    /// Reads an order header and holds its row lock until the unit of work ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads the lines of an order.
    async fn order_items(&mut self, id: OrderId) -> Result<Vec<OrderItem>>;

    /// Sets an order's status and returns the updated header.
    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Makes every write of this unit of work durable and visible.
    async fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Returns true if an order exists.
    async fn order_exists(&self, id: OrderId) -> Result<bool> {
        Ok(self.get_order(id).await?.is_some())
    }

    /// Returns the current stock counter of a variant, if it exists.
    async fn stock_of(&self, id: VariantId) -> Result<Option<i64>> {
        Ok(self.get_variant(id).await?.map(|v| v.available_stock()))
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}
