use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, MovementId, OrderId, OrderItemId, OrderStatus, VariantId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::{
    Customer, InventoryMovement, NewCustomer, NewMovement, NewOrder, NewOrderItem, Order,
    OrderDetails, OrderItem, OrderSummary, StockChange, Variant,
};
use crate::store::{Store, UnitOfWork};
use crate::{MovementQuery, Result, StoreError};

/// Write operations of the in-memory store that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    InsertCustomer,
    InsertOrder,
    InsertItem,
    AdjustStock,
    AppendMovement,
    UpdateOrderStatus,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    variants: BTreeMap<VariantId, Variant>,
    customers: HashMap<CustomerId, Customer>,
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
    movements: Vec<InventoryMovement>,
    last_order_number: i64,
}

impl Tables {
    fn details(&self, order: &Order) -> OrderDetails {
        OrderDetails {
            order: order.clone(),
            items: self
                .items
                .iter()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
        }
    }
}

type Faults = Arc<StdMutex<HashSet<FaultPoint>>>;

fn check_fault(faults: &Faults, point: FaultPoint) -> Result<()> {
    let armed = faults
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(&point);
    if armed {
        return Err(StoreError::InjectedFailure(point));
    }
    Ok(())
}

/// In-memory order store for tests and local runs.
///
/// A unit of work holds the store-wide lock for its whole lifetime and stages
/// its writes on a private copy of the tables, so transactions are fully
/// serialized and an uncommitted unit of work leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Faults,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog variant.
    pub async fn insert_variant(&self, variant: Variant) {
        self.tables
            .lock()
            .await
            .variants
            .insert(variant.id, variant);
    }

    /// Adds or replaces a customer.
    pub async fn insert_customer(&self, customer: Customer) {
        self.tables
            .lock()
            .await
            .customers
            .insert(customer.id, customer);
    }

    /// Makes every subsequent call to `point` fail until cleared.
    pub fn fail_on(&self, point: FaultPoint) {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(point);
    }

    /// Removes all injected failures.
    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }

    /// Returns the number of committed customers.
    pub async fn customer_count(&self) -> usize {
        self.tables.lock().await.customers.len()
    }

    /// Returns the number of committed ledger rows.
    pub async fn movement_count(&self) -> usize {
        self.tables.lock().await.movements.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryUnitOfWork {
            guard,
            staged,
            faults: self.faults.clone(),
        })
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>> {
        Ok(self.tables.lock().await.variants.get(&id).cloned())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.tables.lock().await.customers.get(&id).cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).map(|order| tables.details(order)))
    }

    async fn get_order_by_number(&self, order_number: i64) -> Result<Option<OrderDetails>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .find(|order| order.order_number == order_number)
            .map(|order| tables.details(order)))
    }

    async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .map(|order| {
                let customer = order.customer_id.and_then(|id| tables.customers.get(&id));
                OrderSummary::new(order.clone(), customer)
            })
            .collect();
        orders.sort_by(|a, b| b.order.order_number.cmp(&a.order.order_number));
        Ok(orders)
    }

    async fn list_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        let tables = self.tables.lock().await;
        let movements = tables
            .movements
            .iter()
            .rev()
            .filter(|m| {
                if let Some(id) = query.variant_id
                    && m.variant_id != id
                {
                    return false;
                }
                if let Some(kind) = query.movement_type
                    && m.movement_type != kind
                {
                    return false;
                }
                if let Some(ref reference) = query.reference_id
                    && m.reference_id.as_ref() != Some(reference)
                {
                    return false;
                }
                true
            })
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(movements)
    }

    async fn low_stock_variants(&self, threshold: i64) -> Result<Vec<Variant>> {
        let tables = self.tables.lock().await;
        let mut variants: Vec<_> = tables
            .variants
            .values()
            .filter(|v| v.available_stock() < threshold)
            .cloned()
            .collect();
        variants.sort_by_key(|v| v.available_stock());
        Ok(variants)
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    faults: Faults,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_variant(&mut self, id: VariantId) -> Result<Option<Variant>> {
        Ok(self.staged.variants.get(&id).cloned())
    }

    async fn customer_exists(&mut self, id: CustomerId) -> Result<bool> {
        Ok(self.staged.customers.contains_key(&id))
    }

    async fn insert_customer(&mut self, customer: NewCustomer) -> Result<Customer> {
        check_fault(&self.faults, FaultPoint::InsertCustomer)?;
        let customer = Customer {
            id: CustomerId::new(),
            first_name: customer.first_name,
            last_name: customer.last_name,
            email: customer.email,
            phone: customer.phone,
        };
        self.staged.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        check_fault(&self.faults, FaultPoint::InsertOrder)?;
        self.staged.last_order_number += 1;
        let now = Utc::now();
        let order = Order {
            id: order.id,
            order_number: self.staged.last_order_number,
            customer_id: order.customer_id,
            status: order.status,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        check_fault(&self.faults, FaultPoint::InsertItem)?;
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id: item.order_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        };
        self.staged.items.push(item.clone());
        Ok(item)
    }

    async fn adjust_stock(&mut self, id: VariantId, delta: i64) -> Result<Option<StockChange>> {
        check_fault(&self.faults, FaultPoint::AdjustStock)?;
        let Some(variant) = self.staged.variants.get_mut(&id) else {
            return Ok(None);
        };
        let previous_stock = variant.stock_quantity.unwrap_or(0);
        let new_stock = previous_stock + delta;
        if new_stock < 0 {
            return Ok(None);
        }
        variant.stock_quantity = Some(new_stock);
        Ok(Some(StockChange {
            variant_id: id,
            previous_stock,
            new_stock,
        }))
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<InventoryMovement> {
        check_fault(&self.faults, FaultPoint::AppendMovement)?;
        let movement = InventoryMovement {
            id: MovementId::new(),
            variant_id: movement.variant_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            previous_stock: movement.previous_stock,
            new_stock: movement.new_stock,
            reference_id: movement.reference_id,
            note: movement.note,
            user_id: movement.user_id,
            created_at: Utc::now(),
        };
        self.staged.movements.push(movement.clone());
        Ok(movement)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn order_items(&mut self, id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .staged
            .items
            .iter()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        check_fault(&self.faults, FaultPoint::UpdateOrderStatus)?;
        let order = self
            .staged
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Order",
                id: id.to_string(),
            })?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn commit(self) -> Result<()> {
        check_fault(&self.faults, FaultPoint::Commit)?;
        let Self {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }
}
