//! Order engine: checkout, status transitions and stock restoration.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use common::{CustomerId, Money, OrderId, OrderStatus, VariantId};
use order_store::{
    InventoryMovement, MovementQuery, MovementType, NewMovement, NewOrder, NewOrderItem, Order,
    OrderDetails, OrderItem, OrderSummary, Store, UnitOfWork, Variant,
};

use crate::customer::guest_customer;
use crate::error::{OrderError, Result};
use crate::notifier::{ItemSummary, Notifier, OrderCreatedEvent, TracingNotifier};
use crate::policy::EnginePolicy;

use super::request::{CreateOrderRequest, LineItem};
use super::state::check_transition;

/// Ledger note written for each line of a new order.
pub const SALE_NOTE: &str = "Order created";

/// Ledger note written for each line returned by a cancellation.
pub const CANCELLATION_NOTE: &str = "Order cancelled";

/// Threshold used by [`OrderEngine::low_stock`] when none is given.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 1;

/// A validated cart line with its frozen price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlannedLine {
    variant_id: VariantId,
    quantity: u32,
    unit_price: Money,
    subtotal: Money,
    /// Units left for this line after earlier lines of the same variant.
    available: i64,
}

/// Rejects carts that can be refused without touching the store.
fn validate_lines(items: &[LineItem]) -> Result<()> {
    if items.is_empty() {
        return Err(OrderError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    if let Some(line) = items.iter().find(|line| line.quantity == 0) {
        return Err(OrderError::Validation(format!(
            "quantity for variant {} must be at least 1",
            line.variant_id
        )));
    }
    Ok(())
}

/// Checks stock and prices every line against the locked variants.
///
/// A variant listed on several lines is checked against its cumulative
/// quantity.
fn plan_lines(
    items: &[LineItem],
    variants: &HashMap<VariantId, Variant>,
) -> Result<(Vec<PlannedLine>, Money)> {
    let mut remaining: HashMap<VariantId, i64> = HashMap::with_capacity(variants.len());
    let mut lines = Vec::with_capacity(items.len());
    let mut total = Money::zero();

    for item in items {
        let variant = variants
            .get(&item.variant_id)
            .ok_or(OrderError::VariantNotFound(item.variant_id))?;

        let left = remaining
            .entry(item.variant_id)
            .or_insert_with(|| variant.available_stock());
        let available = *left;
        if i64::from(item.quantity) > available {
            return Err(OrderError::InsufficientStock {
                variant_id: item.variant_id,
                requested: item.quantity,
                available,
            });
        }
        *left -= i64::from(item.quantity);

        let subtotal = variant.price.checked_mul(item.quantity).ok_or_else(|| {
            OrderError::Validation(format!(
                "line total for variant {} is out of range",
                item.variant_id
            ))
        })?;
        total = total
            .checked_add(subtotal)
            .ok_or_else(|| OrderError::Validation("order total is out of range".to_string()))?;

        lines.push(PlannedLine {
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: variant.price,
            subtotal,
            available,
        });
    }

    Ok((lines, total))
}

/// Orchestrates order operations over a transactional [`Store`].
///
/// Every operation runs in a single unit of work: a failure before commit
/// leaves no trace. The engine itself holds no mutable state and can be shared
/// between tasks.
pub struct OrderEngine<S: Store> {
    store: S,
    policy: EnginePolicy,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> OrderEngine<S> {
    /// Creates an engine with the default policy that logs notifications.
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: EnginePolicy::default(),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_policy(mut self, policy: EnginePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> EnginePolicy {
        self.policy
    }

    /// Places an order.
    ///
    /// Stock is checked, decremented and recorded in the ledger within one
    /// unit of work; the notification is sent only once that has committed.
    #[tracing::instrument(skip(self, request), fields(lines = request.items.len(), source = ?request.source))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.place_order(&request).await;
        metrics::histogram!("order_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok((order, event)) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = order.order_number,
                    total = %order.total_amount,
                    status = %order.status,
                    "Order created"
                );
                self.dispatch(event);
                Ok(order)
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                match e.kind() {
                    crate::ErrorKind::Persistence => {
                        tracing::error!(error = %e, "Order creation failed")
                    }
                    _ => tracing::info!(error = %e, "Order rejected"),
                }
                Err(e)
            }
        }
    }

    async fn place_order(&self, request: &CreateOrderRequest) -> Result<(Order, OrderCreatedEvent)> {
        validate_lines(&request.items)?;

        let mut tx = self.store.begin().await?;

        let variants = Self::lock_variants(
            &mut tx,
            request.items.iter().map(|line| line.variant_id),
        )
        .await?;
        let (lines, total) = plan_lines(&request.items, &variants)?;

        let customer_id = self.resolve_buyer(&mut tx, request).await?;

        let order = tx
            .insert_order(NewOrder {
                id: OrderId::new(),
                customer_id,
                status: request.initial_status(),
                total_amount: total,
                payment_method: request
                    .payment_method
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            })
            .await?;

        for line in &lines {
            tx.insert_item(NewOrderItem {
                order_id: order.id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
            })
            .await?;

            let change = tx
                .adjust_stock(line.variant_id, -i64::from(line.quantity))
                .await?
                .ok_or(OrderError::InsufficientStock {
                    variant_id: line.variant_id,
                    requested: line.quantity,
                    available: line.available,
                })?;

            self.record_sale(
                &mut tx,
                NewMovement::from_change(change, MovementType::Sale, order.id, SALE_NOTE),
            )
            .await?;
        }

        tx.commit().await?;

        let items = lines
            .iter()
            .map(|line| ItemSummary {
                variant_id: line.variant_id,
                variant_name: variants
                    .get(&line.variant_id)
                    .map(|v| v.name.clone())
                    .unwrap_or_default(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        let event = OrderCreatedEvent::new(&order, request.shipping_address.as_ref(), items);

        Ok((order, event))
    }

    /// Locks each distinct variant in ascending id order.
    async fn lock_variants(
        tx: &mut S::Tx,
        ids: impl Iterator<Item = VariantId>,
    ) -> Result<HashMap<VariantId, Variant>> {
        let ids: BTreeSet<VariantId> = ids.collect();
        let mut variants = HashMap::with_capacity(ids.len());

        for id in ids {
            let variant = tx
                .lock_variant(id)
                .await?
                .ok_or(OrderError::VariantNotFound(id))?;
            variants.insert(id, variant);
        }

        Ok(variants)
    }

    async fn resolve_buyer(
        &self,
        tx: &mut S::Tx,
        request: &CreateOrderRequest,
    ) -> Result<Option<CustomerId>> {
        if let Some(customer_id) = request.customer_id {
            if !tx.customer_exists(customer_id).await? {
                return Err(OrderError::CustomerNotFound(customer_id));
            }
            return Ok(Some(customer_id));
        }

        let Some(customer) = request.shipping_address.as_ref().and_then(guest_customer) else {
            return Ok(None);
        };

        match tx.insert_customer(customer).await {
            Ok(customer) => {
                tracing::debug!(customer_id = %customer.id, "Guest customer created");
                Ok(Some(customer.id))
            }
            Err(e) if self.policy.guest_customer.is_strict() => Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create guest customer, placing anonymous order");
                metrics::counter!("guest_customer_failures_total").increment(1);
                Ok(None)
            }
        }
    }

    async fn record_sale(&self, tx: &mut S::Tx, movement: NewMovement) -> Result<()> {
        let variant_id = movement.variant_id;
        match tx.append_movement(movement).await {
            Ok(_) => Ok(()),
            Err(e) if self.policy.ledger.is_strict() => Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    variant_id = %variant_id,
                    error = %e,
                    "Failed to record inventory movement"
                );
                metrics::counter!("ledger_append_failures_total").increment(1);
                Ok(())
            }
        }
    }

    /// Moves an order to the status named by `status`.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: &str) -> Result<Order> {
        if status.trim().is_empty() {
            return Err(OrderError::Validation("status is required".to_string()));
        }
        let target: OrderStatus = status.parse()?;
        self.transition(order_id, target).await
    }

    /// Moves an order to `target`.
    ///
    /// Entering `cancelled` returns every line's quantity to stock, subject to
    /// the restock policy.
    #[tracing::instrument(skip(self))]
    pub async fn transition(&self, order_id: OrderId, target: OrderStatus) -> Result<Order> {
        let result = self.apply_transition(order_id, target).await;

        match &result {
            Ok(order) => {
                metrics::counter!("order_status_updates_total", "status" => target.as_str())
                    .increment(1);
                tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");
            }
            Err(e) => {
                metrics::counter!("order_status_rejected_total", "reason" => e.reason())
                    .increment(1);
                tracing::info!(error = %e, "Order status update refused");
            }
        }

        result
    }

    async fn apply_transition(&self, order_id: OrderId, target: OrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;

        let current = tx
            .lock_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        check_transition(order_id, current.status, target)?;

        let updated = tx.update_order_status(order_id, target).await?;

        if target == OrderStatus::Cancelled {
            self.restore_stock(&mut tx, order_id).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn restore_stock(&self, tx: &mut S::Tx, order_id: OrderId) -> Result<()> {
        let strict = self.policy.restock.is_strict();
        let items = tx.order_items(order_id).await?;

        let ids: BTreeSet<VariantId> = items.iter().map(|item| item.variant_id).collect();
        let mut present = HashSet::with_capacity(ids.len());
        for id in ids {
            match tx.lock_variant(id).await {
                Ok(Some(_)) => {
                    present.insert(id);
                }
                Ok(None) if strict => return Err(OrderError::VariantNotFound(id)),
                Err(e) if strict => return Err(e.into()),
                Ok(None) => {
                    tracing::warn!(variant_id = %id, "Variant missing, cannot restore stock");
                }
                Err(e) => {
                    tracing::warn!(variant_id = %id, error = %e, "Failed to lock variant");
                }
            }
        }

        let mut skipped = 0u64;
        for item in &items {
            if !present.contains(&item.variant_id) {
                skipped += 1;
                continue;
            }
            match Self::restore_item(tx, order_id, item).await {
                Ok(()) => {}
                Err(e) if strict => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        variant_id = %item.variant_id,
                        quantity = item.quantity,
                        error = %e,
                        "Failed to restore stock"
                    );
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            metrics::counter!("stock_restorations_skipped_total").increment(skipped);
            tracing::warn!(
                order_id = %order_id,
                skipped,
                total = items.len(),
                "Cancellation restored stock partially"
            );
        }

        Ok(())
    }

    async fn restore_item(tx: &mut S::Tx, order_id: OrderId, item: &OrderItem) -> Result<()> {
        let change = tx
            .adjust_stock(item.variant_id, i64::from(item.quantity))
            .await?
            .ok_or(OrderError::VariantNotFound(item.variant_id))?;

        tx.append_movement(NewMovement::from_change(
            change,
            MovementType::Cancellation,
            order_id,
            CANCELLATION_NOTE,
        ))
        .await?;

        Ok(())
    }

    fn dispatch(&self, event: OrderCreatedEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let order_id = event.order_id;
            if let Err(e) = notifier.notify_order_created(event).await {
                tracing::warn!(order_id = %order_id, error = %e, "Order notification failed");
            }
        });
    }

    /// Loads an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Loads an order with its lines by its human-facing number.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: i64) -> Result<OrderDetails> {
        self.store
            .get_order_by_number(order_number)
            .await?
            .ok_or(OrderError::OrderNumberNotFound(order_number))
    }

    /// Lists order headers with buyer names, newest first.
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
        Ok(self.store.list_orders().await?)
    }

    /// Reads the inventory ledger, newest first.
    pub async fn list_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        Ok(self.store.list_movements(query).await?)
    }

    /// Lists variants with fewer than `threshold` units on hand.
    pub async fn low_stock(&self, threshold: Option<i64>) -> Result<Vec<Variant>> {
        let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        Ok(self.store.low_stock_variants(threshold).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(price: i64, stock: Option<i64>) -> Variant {
        let mut variant = Variant::new("M / Black", Money::from_minor(price), 0);
        variant.stock_quantity = stock;
        variant
    }

    fn catalog(variants: &[Variant]) -> HashMap<VariantId, Variant> {
        variants.iter().map(|v| (v.id, v.clone())).collect()
    }

    #[test]
    fn test_validate_rejects_empty_cart() {
        assert!(matches!(
            validate_lines(&[]),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let lines = [
            LineItem::new(VariantId::new(), 1),
            LineItem::new(VariantId::new(), 0),
        ];
        assert!(matches!(
            validate_lines(&lines),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_plan_freezes_price_and_sums_total() {
        let a = variant(1000, Some(5));
        let b = variant(250, Some(10));
        let items = [LineItem::new(a.id, 2), LineItem::new(b.id, 3)];

        let (lines, total) = plan_lines(&items, &catalog(&[a.clone(), b])).unwrap();

        assert_eq!(total, Money::from_minor(2750));
        assert_eq!(lines[0].unit_price, Money::from_minor(1000));
        assert_eq!(lines[0].subtotal, Money::from_minor(2000));
        assert_eq!(lines[0].available, 5);
        assert_eq!(lines[1].subtotal, Money::from_minor(750));
    }

    #[test]
    fn test_plan_checks_repeated_variant_cumulatively() {
        let a = variant(100, Some(3));
        let items = [LineItem::new(a.id, 2), LineItem::new(a.id, 2)];

        let err = plan_lines(&items, &catalog(&[a.clone()])).unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock { variant_id, requested: 2, available: 1 } if variant_id == a.id
        ));
    }

    #[test]
    fn test_plan_treats_unset_stock_as_zero() {
        let a = variant(100, None);
        let err = plan_lines(&[LineItem::new(a.id, 1)], &catalog(&[a])).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { available: 0, .. }
        ));
    }

    #[test]
    fn test_plan_rejects_overflowing_total() {
        let a = variant(i64::MAX / 2, Some(10));
        let err = plan_lines(&[LineItem::new(a.id, 3)], &catalog(&[a])).unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }
}
