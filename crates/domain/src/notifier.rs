//! Order notifications.
//!
//! Notifications are dispatched after the order has been committed, on a
//! detached task. A failing notifier is logged and never affects the order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, VariantId};
use order_store::Order;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::order::ShippingAddress;

/// Buyer name used when neither an address nor a customer is known.
pub const ANONYMOUS_BUYER: &str = "Customer (No Address Provided)";

/// One line of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub variant_id: VariantId,
    pub variant_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Published once per committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub order_number: i64,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub payment_method: Option<String>,
    pub buyer_name: String,
    pub buyer_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub items: Vec<ItemSummary>,
    pub created_at: DateTime<Utc>,
}

impl OrderCreatedEvent {
    pub(crate) fn new(
        order: &Order,
        address: Option<&ShippingAddress>,
        items: Vec<ItemSummary>,
    ) -> Self {
        let named = address.filter(|a| !a.full_name.trim().is_empty());
        let buyer_name = match (named, order.customer_id) {
            (Some(address), _) => address.full_name.trim().to_string(),
            (None, Some(customer_id)) => format!("Customer ID: {customer_id}"),
            (None, None) => ANONYMOUS_BUYER.to_string(),
        };

        Self {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            total_amount: order.total_amount,
            payment_method: order.payment_method.clone(),
            buyer_name,
            buyer_phone: address.and_then(|a| a.phone.clone()),
            address: address.and_then(|a| a.address.clone()),
            city: address.and_then(|a| a.city.clone()),
            items,
            created_at: order.created_at,
        }
    }
}

/// Errors a notifier can report.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The receiving side is gone.
    #[error("Notification channel closed")]
    ChannelClosed,

    /// Delivery failed.
    #[error("Notification failed: {0}")]
    Failed(String),
}

/// Receives order notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_order_created(&self, event: OrderCreatedEvent) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify_order_created(&self, event: OrderCreatedEvent) -> Result<(), NotifyError> {
        (**self).notify_order_created(event).await
    }
}

/// Writes each notification as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_order_created(&self, event: OrderCreatedEvent) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %event.order_id,
            order_number = event.order_number,
            total = %event.total_amount,
            buyer = %event.buyer_name,
            phone = event.buyer_phone.as_deref().unwrap_or("-"),
            city = event.city.as_deref().unwrap_or("-"),
            items = event.items.len(),
            "New order"
        );
        Ok(())
    }
}

/// Forwards notifications to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<OrderCreatedEvent>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver its events are delivered to.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<OrderCreatedEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify_order_created(&self, event: OrderCreatedEvent) -> Result<(), NotifyError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
