//! Order engine for the storefront.
//!
//! This crate provides:
//! - `OrderEngine` for checkout, status transitions and cancellation restock
//! - The order status transition table
//! - Named failure policies for best-effort steps
//! - Guest customer resolution
//! - The `Notifier` seam for post-commit order notifications

pub mod customer;
pub mod error;
pub mod notifier;
pub mod order;
pub mod policy;

pub use common::{CustomerId, Money, OrderId, OrderStatus, VariantId};
pub use customer::split_full_name;
pub use error::{ErrorKind, OrderError, Result};
pub use notifier::{
    ANONYMOUS_BUYER, ChannelNotifier, ItemSummary, Notifier, NotifyError, OrderCreatedEvent,
    TracingNotifier,
};
pub use order::{
    CANCELLATION_NOTE, CreateOrderRequest, DEFAULT_LOW_STOCK_THRESHOLD, LineItem, OrderEngine,
    POINT_OF_SALE, SALE_NOTE, ShippingAddress, allowed_from, can_transition, check_transition,
};
pub use policy::{EnginePolicy, FailurePolicy, InvalidPolicy};
