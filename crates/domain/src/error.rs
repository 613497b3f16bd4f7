//! Domain error types.

use common::{CustomerId, OrderId, OrderStatus, UnknownStatus, VariantId};
use order_store::StoreError;
use thiserror::Error;

/// Broad class of an [`OrderError`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is malformed. No side effects.
    Validation,
    /// A referenced order, variant or customer does not exist.
    NotFound,
    /// Requested quantity exceeds available stock.
    InsufficientStock,
    /// The order's current status forbids the operation.
    Conflict,
    /// The datastore failed. The caller may retry.
    Persistence,
}

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request failed a local check.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A requested variant does not exist.
    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    /// An explicit customer id does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No order carries the given order number.
    #[error("Order not found: #{0}")]
    OrderNumberNotFound(i64),

    /// A line asks for more units than the variant has left.
    #[error(
        "Insufficient stock for variant {variant_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        variant_id: VariantId,
        requested: u32,
        available: i64,
    },

    /// The order is already cancelled.
    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(OrderId),

    /// The target status cannot be reached from the current one.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The target status string is not a known status.
    #[error("Unknown order status '{0}'")]
    UnknownStatus(String),

    /// The store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl From<UnknownStatus> for OrderError {
    fn from(e: UnknownStatus) -> Self {
        OrderError::UnknownStatus(e.0)
    }
}

impl OrderError {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_) | OrderError::UnknownStatus(_) => ErrorKind::Validation,
            OrderError::VariantNotFound(_)
            | OrderError::CustomerNotFound(_)
            | OrderError::OrderNotFound(_)
            | OrderError::OrderNumberNotFound(_) => ErrorKind::NotFound,
            OrderError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            OrderError::AlreadyCancelled(_) | OrderError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            OrderError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Short label used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::VariantNotFound(_) => "variant_not_found",
            OrderError::CustomerNotFound(_) => "customer_not_found",
            OrderError::OrderNotFound(_) | OrderError::OrderNumberNotFound(_) => "order_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::AlreadyCancelled(_) => "already_cancelled",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::UnknownStatus(_) => "unknown_status",
            OrderError::Persistence(_) => "persistence",
        }
    }
}

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;
