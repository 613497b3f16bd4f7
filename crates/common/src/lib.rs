//! Shared types for the storefront order engine.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownStatus};
pub use types::{CustomerId, MovementId, OrderId, OrderItemId, VariantId};
