//! Order engine and its inputs.

mod engine;
mod request;
mod state;

pub use engine::{CANCELLATION_NOTE, DEFAULT_LOW_STOCK_THRESHOLD, OrderEngine, SALE_NOTE};
pub use request::{CreateOrderRequest, LineItem, POINT_OF_SALE, ShippingAddress};
pub use state::{allowed_from, can_transition, check_transition};
