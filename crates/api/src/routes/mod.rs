//! HTTP route handlers.

pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;

use domain::OrderEngine;
use order_store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub engine: OrderEngine<S>,
}
