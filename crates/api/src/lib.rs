//! HTTP API server for the order engine.
//!
//! Provides REST endpoints for checkout, order status updates, order lookups
//! and inventory ledger reads, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use domain::{EnginePolicy, OrderEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).put(routes::orders::update_status::<S>),
        )
        .route(
            "/orders/number/{order_number}",
            get(routes::orders::get_by_number::<S>),
        )
        .route(
            "/inventory/movements",
            get(routes::inventory::movements::<S>),
        )
        .route(
            "/inventory/low-stock",
            get(routes::inventory::low_stock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around `store`.
///
/// Order notifications go to the tracing log.
pub fn create_state<S: Store + 'static>(store: S, policy: EnginePolicy) -> Arc<AppState<S>> {
    let engine = OrderEngine::new(store).with_policy(policy);
    Arc::new(AppState { engine })
}
