//! Order checkout, status and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{CreateOrderRequest, OrderId};
use order_store::{Order, OrderDetails, OrderSummary, Store};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order: Order,
    pub message: &'static str,
}

// -- Handlers --

/// POST /orders: Place an order.
#[tracing::instrument(skip(state, body))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let order = state.engine.create_order(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order,
            message: "Order created successfully",
        }),
    ))
}

/// PUT /orders/{id}: Move an order to a new status.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let status = request
        .status
        .ok_or_else(|| ApiError::BadRequest("status is required".to_string()))?;

    let order = state.engine.update_status(order_id, &status).await?;
    Ok(Json(order))
}

/// GET /orders: List orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    Ok(Json(state.engine.list_orders().await?))
}

/// GET /orders/{id}: Load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.engine.get_order(order_id).await?))
}

/// GET /orders/number/{order_number}: Public order lookup by number.
#[tracing::instrument(skip(state))]
pub async fn get_by_number<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_number: i64 = order_number
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid order number: {order_number}")))?;
    Ok(Json(state.engine.get_order_by_number(order_number).await?))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
