//! Inventory ledger and stock level endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use domain::{DEFAULT_LOW_STOCK_THRESHOLD, VariantId};
use order_store::{
    DEFAULT_PAGE_SIZE, InventoryMovement, MovementQuery, MovementType, Store, Variant,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct MovementParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub variant_id: Option<String>,
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockParams {
    pub threshold: Option<i64>,
}

#[derive(Serialize)]
pub struct MovementsResponse {
    pub movements: Vec<InventoryMovement>,
    pub page: usize,
    pub limit: usize,
}

#[derive(Serialize)]
pub struct LowStockResponse {
    pub variants: Vec<Variant>,
    pub threshold: i64,
}

/// GET /inventory/movements: Read the stock ledger, newest first.
#[tracing::instrument(skip(state))]
pub async fn movements<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<MovementParams>, QueryRejection>,
) -> Result<Json<MovementsResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);

    let mut query = MovementQuery::new()
        .page(page, limit)
        .ok_or_else(|| ApiError::BadRequest(format!("page {page} is out of range")))?;
    if let Some(id) = params.variant_id.as_deref().filter(|v| !v.is_empty()) {
        let id: VariantId = id
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid variant_id: {e}")))?;
        query = query.variant_id(id);
    }
    if let Some(kind) = params.movement_type.as_deref().filter(|v| !v.is_empty()) {
        let kind = MovementType::parse(kind)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid movement type: {kind}")))?;
        query = query.movement_type(kind);
    }

    let movements = state.engine.list_movements(query).await?;
    Ok(Json(MovementsResponse {
        movements,
        page,
        limit,
    }))
}

/// GET /inventory/low-stock: Variants below a stock threshold.
#[tracing::instrument(skip(state))]
pub async fn low_stock<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<LowStockParams>, QueryRejection>,
) -> Result<Json<LowStockResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let threshold = params.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);

    let variants = state.engine.low_stock(Some(threshold)).await?;
    Ok(Json(LowStockResponse {
        variants,
        threshold,
    }))
}
