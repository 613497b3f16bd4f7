//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use serde_json::json;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path, query or body.
    BadRequest(String),
    /// Order engine error.
    Order(OrderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Order(err) => order_error_to_response(err),
        };

        metrics::counter!("http_error_responses_total", "status" => status.as_str().to_string())
            .increment(1);
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, serde_json::Value) {
    match &err {
        OrderError::InsufficientStock {
            variant_id,
            requested,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": err.to_string(),
                "variant_id": variant_id,
                "requested": requested,
                "available": available,
            }),
        ),
        OrderError::VariantNotFound(variant_id) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": err.to_string(), "variant_id": variant_id }),
        ),
        OrderError::Validation(_)
        | OrderError::UnknownStatus(_)
        | OrderError::CustomerNotFound(_)
        | OrderError::AlreadyCancelled(_) => {
            (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        OrderError::OrderNotFound(_) | OrderError::OrderNumberNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
        }
        OrderError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, json!({ "error": err.to_string() }))
        }
        OrderError::Persistence(e) => {
            tracing::error!(error = %e, "order persistence failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to persist order changes" }),
            )
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderId, OrderStatus, VariantId};

    fn status_of(err: OrderError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_order_error_status_codes() {
        assert_eq!(
            status_of(OrderError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrderError::VariantNotFound(VariantId::new())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrderError::AlreadyCancelled(OrderId::new())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrderError::OrderNotFound(OrderId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_insufficient_stock_body_names_variant() {
        let variant_id = VariantId::new();
        let (status, body) = order_error_to_response(OrderError::InsufficientStock {
            variant_id,
            requested: 3,
            available: 2,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["variant_id"], variant_id.to_string());
        assert_eq!(body["available"], 2);
    }

    #[test]
    fn test_lookup_and_persistence_errors() {
        assert_eq!(
            status_of(OrderError::OrderNumberNotFound(42)),
            StatusCode::NOT_FOUND
        );

        let (status, body) = order_error_to_response(OrderError::Persistence(
            order_store::StoreError::InvalidQuery("offset is out of range".into()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to persist order changes");
    }

    #[test]
    fn test_bad_request_keeps_message() {
        let response = ApiError::BadRequest("status is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
