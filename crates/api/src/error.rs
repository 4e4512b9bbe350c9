//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use payment::PaymentError;
use settlement::SettlementError;

/// API-level error type that maps to HTTP responses.
///
/// Every variant renders as `{"success": false, "kind", "message"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or unknown bearer token.
    Unauthorized(String),
    /// Authenticated, but the role does not allow the route.
    Forbidden(String),
    /// Malformed request at the HTTP boundary.
    BadRequest(String),
    /// Cart, settlement or order lifecycle failure.
    Settlement(SettlementError),
    /// Payment initiation or verification failure.
    Payment(PaymentError),
}

impl ApiError {
    /// Stable machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::BadRequest(_) => "Validation",
            ApiError::Settlement(err) => err.kind(),
            ApiError::Payment(err) => err.kind(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Settlement(err) => settlement_status(err),
            ApiError::Payment(err) => payment_status(err),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) | ApiError::BadRequest(msg) => {
                f.write_str(msg)
            }
            ApiError::Settlement(err) => write!(f, "{err}"),
            ApiError::Payment(err) => write!(f, "{err}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        if status.is_server_error() {
            tracing::error!(kind, error = %self, "request failed");
        }
        metrics::counter!("http_errors_total", "kind" => kind).increment(1);

        let body = serde_json::json!({
            "success": false,
            "kind": kind,
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

fn settlement_status(err: &SettlementError) -> StatusCode {
    match err {
        SettlementError::NotFound { .. }
        | SettlementError::ProductNotFound(_)
        | SettlementError::ItemNotInCart(_) => StatusCode::NOT_FOUND,
        SettlementError::Forbidden(_) => StatusCode::FORBIDDEN,
        SettlementError::InvalidTransition { .. }
        | SettlementError::EmptyCart
        | SettlementError::InsufficientStock { .. }
        | SettlementError::InvalidQuantity(_)
        | SettlementError::Validation(_) => StatusCode::BAD_REQUEST,
        SettlementError::MidSettlementConflict { .. } => StatusCode::CONFLICT,
        SettlementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::MalformedCallback(_)
        | PaymentError::PaymentNotComplete(_)
        | PaymentError::AmountMismatch { .. }
        | PaymentError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
        PaymentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
        PaymentError::Configuration(_) | PaymentError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Settlement(SettlementError::Store(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::OrderStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(SettlementError::EmptyCart),
                StatusCode::BAD_REQUEST,
                "EmptyCart",
            ),
            (
                ApiError::from(SettlementError::ProductNotFound(ProductId::new())),
                StatusCode::NOT_FOUND,
                "ProductNotFound",
            ),
            (
                ApiError::from(SettlementError::MidSettlementConflict {
                    product_id: ProductId::new(),
                }),
                StatusCode::CONFLICT,
                "MidSettlementConflict",
            ),
            (
                ApiError::from(SettlementError::InvalidTransition {
                    from: OrderStatus::Shipped,
                    to: OrderStatus::Cancelled,
                }),
                StatusCode::BAD_REQUEST,
                "InvalidTransition",
            ),
            (
                ApiError::from(PaymentError::GatewayUnreachable("down".to_string())),
                StatusCode::BAD_GATEWAY,
                "GatewayUnreachable",
            ),
            (
                ApiError::from(PaymentError::OrderNotFound(common::OrderId::new())),
                StatusCode::NOT_FOUND,
                "NotFound",
            ),
            (
                ApiError::Unauthorized("no token".to_string()),
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
            ),
        ];

        for (err, status, kind) in cases {
            assert_eq!(err.status(), status, "{kind}");
            assert_eq!(err.kind(), kind);
        }
    }
}
