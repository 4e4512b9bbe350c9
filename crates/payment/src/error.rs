//! Payment error types.

use common::OrderId;
use store::StoreError;
use thiserror::Error;

/// Errors raised while initiating or verifying a gateway payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The callback payload could not be decoded or failed its signature check.
    #[error("Malformed payment callback: {0}")]
    MalformedCallback(String),

    /// The gateway did not report the payment as complete.
    #[error("Payment not completed (status: {0})")]
    PaymentNotComplete(String),

    /// The gateway status endpoint could not be reached or answered badly.
    #[error("Payment gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// The callback amount does not match the stored order.
    #[error("Paid amount {received} does not match order total {expected}")]
    AmountMismatch { expected: i64, received: String },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order cannot take a payment in its current state.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// The gateway settings are unusable.
    #[error("Invalid gateway configuration: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PaymentError {
    /// Stable machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::MalformedCallback(_) => "MalformedCallback",
            PaymentError::PaymentNotComplete(_) => "PaymentNotComplete",
            PaymentError::GatewayUnreachable(_) => "GatewayUnreachable",
            PaymentError::AmountMismatch { .. } => "AmountMismatch",
            PaymentError::OrderNotFound(_) => "NotFound",
            PaymentError::InvalidTransition(_) => "InvalidTransition",
            PaymentError::Configuration(_) => "Configuration",
            PaymentError::Store(_) => "Store",
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
