//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by domain invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Quantities must be at least one.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// The product is not part of the cart.
    #[error("Item not found in cart: {product_id}")]
    ItemNotInCart { product_id: ProductId },

    /// An order needs at least one line item.
    #[error("Order has no items")]
    NoItems,

    /// A shipping field is missing or blank.
    #[error("Shipping info is missing {field}")]
    MissingShippingField { field: &'static str },

    /// Monetary amounts handed to the domain may not be negative.
    #[error("Amount must not be negative: {paisa} paisa")]
    NegativeAmount { paisa: i64 },

    /// A price computation left the representable range.
    #[error("Amount is too large")]
    AmountOverflow,

    /// The order state machine does not allow this move.
    #[error("Invalid state transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status string that does not name an order status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
