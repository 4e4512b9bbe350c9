//! Settlement error types.

use common::ProductId;
use domain::{DomainError, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while managing carts and settling orders.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The requested document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the resource or lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The order state machine does not allow the requested change.
    #[error("Invalid state transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The user has no cart or the cart has no lines.
    #[error("Your cart is empty")]
    EmptyCart,

    /// A cart line asks for more units than are in stock.
    #[error("Insufficient stock for product: {name} (requested {requested}, available {available})")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// A cart line references a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Stock verified in the first pass was gone by the commit pass.
    #[error("Stock for product {product_id} changed during settlement; no order was created")]
    MidSettlementConflict { product_id: ProductId },

    /// Quantities must be at least one.
    #[error("Quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),

    /// The product is not part of the cart.
    #[error("Item not found in cart: {0}")]
    ItemNotInCart(ProductId),

    /// Request data violates a domain rule.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    pub(crate) fn order_not_found(id: impl ToString) -> Self {
        SettlementError::NotFound {
            entity: "Order",
            id: id.to_string(),
        }
    }

    /// Stable machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementError::NotFound { .. } => "NotFound",
            SettlementError::Forbidden(_) => "Forbidden",
            SettlementError::InvalidTransition { .. } => "InvalidTransition",
            SettlementError::EmptyCart => "EmptyCart",
            SettlementError::InsufficientStock { .. } => "InsufficientStock",
            SettlementError::ProductNotFound(_) => "ProductNotFound",
            SettlementError::MidSettlementConflict { .. } => "MidSettlementConflict",
            SettlementError::InvalidQuantity(_) => "InvalidQuantity",
            SettlementError::ItemNotInCart(_) => "ItemNotInCart",
            SettlementError::Validation(_) => "Validation",
            SettlementError::Store(_) => "Store",
        }
    }
}

impl From<DomainError> for SettlementError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidQuantity { quantity } => SettlementError::InvalidQuantity(quantity),
            DomainError::ItemNotInCart { product_id } => SettlementError::ItemNotInCart(product_id),
            DomainError::InvalidTransition { from, to } => {
                SettlementError::InvalidTransition { from, to }
            }
            other => SettlementError::Validation(other.to_string()),
        }
    }
}

/// Convenience type alias for settlement results.
pub type Result<T> = std::result::Result<T, SettlementError>;
