//! Domain layer for the storefront settlement service.
//!
//! This crate holds the document types the rest of the workspace passes around:
//! - `Product` with its stock and sold counters
//! - `Cart` as a per-user collection of product quantities
//! - `Order` with frozen line items, payment sub-record and status machine
//! - `User` as the identity record supplied by the auth collaborator

pub mod cart;
pub mod error;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem};
pub use error::DomainError;
pub use order::{
    Money, Order, OrderLineItem, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus,
    ShippingInfo,
};
pub use product::Product;
pub use user::{Role, User};
