//! Cart-to-order settlement.
//!
//! This crate provides:
//! - `Inventory`: the reserve/commit/release contract over product stock
//! - `CartService`: per-user cart edits
//! - `SettlementEngine`: two-phase cart settlement and the order lifecycle
//! - Collaborator traits for notifications and the audit trail

pub mod cart;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod services;

pub use cart::{CartLineView, CartService, CartView};
pub use engine::{DEFAULT_NOTIFY_TIMEOUT, OrderSummary, PlaceOrder, SettlementEngine};
pub use error::{Result, SettlementError};
pub use inventory::Inventory;
pub use services::{
    AuditEntry, AuditError, AuditLog, InMemoryAuditLog, InMemoryNotificationDispatcher,
    LogNotificationDispatcher, Notification, NotificationDispatcher, NotificationError,
    SmtpNotificationDispatcher, SmtpSettings, TracingAuditLog, spawn_owner_notification,
};
