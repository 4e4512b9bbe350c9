//! Collaborator services used by settlement.

pub mod audit;
pub mod notification;

pub use audit::{AuditEntry, AuditError, AuditLog, InMemoryAuditLog, TracingAuditLog};
pub use notification::{
    InMemoryNotificationDispatcher, LogNotificationDispatcher, Notification,
    NotificationDispatcher, NotificationError, SmtpNotificationDispatcher, SmtpSettings,
    spawn_owner_notification,
};
