//! Audit trail for privileged order mutations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use thiserror::Error;
use tokio::sync::RwLock;

/// One privileged action against a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub actor: UserId,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub details: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Builds an entry targeting an order.
    pub fn order(
        actor: UserId,
        action: impl Into<String>,
        order_id: impl ToString,
        details: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action: action.into(),
            target_type: "Order".to_string(),
            target_id: order_id.to_string(),
            details: details.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
#[error("Audit log unavailable: {0}")]
pub struct AuditError(pub String);

/// Sink for audit entries. Callers log and ignore failures.
#[async_trait]
pub trait AuditLog: Send + Sync + 'static {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[async_trait]
impl<T: AuditLog + ?Sized> AuditLog for Arc<T> {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        (**self).record(entry).await
    }
}

/// Writes audit entries as structured log events.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            actor = %entry.actor,
            action = %entry.action,
            target_type = %entry.target_type,
            target_id = %entry.target_id,
            details = %entry.details,
            "audit"
        );
        Ok(())
    }
}

/// In-memory audit log for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    failing: Arc<RwLock<bool>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    /// Makes every subsequent `record` call fail.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if *self.failing.read().await {
            return Err(AuditError("audit sink offline".to_string()));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}
