//! Client for the gateway's transaction status endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Parameters of a status lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    pub product_code: String,
    pub total_amount: String,
    pub transaction_uuid: String,
}

/// The gateway's answer for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayStatus {
    pub status: String,
    #[serde(default)]
    pub ref_id: Option<String>,
}

/// Server-side confirmation of a payment.
///
/// Only this answer is trusted; the browser-supplied callback is not.
#[async_trait]
pub trait GatewayClient: Send + Sync + 'static {
    /// Errors with `GatewayUnreachable` on transport failure, timeout or a
    /// non-success HTTP status.
    async fn transaction_status(&self, query: &StatusQuery) -> Result<GatewayStatus>;
}

#[async_trait]
impl<T: GatewayClient + ?Sized> GatewayClient for Arc<T> {
    async fn transaction_status(&self, query: &StatusQuery) -> Result<GatewayStatus> {
        (**self).transaction_status(query).await
    }
}

/// reqwest-backed status client.
#[derive(Debug, Clone)]
pub struct HttpGatewayClient {
    http: Client,
    verify_url: String,
}

impl HttpGatewayClient {
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            verify_url: verify_url.into(),
        })
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    #[tracing::instrument(skip(self), fields(transaction_uuid = %query.transaction_uuid))]
    async fn transaction_status(&self, query: &StatusQuery) -> Result<GatewayStatus> {
        let response = self
            .http
            .get(&self.verify_url)
            .query(&[
                ("product_code", query.product_code.as_str()),
                ("total_amount", query.total_amount.as_str()),
                ("transaction_uuid", query.transaction_uuid.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PaymentError::GatewayUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "status endpoint returned an error");
            return Err(PaymentError::GatewayUnreachable(format!(
                "status endpoint answered {status}"
            )));
        }

        response
            .json::<GatewayStatus>()
            .await
            .map_err(|e| PaymentError::GatewayUnreachable(format!("unreadable status response: {e}")))
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    statuses: HashMap<String, GatewayStatus>,
    queries: Vec<StatusQuery>,
    unreachable: bool,
}

/// In-memory gateway for testing.
///
/// Unknown transactions are reported as `NOT_FOUND`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGatewayClient {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGatewayClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the answer for one transaction.
    pub async fn set_status(
        &self,
        transaction_uuid: impl Into<String>,
        status: impl Into<String>,
        ref_id: Option<&str>,
    ) {
        self.state.write().await.statuses.insert(
            transaction_uuid.into(),
            GatewayStatus {
                status: status.into(),
                ref_id: ref_id.map(str::to_string),
            },
        );
    }

    /// Makes every lookup fail as if the endpoint were down.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    /// Returns every lookup made so far.
    pub async fn queries(&self) -> Vec<StatusQuery> {
        self.state.read().await.queries.clone()
    }
}

#[async_trait]
impl GatewayClient for InMemoryGatewayClient {
    async fn transaction_status(&self, query: &StatusQuery) -> Result<GatewayStatus> {
        let mut state = self.state.write().await;
        state.queries.push(query.clone());
        if state.unreachable {
            return Err(PaymentError::GatewayUnreachable(
                "connection refused".to_string(),
            ));
        }
        Ok(state
            .statuses
            .get(&query.transaction_uuid)
            .cloned()
            .unwrap_or_else(|| GatewayStatus {
                status: "NOT_FOUND".to_string(),
                ref_id: None,
            }))
    }
}
