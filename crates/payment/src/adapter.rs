//! Payment initiation and callback reconciliation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Order, OrderStatus};
use serde::Serialize;
use settlement::{
    DEFAULT_NOTIFY_TIMEOUT, Notification, NotificationDispatcher, spawn_owner_notification,
};
use store::Store;

use crate::callback::EsewaCallback;
use crate::config::GatewayConfig;
use crate::error::{PaymentError, Result};
use crate::gateway::{GatewayClient, StatusQuery};
use crate::signature::{REQUEST_SIGNED_FIELDS, Signer, request_message};

/// Form fields the browser posts to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentForm {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

/// Where and what to submit to start a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub payment_url: String,
    #[serde(rename = "formData")]
    pub form_data: PaymentForm,
}

/// Adapter between stored orders and the redirect gateway.
pub struct PaymentAdapter<S, G, N> {
    store: S,
    gateway: G,
    notifier: N,
    config: Arc<GatewayConfig>,
    signer: Signer,
    notify_timeout: Duration,
}

impl<S, G, N> PaymentAdapter<S, G, N>
where
    S: Store,
    G: GatewayClient,
    N: NotificationDispatcher + Clone,
{
    pub fn new(store: S, gateway: G, notifier: N, config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let signer = Signer::new(&config.secret_key)?;
        Ok(Self {
            store,
            gateway,
            notifier,
            config: Arc::new(config),
            signer,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        })
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Builds the signed request for an order, stamped with the current time.
    pub async fn initiate(&self, order_id: OrderId) -> Result<PaymentRequest> {
        self.initiate_at(order_id, Utc::now()).await
    }

    /// Builds the signed request for an order at the given clock reading.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_at(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<PaymentRequest> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        if order.payment_info.is_settled() {
            return Err(PaymentError::InvalidTransition(format!(
                "order {order_id} is already paid"
            )));
        }
        if order.order_status == OrderStatus::Cancelled {
            return Err(PaymentError::InvalidTransition(format!(
                "order {order_id} is cancelled"
            )));
        }

        let product_code = self.config.product_code.trim().to_string();
        let total_amount = order.total_price.rounded_rupees().to_string();
        let transaction_uuid = format!("{order_id}-{}", now.timestamp_millis());
        let signature = self.signer.sign(&request_message(
            &total_amount,
            &transaction_uuid,
            &product_code,
        ));

        metrics::counter!("payments_initiated_total").increment(1);
        tracing::info!(%order_id, %transaction_uuid, "payment initiated");

        Ok(PaymentRequest {
            payment_url: self.config.initiate_url.clone(),
            form_data: PaymentForm {
                amount: order.items_price.rounded_rupees().to_string(),
                tax_amount: "0".to_string(),
                total_amount,
                transaction_uuid,
                product_code,
                product_service_charge: "0".to_string(),
                product_delivery_charge: order.shipping_price.rounded_rupees().to_string(),
                success_url: self.config.success_url.clone(),
                failure_url: self.config.failure_url.clone(),
                signed_field_names: REQUEST_SIGNED_FIELDS.to_string(),
                signature,
            },
        })
    }

    /// Reconciles a gateway callback with the stored order.
    ///
    /// Repeating a verified callback returns the stored order unchanged.
    #[tracing::instrument(skip(self, encoded))]
    pub async fn verify(&self, encoded: &str) -> Result<Order> {
        let result = self.reconcile(encoded).await;
        if let Err(e) = &result {
            metrics::counter!("payment_verification_failures_total", "kind" => e.kind())
                .increment(1);
            tracing::warn!(error = %e, "payment verification failed");
        }
        result
    }

    async fn reconcile(&self, encoded: &str) -> Result<Order> {
        // 1. Decode and authenticate the callback
        let callback = EsewaCallback::decode(encoded)?;
        callback.verify_signature(&self.signer)?;
        if !callback.is_complete() {
            return Err(PaymentError::PaymentNotComplete(callback.status));
        }

        // 2. Ask the gateway; only its answer counts
        let confirmation = self
            .gateway
            .transaction_status(&StatusQuery {
                product_code: callback.product_code.clone(),
                total_amount: callback.total_amount.clone(),
                transaction_uuid: callback.transaction_uuid.clone(),
            })
            .await?;
        if confirmation.status != crate::callback::STATUS_COMPLETE {
            return Err(PaymentError::PaymentNotComplete(confirmation.status));
        }

        // 3. Locate the order
        let order_id = callback.order_id()?;
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        if order.payment_info.is_settled() {
            tracing::info!(%order_id, "payment already recorded");
            metrics::counter!("payments_verified_total", "outcome" => "duplicate").increment(1);
            return Ok(order);
        }

        // 4. The paid amount must match what was signed at initiation
        let expected = order.total_price.rounded_rupees();
        if callback.total_paisa() != Some(expected * 100) {
            return Err(PaymentError::AmountMismatch {
                expected,
                received: callback.total_amount,
            });
        }

        // 5. Record the payment once
        let reference = confirmation
            .ref_id
            .as_deref()
            .unwrap_or_else(|| callback.transaction_reference());
        let Some(paid) = self.store.mark_paid(order_id, reference, Utc::now()).await? else {
            // Lost to a concurrent verification, or the order vanished.
            return self
                .store
                .get_order(order_id)
                .await?
                .ok_or(PaymentError::OrderNotFound(order_id));
        };

        // 6. The cart is spent
        if let Err(e) = self.store.delete_cart(paid.user_id).await {
            tracing::error!(%order_id, error = %e, "failed to clear cart after payment");
        }

        // 7. Receipt
        spawn_owner_notification(
            self.store.clone(),
            self.notifier.clone(),
            paid.clone(),
            Notification::payment_confirmed,
            self.notify_timeout,
        );

        metrics::counter!("payments_verified_total", "outcome" => "paid").increment(1);
        tracing::info!(%order_id, reference, "payment verified");
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGatewayClient;
    use domain::{Money, PaymentMethod, Product, ShippingInfo};
    use settlement::InMemoryNotificationDispatcher;
    use store::{InMemoryStore, OrderStore};

    type Adapter =
        PaymentAdapter<InMemoryStore, InMemoryGatewayClient, InMemoryNotificationDispatcher>;

    async fn setup(shipping_paisa: i64) -> (Adapter, InMemoryStore, Order) {
        let store = InMemoryStore::new();
        let product = Product::new("Bag", Money::from_paisa(50_025), "bag.png", 5);
        let order = Order::place(
            common::UserId::new(),
            ShippingInfo::new("Lakeside", "Pokhara", "9800000006"),
            vec![product.snapshot_line(2)],
            Money::from_paisa(shipping_paisa),
            PaymentMethod::Esewa,
            Utc::now(),
        )
        .unwrap();
        store.insert_order(order.clone()).await.unwrap();

        let adapter = PaymentAdapter::new(
            store.clone(),
            InMemoryGatewayClient::new(),
            InMemoryNotificationDispatcher::new(),
            GatewayConfig::sandbox("8gBm/:&EnhH.1/q"),
        )
        .unwrap();
        (adapter, store, order)
    }

    #[tokio::test]
    async fn test_initiate_rounds_amounts() {
        let (adapter, _, order) = setup(4_950).await;
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let request = adapter.initiate_at(order.id, now).await.unwrap();
        let form = &request.form_data;

        // 2 x 500.25 = 1000.50, shipping 49.50
        assert_eq!(form.amount, "1001");
        assert_eq!(form.product_delivery_charge, "50");
        assert_eq!(form.total_amount, "1050");
        assert_eq!(form.transaction_uuid, format!("{}-1700000000000", order.id));
        assert_eq!(form.signed_field_names, REQUEST_SIGNED_FIELDS);
        assert_eq!(request.payment_url, adapter.config().initiate_url);
    }

    #[tokio::test]
    async fn test_initiate_is_deterministic_per_clock_reading() {
        let (adapter, _, order) = setup(0).await;
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let later = DateTime::from_timestamp_millis(1_700_000_000_001).unwrap();

        let first = adapter.initiate_at(order.id, now).await.unwrap();
        let second = adapter.initiate_at(order.id, now).await.unwrap();
        let third = adapter.initiate_at(order.id, later).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.form_data.signature, third.form_data.signature);
    }

    #[tokio::test]
    async fn test_initiate_unknown_order() {
        let (adapter, _, _) = setup(0).await;
        let err = adapter.initiate(OrderId::new()).await.unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_initiate_rejects_paid_and_cancelled() {
        let (adapter, store, order) = setup(0).await;
        store.mark_paid(order.id, "R", Utc::now()).await.unwrap();
        let err = adapter.initiate(order.id).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidTransition");

        let (adapter, store, order) = setup(0).await;
        store
            .compare_and_set_status(
                order.id,
                OrderStatus::Processing,
                OrderStatus::Cancelled,
                Utc::now(),
            )
            .await
            .unwrap();
        let err = adapter.initiate(order.id).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidTransition");
    }

    #[test]
    fn test_request_serializes_form_data_key() {
        let request = PaymentRequest {
            payment_url: "https://gateway/form".to_string(),
            form_data: PaymentForm {
                amount: "1".to_string(),
                tax_amount: "0".to_string(),
                total_amount: "1".to_string(),
                transaction_uuid: "x-1".to_string(),
                product_code: "EPAYTEST".to_string(),
                product_service_charge: "0".to_string(),
                product_delivery_charge: "0".to_string(),
                success_url: "s".to_string(),
                failure_url: "f".to_string(),
                signed_field_names: REQUEST_SIGNED_FIELDS.to_string(),
                signature: "sig".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["payment_url"], "https://gateway/form");
        assert_eq!(json["formData"]["transaction_uuid"], "x-1");
    }
}
