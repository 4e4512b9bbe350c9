//! Integration tests for the settle → initiate → verify flow.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::DateTime;
use common::OrderId;
use domain::{Cart, Money, Order, PaymentMethod, PaymentStatus, Product, Role, ShippingInfo, User};
use payment::{
    GatewayConfig, HttpGatewayClient, InMemoryGatewayClient, PaymentAdapter, PaymentError,
    PaymentRequest, Signer,
};
use serde_json::json;
use settlement::{InMemoryAuditLog, InMemoryNotificationDispatcher, PlaceOrder, SettlementEngine};
use store::{CartStore, InMemoryStore, OrderStore, ProductStore, UserStore};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "8gBm/:&EnhH.1/q";

struct TestHarness {
    store: InMemoryStore,
    gateway: InMemoryGatewayClient,
    notifier: InMemoryNotificationDispatcher,
    adapter: PaymentAdapter<InMemoryStore, InMemoryGatewayClient, InMemoryNotificationDispatcher>,
    customer: User,
    product: Product,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = InMemoryGatewayClient::new();
        let notifier = InMemoryNotificationDispatcher::new();
        let adapter = PaymentAdapter::new(
            store.clone(),
            gateway.clone(),
            notifier.clone(),
            GatewayConfig::sandbox(SECRET),
        )
        .unwrap()
        .with_notify_timeout(Duration::from_millis(500));

        let customer = User::new("Sita", "sita@example.com", Role::User);
        store.put_user(customer.clone(), "customer").await.unwrap();
        let product = Product::new("A", Money::from_rupees(500), "a.png", 10);
        store.put_product(product.clone()).await.unwrap();

        Self {
            store,
            gateway,
            notifier,
            adapter,
            customer,
            product,
        }
    }

    /// Settles a cart of two units of A with 50 shipping (total 1050).
    async fn settled_order(&self) -> Order {
        let mut cart = Cart::new(self.customer.id);
        cart.add(self.product.id, 2).unwrap();
        self.store.save_cart(cart).await.unwrap();

        let engine = SettlementEngine::new(
            self.store.clone(),
            InMemoryNotificationDispatcher::new(),
            InMemoryAuditLog::new(),
        );
        engine
            .create_order(PlaceOrder {
                user_id: self.customer.id,
                shipping_info: ShippingInfo::new("Thamel", "Kathmandu", "9800000007"),
                payment_method: PaymentMethod::Esewa,
                shipping_price: Money::from_rupees(50),
            })
            .await
            .unwrap()
    }

    async fn initiate(&self, order_id: OrderId) -> PaymentRequest {
        let now = DateTime::from_timestamp_millis(1_718_000_000_000).unwrap();
        self.adapter.initiate_at(order_id, now).await.unwrap()
    }
}

fn callback(status: &str, total_amount: &str, transaction_uuid: &str) -> String {
    BASE64.encode(
        json!({
            "status": status,
            "total_amount": total_amount,
            "transaction_uuid": transaction_uuid,
            "product_code": "EPAYTEST",
            "ref_id": "000AWEO"
        })
        .to_string(),
    )
}

#[tokio::test]
async fn test_initiate_example() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;

    let request = h.initiate(order.id).await;

    assert_eq!(request.form_data.total_amount, "1050");
    assert_eq!(request.form_data.amount, "1000");
    assert_eq!(request.form_data.product_delivery_charge, "50");
    assert_eq!(request.form_data.product_code, "EPAYTEST");
    assert!(
        request
            .form_data
            .transaction_uuid
            .starts_with(&format!("{}-", order.id))
    );
    let signer = Signer::new(SECRET).unwrap();
    assert!(signer.verify(
        &payment::request_message(
            &request.form_data.total_amount,
            &request.form_data.transaction_uuid,
            "EPAYTEST"
        ),
        &request.form_data.signature
    ));
}

#[tokio::test]
async fn test_verify_marks_paid_clears_cart_and_notifies() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let request = h.initiate(order.id).await;
    let uuid = request.form_data.transaction_uuid.clone();
    h.gateway.set_status(&uuid, "COMPLETE", Some("000AWEO")).await;

    let mut fresh_cart = Cart::new(h.customer.id);
    fresh_cart.add(h.product.id, 1).unwrap();
    h.store.save_cart(fresh_cart).await.unwrap();

    let paid = h
        .adapter
        .verify(&callback("COMPLETE", "1050.0", &uuid))
        .await
        .unwrap();

    assert_eq!(paid.payment_info.status, PaymentStatus::Succeeded);
    assert_eq!(paid.payment_info.transaction_id.as_deref(), Some("000AWEO"));
    assert!(paid.paid_at.is_some());
    assert!(h.store.get_cart(h.customer.id).await.unwrap().is_none());
    assert!(h.notifier.wait_for(1, Duration::from_secs(2)).await);
    assert_eq!(
        h.notifier.sent().await[0].subject,
        "Order Confirmation - Payment Successful"
    );

    let queries = h.gateway.queries().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].total_amount, "1050.0");
    assert_eq!(queries[0].transaction_uuid, uuid);
}

#[tokio::test]
async fn test_verify_twice_is_idempotent() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let uuid = h.initiate(order.id).await.form_data.transaction_uuid;
    h.gateway.set_status(&uuid, "COMPLETE", Some("000AWEO")).await;
    let payload = callback("COMPLETE", "1050", &uuid);

    let first = h.adapter.verify(&payload).await.unwrap();
    let stock_after_first = h.store.get_product(h.product.id).await.unwrap().unwrap();
    let second = h.adapter.verify(&payload).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        h.store.get_product(h.product.id).await.unwrap().unwrap(),
        stock_after_first
    );
    assert!(h.notifier.wait_for(1, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_incomplete_callback_persists_nothing() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let uuid = h.initiate(order.id).await.form_data.transaction_uuid;

    let err = h
        .adapter
        .verify(&callback("CANCELED", "1050", &uuid))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::PaymentNotComplete(ref s) if s == "CANCELED"));
    assert!(h.gateway.queries().await.is_empty());
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_info.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_gateway_disagreement_is_not_complete() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let uuid = h.initiate(order.id).await.form_data.transaction_uuid;
    h.gateway.set_status(&uuid, "PENDING", None).await;

    let err = h
        .adapter
        .verify(&callback("COMPLETE", "1050", &uuid))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "PaymentNotComplete");
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert!(stored.paid_at.is_none());
}

#[tokio::test]
async fn test_unreachable_gateway_is_not_a_payment_failure() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let uuid = h.initiate(order.id).await.form_data.transaction_uuid;
    h.gateway.set_unreachable(true).await;

    let err = h
        .adapter
        .verify(&callback("COMPLETE", "1050", &uuid))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "GatewayUnreachable");
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_info.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_unknown_order_prefix_is_not_found() {
    let h = TestHarness::new().await;
    let uuid = format!("{}-1718000000000", OrderId::new());
    h.gateway.set_status(&uuid, "COMPLETE", Some("R")).await;

    let err = h
        .adapter
        .verify(&callback("COMPLETE", "1050", &uuid))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::OrderNotFound(_)));
    assert_eq!(err.kind(), "NotFound");
}

#[tokio::test]
async fn test_amount_mismatch_is_rejected() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let uuid = h.initiate(order.id).await.form_data.transaction_uuid;
    h.gateway.set_status(&uuid, "COMPLETE", Some("R")).await;

    let err = h
        .adapter
        .verify(&callback("COMPLETE", "10", &uuid))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::AmountMismatch { expected: 1050, .. }));
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_info.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_garbage_and_tampered_payloads_are_malformed() {
    let h = TestHarness::new().await;
    let order = h.settled_order().await;
    let uuid = h.initiate(order.id).await.form_data.transaction_uuid;

    let err = h.adapter.verify("not-base64!").await.unwrap_err();
    assert_eq!(err.kind(), "MalformedCallback");

    let tampered = BASE64.encode(
        json!({
            "status": "COMPLETE",
            "total_amount": "1050",
            "transaction_uuid": uuid,
            "product_code": "EPAYTEST",
            "signed_field_names": "total_amount,transaction_uuid,product_code",
            "signature": "AAAA"
        })
        .to_string(),
    );
    let err = h.adapter.verify(&tampered).await.unwrap_err();
    assert_eq!(err.kind(), "MalformedCallback");
    assert!(h.gateway.queries().await.is_empty());
}

#[tokio::test]
async fn test_verify_against_http_status_endpoint() {
    let server = MockServer::start().await;
    let store = InMemoryStore::new();
    let customer = User::new("Hari", "hari@example.com", Role::User);
    store.put_user(customer.clone(), "hari").await.unwrap();
    let product = Product::new("B", Money::from_rupees(250), "b.png", 4);
    let order = Order::place(
        customer.id,
        ShippingInfo::new("Bhaktapur Durbar", "Bhaktapur", "9800000008"),
        vec![product.snapshot_line(4)],
        Money::zero(),
        PaymentMethod::Esewa,
        chrono::Utc::now(),
    )
    .unwrap();
    store.insert_order(order.clone()).await.unwrap();

    let mut config = GatewayConfig::sandbox(SECRET);
    config.verify_url = format!("{}/api/epay/transaction/status/", server.uri());
    let gateway =
        HttpGatewayClient::new(config.verify_url.clone(), Duration::from_secs(2)).unwrap();
    let adapter = PaymentAdapter::new(
        store.clone(),
        gateway,
        InMemoryNotificationDispatcher::new(),
        config,
    )
    .unwrap();

    let uuid = adapter.initiate(order.id).await.unwrap().form_data.transaction_uuid;
    Mock::given(method("GET"))
        .and(query_param("transaction_uuid", uuid.as_str()))
        .and(query_param("total_amount", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product_code": "EPAYTEST",
            "transaction_uuid": uuid,
            "total_amount": 1000.0,
            "status": "COMPLETE",
            "ref_id": "0007G36"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let paid = adapter
        .verify(&callback("COMPLETE", "1000", &uuid))
        .await
        .unwrap();

    assert_eq!(paid.payment_info.transaction_id.as_deref(), Some("0007G36"));
    assert_eq!(paid.user_id, customer.id);
}
