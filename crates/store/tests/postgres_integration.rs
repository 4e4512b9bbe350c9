//! PostgreSQL integration tests
//!
//! These tests start a PostgreSQL container and therefore need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{ProductId, UserId};
use domain::{
    Cart, Money, Order, OrderStatus, PaymentMethod, PaymentStatus, Product, Role, ShippingInfo,
    User,
};
use sqlx::PgPool;
use store::{CartStore, OrderStore, PostgresStore, ProductStore, StockCommit, UserStore};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE products, carts, orders, users")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn sample_order(user_id: UserId, product: &Product, quantity: u32) -> Order {
    Order::place(
        user_id,
        ShippingInfo::new("New Road", "Kathmandu", "9800000002"),
        vec![product.snapshot_line(quantity)],
        Money::from_rupees(50),
        PaymentMethod::Esewa,
        Utc::now(),
    )
    .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn product_roundtrip_and_conditional_commit() {
    let store = get_test_store().await;
    let product = Product::new("Tote", Money::from_rupees(500), "tote.png", 3);
    let id = product.id;
    store.put_product(product).await.unwrap();

    assert_eq!(store.commit_stock(id, 2).await.unwrap(), StockCommit::Committed);
    assert_eq!(
        store.commit_stock(id, 2).await.unwrap(),
        StockCommit::Insufficient
    );
    assert_eq!(
        store.commit_stock(ProductId::new(), 1).await.unwrap(),
        StockCommit::Missing
    );

    let stored = store.get_product(id).await.unwrap().unwrap();
    assert_eq!((stored.stock, stored.sold_count), (1, 2));

    assert!(store.release_stock(id, 5).await.unwrap());
    let stored = store.get_product(id).await.unwrap().unwrap();
    assert_eq!((stored.stock, stored.sold_count), (6, 0));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_commits_never_oversell() {
    let store = get_test_store().await;
    let product = Product::new("Clutch", Money::from_rupees(900), "clutch.png", 4);
    let id = product.id;
    store.put_product(product).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.commit_stock(id, 1).await }));
    }
    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == StockCommit::Committed {
            committed += 1;
        }
    }

    assert_eq!(committed, 4);
    let stored = store.get_product(id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn cart_document_replace_and_delete() {
    let store = get_test_store().await;
    let user_id = UserId::new();
    let mut cart = Cart::new(user_id);
    cart.add(ProductId::new(), 2).unwrap();
    store.save_cart(cart.clone()).await.unwrap();

    cart.add(ProductId::new(), 1).unwrap();
    store.save_cart(cart.clone()).await.unwrap();
    assert_eq!(store.get_cart(user_id).await.unwrap(), Some(cart));

    assert!(store.delete_cart(user_id).await.unwrap());
    assert!(!store.delete_cart(user_id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn order_roundtrip_and_guarded_updates() {
    let store = get_test_store().await;
    let product = Product::new("Wallet", Money::from_paisa(49_950), "wallet.png", 5);
    let order = sample_order(UserId::new(), &product, 2);
    let id = order.id;
    store.insert_order(order.clone()).await.unwrap();

    let loaded = store.get_order(id).await.unwrap().unwrap();
    assert_eq!(loaded.items, order.items);
    assert_eq!(loaded.total_price, order.total_price);
    assert_eq!(loaded.order_status, OrderStatus::Processing);

    let cancelled = store
        .compare_and_set_status(id, OrderStatus::Processing, OrderStatus::Cancelled, Utc::now())
        .await
        .unwrap();
    assert!(cancelled.is_some());
    let again = store
        .compare_and_set_status(id, OrderStatus::Processing, OrderStatus::Cancelled, Utc::now())
        .await
        .unwrap();
    assert!(again.is_none());

    let paid = store.mark_paid(id, "REF-9", Utc::now()).await.unwrap().unwrap();
    assert_eq!(paid.payment_info.status, PaymentStatus::Succeeded);
    assert!(store.mark_paid(id, "REF-10", Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn orders_listed_newest_first_per_user() {
    let store = get_test_store().await;
    let product = Product::new("Belt", Money::from_rupees(300), "belt.png", 5);
    let user_id = UserId::new();
    let first = sample_order(user_id, &product, 1);
    let mut second = sample_order(user_id, &product, 1);
    second.created_at = first.created_at + chrono::Duration::seconds(5);
    store.insert_order(first.clone()).await.unwrap();
    store.insert_order(second.clone()).await.unwrap();
    store
        .insert_order(sample_order(UserId::new(), &product, 1))
        .await
        .unwrap();

    let mine = store.orders_for_user(user_id).await.unwrap();
    assert_eq!(
        mine.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    assert_eq!(store.all_orders().await.unwrap().len(), 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn users_resolve_by_token() {
    let store = get_test_store().await;
    let user = User::new("Hari", "hari@example.com", Role::Admin);
    store.put_user(user.clone(), "token-hari").await.unwrap();

    assert_eq!(store.find_by_token("token-hari").await.unwrap(), Some(user.clone()));
    assert_eq!(store.get_user(user.id).await.unwrap(), Some(user));
    assert!(store.find_by_token("nope").await.unwrap().is_none());
}
