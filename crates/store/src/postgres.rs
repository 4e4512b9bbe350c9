use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{
    Cart, CartItem, Money, Order, OrderLineItem, OrderStatus, PaymentInfo, PaymentStatus,
    Product, ShippingInfo, User,
};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CartStore, OrderStore, ProductStore, StockCommit, UserStore},
};

const ORDER_COLUMNS: &str = "id, user_id, shipping_info, items, items_price_paisa, \
     shipping_price_paisa, total_price_paisa, payment_transaction_id, payment_status, \
     payment_method, order_status, paid_at, delivered_at, created_at";

/// PostgreSQL-backed document store.
///
/// Inventory counters and order status changes are guarded `UPDATE`
/// statements, so the check and the write happen in one statement.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_paisa(row.try_get("price_paisa")?),
            image_url: row.try_get("image_url")?,
            stock: counter("products", row.try_get("stock")?)?,
            sold_count: counter("products", row.try_get("sold_count")?)?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let shipping_info: Json<ShippingInfo> = row.try_get("shipping_info")?;
        let items: Json<Vec<OrderLineItem>> = row.try_get("items")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            shipping_info: shipping_info.0,
            items: items.0,
            items_price: Money::from_paisa(row.try_get("items_price_paisa")?),
            shipping_price: Money::from_paisa(row.try_get("shipping_price_paisa")?),
            total_price: Money::from_paisa(row.try_get("total_price_paisa")?),
            payment_info: PaymentInfo {
                transaction_id: row.try_get("payment_transaction_id")?,
                status: parse_column("orders", row.try_get("payment_status")?)?,
                method: parse_column("orders", row.try_get("payment_method")?)?,
            },
            order_status: parse_column("orders", row.try_get("order_status")?)?,
            paid_at: row.try_get("paid_at")?,
            delivered_at: row.try_get("delivered_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: parse_column("users", row.try_get("role")?)?,
        })
    }

    async fn fetch_orders(&self, sql: &str, user_id: Option<UserId>) -> Result<Vec<Order>> {
        let mut query = sqlx::query(sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id.as_uuid());
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_order)
            .collect()
    }
}

fn counter(table: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|e| StoreError::Corrupt {
        table,
        reason: format!("counter {value} out of range: {e}"),
    })
}

fn parse_column<T>(table: &'static str, value: String) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| StoreError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price_paisa, image_url, stock, sold_count FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn put_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_paisa, image_url, stock, sold_count)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_paisa = EXCLUDED.price_paisa,
                image_url = EXCLUDED.image_url,
                stock = EXCLUDED.stock,
                sold_count = EXCLUDED.sold_count
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.paisa())
        .bind(&product.image_url)
        .bind(i64::from(product.stock))
        .bind(i64::from(product.sold_count))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn commit_stock(&self, id: ProductId, quantity: u32) -> Result<StockCommit> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, sold_count = sold_count + $2
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(StockCommit::Committed);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            StockCommit::Insufficient
        } else {
            StockCommit::Missing
        })
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, sold_count = GREATEST(sold_count - $2, 0)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let items: Option<Json<Vec<CartItem>>> =
            sqlx::query_scalar("SELECT items FROM carts WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        Ok(items.map(|items| Cart {
            user_id,
            items: items.0,
        }))
    }

    async fn save_cart(&self, cart: Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (user_id, items, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET items = EXCLUDED.items, updated_at = NOW()
            "#,
        )
        .bind(cart.user_id.as_uuid())
        .bind(Json(&cart.items))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_cart(&self, user_id: UserId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, shipping_info, items, items_price_paisa,
                shipping_price_paisa, total_price_paisa, payment_transaction_id, payment_status,
                payment_method, order_status, paid_at, delivered_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(Json(&order.shipping_info))
        .bind(Json(&order.items))
        .bind(order.items_price.paisa())
        .bind(order.shipping_price.paisa())
        .bind(order.total_price.paisa())
        .bind(&order.payment_info.transaction_id)
        .bind(order.payment_info.status.as_str())
        .bind(order.payment_info.method.as_str())
        .bind(order.order_status.as_str())
        .bind(order.paid_at)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
            ),
            Some(user_id),
        )
        .await
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"),
            None,
        )
        .await
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET order_status = $3,
                delivered_at = CASE WHEN $3 = 'Delivered' THEN $4 ELSE delivered_at END
            WHERE id = $1 AND order_status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        transaction_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET payment_transaction_id = $2, payment_status = $3, paid_at = $4
            WHERE id = $1 AND payment_status <> $3
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(transaction_id)
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, role FROM users WHERE api_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn put_user(&self, user: User, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, api_token)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                email = EXCLUDED.email,
                role = EXCLUDED.role,
                api_token = EXCLUDED.api_token
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
