use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{Cart, Order, OrderStatus, Product, User};
use tokio::sync::RwLock;

use crate::{
    Result,
    store::{CartStore, OrderStore, ProductStore, StockCommit, UserStore},
};

/// In-memory document store for tests and local runs.
///
/// Each collection sits behind its own lock; every conditional update checks
/// and mutates under a single write guard, which gives the same
/// single-document atomicity as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    users: Arc<RwLock<HashMap<UserId, User>>>,
    tokens: Arc<RwLock<HashMap<String, UserId>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the number of carts stored.
    pub async fn cart_count(&self) -> usize {
        self.carts.read().await.len()
    }

    /// Removes a product document, as the catalog collaborator would.
    ///
    /// Returns false if there was none.
    pub async fn remove_product(&self, id: ProductId) -> bool {
        self.products.write().await.remove(&id).is_some()
    }

    /// Clears every collection.
    pub async fn clear(&self) {
        self.products.write().await.clear();
        self.carts.write().await.clear();
        self.orders.write().await.clear();
        self.users.write().await.clear();
        self.tokens.write().await.clear();
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn put_product(&self, product: Product) -> Result<()> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }

    async fn commit_stock(&self, id: ProductId, quantity: u32) -> Result<StockCommit> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(StockCommit::Missing);
        };
        if product.try_commit(quantity) {
            Ok(StockCommit::Committed)
        } else {
            Ok(StockCommit::Insufficient)
        }
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<bool> {
        let mut products = self.products.write().await;
        match products.get_mut(&id) {
            Some(product) => {
                product.release(quantity);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: Cart) -> Result<()> {
        self.carts.write().await.insert(cart.user_id, cart);
        Ok(())
    }

    async fn delete_cart(&self, user_id: UserId) -> Result<bool> {
        Ok(self.carts.write().await.remove(&user_id).is_some())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(newest_first(
            orders
                .values()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(newest_first(orders.values().cloned().collect()))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.order_status != expected {
            return Ok(None);
        }
        order.order_status = next;
        if next == OrderStatus::Delivered {
            order.delivered_at = Some(now);
        }
        Ok(Some(order.clone()))
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        transaction_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&id) {
            Some(order) => Ok(order
                .mark_paid(transaction_id, paid_at)
                .then(|| order.clone())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        let Some(user_id) = self.tokens.read().await.get(token).copied() else {
            return Ok(None);
        };
        self.get_user(user_id).await
    }

    async fn put_user(&self, user: User, token: &str) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, id| *id != user.id);
        tokens.insert(token.to_string(), user.id);
        self.users.write().await.insert(user.id, user);
        Ok(())
    }
}
