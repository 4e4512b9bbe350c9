use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{Cart, Order, OrderStatus, Product, User};

use crate::Result;

/// Outcome of an atomic conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockCommit {
    /// Stock was decremented and the sold counter incremented.
    Committed,
    /// The product exists but has fewer units than requested; nothing changed.
    Insufficient,
    /// No such product.
    Missing,
}

/// Product documents and their inventory counters.
///
/// Implementations must apply [`ProductStore::commit_stock`] and
/// [`ProductStore::release_stock`] as single atomic document updates so
/// concurrent settlements on several server instances can never drive stock
/// below zero.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a product.
    async fn put_product(&self, product: Product) -> Result<()>;

    /// Decrements stock and increments the sold counter by `quantity`, only
    /// if at least `quantity` units are in stock.
    async fn commit_stock(&self, id: ProductId, quantity: u32) -> Result<StockCommit>;

    /// Increments stock and decrements the sold counter (clamped at zero).
    ///
    /// Returns false if the product does not exist.
    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<bool>;
}

/// Cart documents, one per user.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Replaces the whole cart document of `cart.user_id`.
    async fn save_cart(&self, cart: Cart) -> Result<()>;

    /// Deletes a user's cart. Returns false if there was none.
    async fn delete_cart(&self, user_id: UserId) -> Result<bool>;
}

/// Order documents.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Orders of one user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Every order, newest first.
    async fn all_orders(&self) -> Result<Vec<Order>>;

    /// Returns false if the order did not exist.
    async fn delete_order(&self, id: OrderId) -> Result<bool>;

    /// Atomically moves the order from `expected` to `next`.
    ///
    /// Moving to `Delivered` stamps `delivered_at` with `now`. Returns the
    /// updated order, or `None` if the order is missing or no longer in
    /// `expected`.
    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    /// Atomically records a confirmed payment unless one is already recorded.
    ///
    /// Returns the updated order if this call performed the change, `None`
    /// if the order is missing or was already paid.
    async fn mark_paid(
        &self,
        id: OrderId,
        transaction_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Order>>;
}

/// Identity records owned by the account collaborator.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Resolves an opaque API token to its user.
    async fn find_by_token(&self, token: &str) -> Result<Option<User>>;

    /// Inserts or replaces a user together with its API token.
    async fn put_user(&self, user: User, token: &str) -> Result<()>;
}

/// Everything the settlement and payment services need from storage.
pub trait Store:
    ProductStore + CartStore + OrderStore + UserStore + Clone + Send + Sync + 'static
{
}

impl<T> Store for T where
    T: ProductStore + CartStore + OrderStore + UserStore + Clone + Send + Sync + 'static
{
}
