//! Cart operations.

use common::{ProductId, UserId};
use domain::{Cart, Money};
use serde::Serialize;
use store::{CartStore, ProductStore};

use crate::error::{Result, SettlementError};

/// A cart line joined with the current product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image: String,
    pub stock: u32,
    pub quantity: u32,
    pub line_total: Money,
}

/// A cart as shown to its owner, priced at current product prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub user_id: UserId,
    pub items: Vec<CartLineView>,
    pub items_price: Money,
}

/// Service for reading and editing a user's cart.
///
/// Every write replaces the whole cart document.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S> CartService<S>
where
    S: ProductStore + CartStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds units of a product, creating the cart on first use.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        if quantity == 0 {
            return Err(SettlementError::InvalidQuantity(quantity));
        }
        if self.store.get_product(product_id).await?.is_none() {
            return Err(SettlementError::ProductNotFound(product_id));
        }

        let mut cart = self
            .store
            .get_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id));
        cart.add(product_id, quantity)?;
        self.store.save_cart(cart.clone()).await?;

        tracing::debug!(%user_id, %product_id, quantity, "added to cart");
        self.view(cart).await
    }

    /// Returns the user's cart, or an empty one if none exists yet.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView> {
        let cart = self
            .store
            .get_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id));
        self.view(cart).await
    }

    /// Replaces the quantity of a line. Zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        let mut cart =
            self.store
                .get_cart(user_id)
                .await?
                .ok_or_else(|| SettlementError::NotFound {
                    entity: "Cart",
                    id: user_id.to_string(),
                })?;
        cart.set_quantity(product_id, quantity)?;
        self.store.save_cart(cart.clone()).await?;
        self.view(cart).await
    }

    /// Removes a line. Removing from a missing cart is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        let Some(mut cart) = self.store.get_cart(user_id).await? else {
            return Ok(CartView {
                user_id,
                items: Vec::new(),
                items_price: Money::zero(),
            });
        };
        cart.remove(product_id)?;
        self.store.save_cart(cart.clone()).await?;
        self.view(cart).await
    }

    async fn view(&self, cart: Cart) -> Result<CartView> {
        let mut items = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let Some(product) = self.store.get_product(item.product_id).await? else {
                tracing::warn!(product_id = %item.product_id, "cart references a missing product");
                continue;
            };
            items.push(CartLineView {
                product_id: product.id,
                line_total: product.price.multiply(item.quantity),
                name: product.name,
                price: product.price,
                image: product.image_url,
                stock: product.stock,
                quantity: item.quantity,
            });
        }
        let items_price = items.iter().map(|line| line.line_total).sum();
        Ok(CartView {
            user_id: cart.user_id,
            items,
            items_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Product;
    use store::InMemoryStore;

    async fn setup() -> (CartService<InMemoryStore>, InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = Product::new("Scarf", Money::from_rupees(500), "scarf.png", 10);
        store.put_product(product.clone()).await.unwrap();
        (CartService::new(store.clone()), store, product)
    }

    #[tokio::test]
    async fn test_add_creates_cart_and_merges() {
        let (service, store, product) = setup().await;
        let user = UserId::new();

        service.add_to_cart(user, product.id, 1).await.unwrap();
        let view = service.add_to_cart(user, product.id, 2).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 3);
        assert_eq!(view.items_price, Money::from_rupees(1500));
        assert_eq!(store.get_cart(user).await.unwrap().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_zero_and_unknown_product() {
        let (service, _, product) = setup().await;
        let user = UserId::new();

        let err = service.add_to_cart(user, product.id, 0).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidQuantity(0)));

        let err = service
            .add_to_cart(user, ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_missing_cart_is_empty() {
        let (service, _, _) = setup().await;
        let view = service.get_cart(UserId::new()).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.items_price, Money::zero());
    }

    #[tokio::test]
    async fn test_update_item() {
        let (service, _, product) = setup().await;
        let user = UserId::new();

        let err = service.update_item(user, product.id, 2).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotFound { entity: "Cart", .. }));

        service.add_to_cart(user, product.id, 1).await.unwrap();
        let view = service.update_item(user, product.id, 4).await.unwrap();
        assert_eq!(view.items[0].quantity, 4);

        let err = service
            .update_item(user, ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::ItemNotInCart(_)));

        let view = service.update_item(user, product.id, 0).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let (service, _, product) = setup().await;
        let user = UserId::new();

        assert!(service.remove_item(user, product.id).await.unwrap().items.is_empty());

        service.add_to_cart(user, product.id, 1).await.unwrap();
        let view = service.remove_item(user, product.id).await.unwrap();
        assert!(view.items.is_empty());

        let err = service.remove_item(user, product.id).await.unwrap_err();
        assert!(matches!(err, SettlementError::ItemNotInCart(_)));
    }
}
