//! Per-user shopping cart.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's cart: ordered lines, at most one per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.quantity)
    }

    /// Adds units of a product, merging into an existing line.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        match self.items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => self.items.push(CartItem {
                product_id,
                quantity,
            }),
        }
        Ok(())
    }

    /// Replaces the quantity of an existing line; zero removes it.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        let item = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
            .ok_or(DomainError::ItemNotInCart { product_id })?;
        item.quantity = quantity;
        Ok(())
    }

    /// Removes a line.
    pub fn remove(&mut self, product_id: ProductId) -> Result<(), DomainError> {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        if self.items.len() == before {
            return Err(DomainError::ItemNotInCart { product_id });
        }
        Ok(())
    }
}
