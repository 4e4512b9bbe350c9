//! Catalog product with its inventory counters.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::order::{Money, OrderLineItem};

/// A catalog product.
///
/// `stock` and `sold_count` are unsigned, so neither can go below zero;
/// every mutation goes through [`Product::try_commit`] or
/// [`Product::release`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub image_url: String,
    pub stock: u32,
    pub sold_count: u32,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        price: Money,
        image_url: impl Into<String>,
        stock: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            image_url: image_url.into(),
            stock,
            sold_count: 0,
        }
    }

    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    /// Moves `quantity` units from stock to sold.
    ///
    /// Returns false without touching the counters when stock is short.
    pub fn try_commit(&mut self, quantity: u32) -> bool {
        if !self.has_stock_for(quantity) {
            return false;
        }
        self.stock -= quantity;
        self.sold_count = self.sold_count.saturating_add(quantity);
        true
    }

    /// Moves `quantity` units back from sold to stock.
    ///
    /// The sold counter is clamped at zero.
    pub fn release(&mut self, quantity: u32) {
        self.stock = self.stock.saturating_add(quantity);
        self.sold_count = self.sold_count.saturating_sub(quantity);
    }

    /// Freezes the current name, price and image into an order line.
    pub fn snapshot_line(&self, quantity: u32) -> OrderLineItem {
        OrderLineItem {
            product_id: self.id,
            name: self.name.clone(),
            unit_price: self.price,
            quantity,
            image: self.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: u32) -> Product {
        Product::new("Sling bag", Money::from_rupees(500), "sling.png", stock)
    }

    #[test]
    fn test_commit_moves_units_to_sold() {
        let mut p = product(5);
        assert!(p.try_commit(2));
        assert_eq!((p.stock, p.sold_count), (3, 2));
    }

    #[test]
    fn test_commit_refuses_to_oversell() {
        let mut p = product(1);
        assert!(!p.try_commit(2));
        assert_eq!((p.stock, p.sold_count), (1, 0));
    }

    #[test]
    fn test_release_clamps_sold_count() {
        let mut p = product(0);
        p.sold_count = 1;
        p.release(3);
        assert_eq!((p.stock, p.sold_count), (3, 0));
    }

    #[test]
    fn test_snapshot_line_copies_current_price() {
        let mut p = product(3);
        let line = p.snapshot_line(2);
        p.price = Money::from_rupees(900);
        assert_eq!(line.unit_price, Money::from_rupees(500));
        assert_eq!(line.line_total(), Ok(Money::from_rupees(1000)));
    }
}
