//! Inventory contract over the product store.

use common::ProductId;
use domain::Product;
use store::{ProductStore, StockCommit};

use crate::error::{Result, SettlementError};

/// Stock authority used by settlement.
///
/// `reserve` only reads; `commit` and `release` are single atomic store
/// updates, so the store never holds negative stock no matter how many
/// settlements run at once.
#[derive(Debug, Clone)]
pub struct Inventory<S> {
    store: S,
}

impl<S: ProductStore> Inventory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Checks that `quantity` units are available and returns the product as read.
    ///
    /// Nothing is held or decremented; the caller must follow up with
    /// [`Inventory::commit`].
    pub async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(SettlementError::ProductNotFound(product_id))?;

        if !product.has_stock_for(quantity) {
            return Err(SettlementError::InsufficientStock {
                product_id,
                name: product.name.clone(),
                requested: quantity,
                available: product.stock,
            });
        }
        Ok(product)
    }

    /// Atomically moves `quantity` units from stock to sold.
    ///
    /// A shortfall here means another settlement won the race after
    /// `reserve` succeeded, reported as `MidSettlementConflict`.
    pub async fn commit(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        match self.store.commit_stock(product_id, quantity).await? {
            StockCommit::Committed => Ok(()),
            StockCommit::Insufficient | StockCommit::Missing => {
                Err(SettlementError::MidSettlementConflict { product_id })
            }
        }
    }

    /// Moves `quantity` units back to stock, clamping the sold counter.
    ///
    /// Returns false if the product no longer exists.
    pub async fn release(&self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let released = self.store.release_stock(product_id, quantity).await?;
        if !released {
            tracing::warn!(%product_id, quantity, "release skipped: product no longer exists");
        }
        Ok(released)
    }
}
