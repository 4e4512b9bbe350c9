//! Order document.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    Money, OrderLineItem, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus, ShippingInfo,
};
use crate::error::DomainError;

/// A settled order.
///
/// Line items and the three price fields are fixed when the order is placed;
/// `items_price` is always the sum of the line totals and `total_price` is
/// always `items_price + shipping_price`. Only the status, payment record and
/// timestamps change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_info: ShippingInfo,
    pub items: Vec<OrderLineItem>,
    pub items_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
    pub payment_info: PaymentInfo,
    pub order_status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Places a new order from frozen line items.
    ///
    /// Totals are computed here and nowhere else.
    pub fn place(
        user_id: UserId,
        shipping_info: ShippingInfo,
        items: Vec<OrderLineItem>,
        shipping_price: Money,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::NoItems);
        }
        if let Some(line) = items.iter().find(|line| line.quantity == 0) {
            return Err(DomainError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        let shipping_price = shipping_price.non_negative()?;
        let items_price = items.iter().try_fold(Money::zero(), |total, line| {
            total.checked_add(line.line_total()?)
        })?;
        let total_price = items_price.checked_add(shipping_price)?;

        Ok(Self {
            id: OrderId::new(),
            user_id,
            shipping_info,
            items,
            items_price,
            shipping_price,
            total_price,
            payment_info: PaymentInfo::pending(method),
            order_status: OrderStatus::Processing,
            paid_at: None,
            delivered_at: None,
            created_at: now,
        })
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|line| line.product_id == product_id)
    }

    /// Returns true if this order proves the owner bought `product_id`.
    pub fn is_purchase_of(&self, product_id: ProductId) -> bool {
        self.order_status.counts_as_purchase() && self.contains_product(product_id)
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Moves the order to `Cancelled` if it is still `Processing`.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.order_status.can_cancel() {
            return Err(DomainError::InvalidTransition {
                from: self.order_status,
                to: OrderStatus::Cancelled,
            });
        }
        self.order_status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Applies a staff status update, stamping `delivered_at` on delivery.
    pub fn apply_staff_status(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.order_status.accepts_staff_update() {
            return Err(DomainError::InvalidTransition {
                from: self.order_status,
                to: next,
            });
        }
        self.order_status = next;
        if next == OrderStatus::Delivered {
            self.delivered_at = Some(now);
        }
        Ok(())
    }

    /// Records a confirmed payment.
    ///
    /// Returns false and leaves the order untouched when the payment was
    /// already recorded, so repeated confirmations are harmless.
    pub fn mark_paid(&mut self, transaction_id: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.payment_info.is_settled() {
            return false;
        }
        self.payment_info.transaction_id = Some(transaction_id.into());
        self.payment_info.status = PaymentStatus::Succeeded;
        self.paid_at = Some(now);
        true
    }
}
