//! Order settlement engine.

use std::time::{Duration, Instant};

use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{Money, Order, OrderLineItem, OrderStatus, PaymentMethod, ShippingInfo, User};
use serde::Serialize;
use store::Store;

use crate::error::{Result, SettlementError};
use crate::inventory::Inventory;
use crate::services::audit::{AuditEntry, AuditLog};
use crate::services::notification::{
    Notification, NotificationDispatcher, spawn_owner_notification,
};

/// Upper bound for one outbound notification.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Input for [`SettlementEngine::create_order`].
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub shipping_info: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub shipping_price: Money,
}

/// Every order plus the sum of their totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub orders: Vec<Order>,
    pub total_amount: Money,
}

/// Converts carts into orders and manages their lifecycle afterwards.
///
/// Settlement is two-phase: every cart line is verified against stock before
/// any line is committed. A commit that loses a race with another settlement
/// releases the lines this attempt already committed, so a failed settlement
/// never leaves a partial decrement behind.
#[derive(Clone)]
pub struct SettlementEngine<S, N, A> {
    store: S,
    inventory: Inventory<S>,
    notifier: N,
    audit: A,
    notify_timeout: Duration,
}

impl<S, N, A> SettlementEngine<S, N, A>
where
    S: Store,
    N: NotificationDispatcher + Clone,
    A: AuditLog,
{
    pub fn new(store: S, notifier: N, audit: A) -> Self {
        Self {
            inventory: Inventory::new(store.clone()),
            store,
            notifier,
            audit,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Overrides the timeout applied to each notification dispatch.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Settles the user's cart into a new order.
    #[tracing::instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn create_order(&self, command: PlaceOrder) -> Result<Order> {
        let started = Instant::now();
        let result = self.settle(command).await;
        metrics::histogram!("settlement_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    units = order.unit_count(),
                    total = %order.total_price,
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("settlement_failures_total", "kind" => e.kind()).increment(1);
                tracing::warn!(error = %e, "settlement failed");
            }
        }
        result
    }

    async fn settle(&self, command: PlaceOrder) -> Result<Order> {
        command.shipping_info.validate()?;

        // 1. Load the cart
        let cart = self
            .store
            .get_cart(command.user_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(SettlementError::EmptyCart)?;

        // 2. Verification pass: read every product, nothing is written
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = self.inventory.reserve(item.product_id, item.quantity).await?;
            lines.push(product.snapshot_line(item.quantity));
        }

        // 3. Price and freeze the order before any stock moves
        let order = Order::place(
            command.user_id,
            command.shipping_info,
            lines,
            command.shipping_price,
            command.payment_method,
            Utc::now(),
        )?;

        // 4. Commit pass
        for (committed, line) in order.items.iter().enumerate() {
            if let Err(e) = self.inventory.commit(line.product_id, line.quantity).await {
                self.compensate(&order.items[..committed]).await;
                return Err(e);
            }
        }

        // 5. Persist the order
        if let Err(e) = self.store.insert_order(order.clone()).await {
            self.compensate(&order.items).await;
            return Err(e.into());
        }

        // 6. The cart is spent; a failed delete does not undo the order
        if let Err(e) = self.store.delete_cart(command.user_id).await {
            tracing::error!(order_id = %order.id, error = %e, "failed to delete settled cart");
        }

        // 7. Cash-on-delivery orders are confirmed right away
        if order.payment_info.method == PaymentMethod::CashOnDelivery {
            spawn_owner_notification(
                self.store.clone(),
                self.notifier.clone(),
                order.clone(),
                Notification::order_placed,
                self.notify_timeout,
            );
        }

        Ok(order)
    }

    /// Releases lines committed by a settlement attempt that did not complete.
    async fn compensate(&self, lines: &[OrderLineItem]) {
        self.release_lines(lines, "compensation").await;
    }

    /// Returns every line's stock, carrying on past failed releases.
    ///
    /// Returns the number of lines whose release failed.
    async fn release_lines(&self, lines: &[OrderLineItem], reason: &'static str) -> usize {
        let mut failed = 0;
        for line in lines {
            if let Err(e) = self.inventory.release(line.product_id, line.quantity).await {
                failed += 1;
                metrics::counter!("stock_release_failures_total", "reason" => reason)
                    .increment(1);
                tracing::error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    reason,
                    error = %e,
                    "stock release failed"
                );
            }
        }
        failed
    }

    /// Cancels an order on behalf of its owner and restores its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, requester: UserId) -> Result<Order> {
        let mut order = self.load_order(order_id).await?;
        if !order.is_owned_by(requester) {
            return Err(SettlementError::Forbidden(
                "You are not authorized to cancel this order".to_string(),
            ));
        }
        order.cancel()?;

        let cancelled = match self
            .store
            .compare_and_set_status(
                order_id,
                OrderStatus::Processing,
                OrderStatus::Cancelled,
                Utc::now(),
            )
            .await?
        {
            Some(order) => order,
            None => return Err(self.lost_race(order_id, OrderStatus::Cancelled).await),
        };

        // The order is already cancelled, so a failed release cannot be retried
        // through this path; every line is still attempted.
        let failed = self.release_lines(&cancelled.items, "cancellation").await;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, failed_releases = failed, "order cancelled");
        Ok(cancelled)
    }

    /// Staff status update. Only a delivered order is frozen.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn update_order_status(
        &self,
        actor: &User,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order> {
        require_privileged(actor)?;
        let order = self.load_order(order_id).await?;
        order.clone().apply_staff_status(next, Utc::now())?;
        if !order.order_status.can_transition_to(next) {
            tracing::warn!(
                %order_id,
                from = %order.order_status,
                to = %next,
                "staff update outside the regular lifecycle"
            );
        }

        let updated = match self
            .store
            .compare_and_set_status(order_id, order.order_status, next, Utc::now())
            .await?
        {
            Some(order) => order,
            None => return Err(self.lost_race(order_id, next).await),
        };

        self.audit(AuditEntry::order(
            actor.id,
            "UPDATE_ORDER_STATUS",
            order_id,
            format!("{} -> {}", order.order_status, next),
        ))
        .await;
        tracing::info!(%order_id, from = %order.order_status, to = %next, "order status updated");
        Ok(updated)
    }

    /// Returns true if the user has a non-cancelled order containing the product.
    #[tracing::instrument(skip(self))]
    pub async fn check_product_purchase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool> {
        let orders = self.store.orders_for_user(user_id).await?;
        Ok(orders.iter().any(|order| order.is_purchase_of(product_id)))
    }

    /// Loads an order visible to the requester.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn get_order(&self, order_id: OrderId, requester: &User) -> Result<Order> {
        let order = self.load_order(order_id).await?;
        if !order.is_owned_by(requester.id) && !requester.is_privileged() {
            return Err(SettlementError::Forbidden(
                "You are not authorized to view this order".to_string(),
            ));
        }
        Ok(order)
    }

    /// Orders of one user, newest first.
    pub async fn my_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Every order with the sum of their totals.
    pub async fn all_orders(&self, actor: &User) -> Result<OrderSummary> {
        require_privileged(actor)?;
        let orders = self.store.all_orders().await?;
        let total_amount = orders.iter().map(|order| order.total_price).sum();
        Ok(OrderSummary {
            orders,
            total_amount,
        })
    }

    /// Removes an order document. Stock is left as it is.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_order(&self, actor: &User, order_id: OrderId) -> Result<()> {
        require_privileged(actor)?;
        if !self.store.delete_order(order_id).await? {
            return Err(SettlementError::order_not_found(order_id));
        }
        self.audit(AuditEntry::order(actor.id, "DELETE_ORDER", order_id, "order deleted"))
            .await;
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::order_not_found(order_id))
    }

    /// Builds the error for a compare-and-set that matched nothing.
    async fn lost_race(&self, order_id: OrderId, to: OrderStatus) -> SettlementError {
        match self.store.get_order(order_id).await {
            Ok(Some(current)) => SettlementError::InvalidTransition {
                from: current.order_status,
                to,
            },
            Ok(None) => SettlementError::order_not_found(order_id),
            Err(e) => e.into(),
        }
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(error = %e, "failed to write audit entry");
        }
    }
}

fn require_privileged(actor: &User) -> Result<()> {
    if actor.is_privileged() {
        Ok(())
    } else {
        Err(SettlementError::Forbidden(format!(
            "Role ({}) is not allowed to access this resource",
            actor.role.as_str()
        )))
    }
}
