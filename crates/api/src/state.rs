//! Shared application state.

use std::sync::Arc;

use payment::{GatewayClient, GatewayConfig, PaymentAdapter, PaymentError};
use settlement::{AuditLog, CartService, NotificationDispatcher, SettlementEngine};
use store::Store;

pub type SharedNotifier = Arc<dyn NotificationDispatcher>;
pub type SharedAudit = Arc<dyn AuditLog>;
pub type SharedGateway = Arc<dyn GatewayClient>;

/// Services reachable from every handler.
pub struct AppState<S: Store> {
    pub store: S,
    pub carts: CartService<S>,
    pub settlement: SettlementEngine<S, SharedNotifier, SharedAudit>,
    pub payments: PaymentAdapter<S, SharedGateway, SharedNotifier>,
}

impl<S: Store> AppState<S> {
    /// Wires the services around one store.
    ///
    /// Fails if the gateway configuration is unusable.
    pub fn new(
        store: S,
        notifier: SharedNotifier,
        audit: SharedAudit,
        gateway: SharedGateway,
        gateway_config: GatewayConfig,
    ) -> Result<Self, PaymentError> {
        let payments =
            PaymentAdapter::new(store.clone(), gateway, notifier.clone(), gateway_config)?;
        Ok(Self {
            carts: CartService::new(store.clone()),
            settlement: SettlementEngine::new(store.clone(), notifier, audit),
            payments,
            store,
        })
    }
}
