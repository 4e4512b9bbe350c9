//! HTTP API server for cart settlement, the order lifecycle and gateway
//! payments.
//!
//! Handlers are thin: they authenticate, validate the request body and call
//! into the `settlement` and `payment` crates. Logging goes through `tracing`
//! and counters are exported in Prometheus format at `/metrics`.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, SharedAudit, SharedGateway, SharedNotifier};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Cart
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/add", post(routes::cart::add::<S>))
        .route("/cart/update", put(routes::cart::update::<S>))
        .route("/cart/remove/{product_id}", delete(routes::cart::remove::<S>))
        // Orders
        .route("/order/new", post(routes::orders::create::<S>))
        .route("/order/{id}", get(routes::orders::get::<S>))
        .route("/orders/me", get(routes::orders::mine::<S>))
        .route("/order/cancel/{id}", put(routes::orders::cancel::<S>))
        .route(
            "/order/check-purchase/{product_id}",
            get(routes::orders::check_purchase::<S>),
        )
        // Staff
        .route("/admin/orders", get(routes::admin::list::<S>))
        .route(
            "/admin/order/{id}",
            put(routes::admin::update_status::<S>).delete(routes::admin::delete::<S>),
        )
        // Payments
        .route("/payment/initiate", post(routes::payment::initiate::<S>))
        .route("/payment/verify", get(routes::payment::verify::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
