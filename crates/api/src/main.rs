//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::{AppState, SharedAudit, SharedGateway, SharedNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::HttpGatewayClient;
use settlement::{LogNotificationDispatcher, SmtpNotificationDispatcher, TracingAuditLog};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn notifier(config: &Config) -> SharedNotifier {
    match &config.smtp {
        Some(settings) => {
            let dispatcher = SmtpNotificationDispatcher::new(settings.clone())
                .expect("invalid SMTP settings");
            tracing::info!(host = %settings.host, port = settings.port, "sending mail over SMTP");
            Arc::new(dispatcher)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, notifications are only logged");
            Arc::new(LogNotificationDispatcher)
        }
    }
}

async fn serve<S: Store>(store: S, config: Config, metrics_handle: PrometheusHandle) {
    let gateway: SharedGateway = Arc::new(
        HttpGatewayClient::new(config.gateway.verify_url.clone(), config.gateway.timeout)
            .expect("failed to build gateway client"),
    );
    let audit: SharedAudit = Arc::new(TracingAuditLog);
    let state = AppState::new(
        store,
        notifier(&config),
        audit,
        gateway,
        config.gateway.clone(),
    )
    .expect("invalid gateway configuration");

    let app = api::create_app(Arc::new(state), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load .env, if any
    dotenvy::dotenv().ok();

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(gateway = ?config.gateway, "configuration loaded");

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the store and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
