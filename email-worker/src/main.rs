//! Email Worker - CloudEvents receiver that dispatches emails.
//!
//! Receives push-delivered CloudEvents over HTTP and runs the send pipeline
//! for each one. Failures that may be transient answer 500 so the event bus
//! redelivers the event.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use email_worker::template::store;
use email_worker::web::{router, AppState};
use email_worker::{Config, Dispatcher, TransportRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("email_worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        port = config.port,
        template_bucket = ?config.template_bucket,
        send_timeout_ms = config.send_timeout_ms,
        mailgun_configured = config.mailgun_api_key.is_some(),
        smtp_host = ?config.smtp_host,
        "config_loaded"
    );

    let client = Client::builder()
        .timeout(config.send_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let store = store::open(config.template_bucket.as_deref(), &client)?;
    let registry = TransportRegistry::from_config(&config, &client)?;
    info!(domains = registry.len(), "transport_registry_built");

    let dispatcher = Dispatcher::new(store, Arc::new(registry))
        .with_send_timeout(config.send_timeout());
    let app = router(AppState::new(dispatcher));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "email_worker_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("email_worker_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("email_worker_shutting_down");
}
