//! Recipes metering service - HTTP API with per-customer usage metering.
//!
//! This is the main entry point for the recipes-metering service.

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipes_metering_service::metering::{backend_from_config, MeteringPipeline};
use recipes_metering_service::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recipes_metering=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Recipes metering service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        auth_configured = %config.auth_jwt_secret.is_some(),
        stripe_configured = %config.stripe_api_key.is_some(),
        batch_size = config.metering.batch_size,
        meter_event = %config.metering.event_name,
        "Service configuration loaded"
    );

    // Start the metering pipeline before accepting traffic
    let backend = backend_from_config(&config);
    let pipeline = MeteringPipeline::start(&config.metering, backend);

    let state = AppState::new(config.clone(), pipeline.producer());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight requests are done; drain whatever usage is still queued
    tracing::info!("HTTP server stopped, draining metering pipeline");
    if let Some(summary) = pipeline.shutdown().await {
        tracing::info!(
            events_received = summary.events_received,
            flushes = summary.flushes,
            usage_delivered = summary.usage_delivered,
            dropped_records = summary.dropped.len(),
            "Metering pipeline stopped"
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
