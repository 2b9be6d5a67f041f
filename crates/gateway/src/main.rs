//! PersonaIQ API Gateway
//!
//! Entry point: loads configuration, wires providers and stores, seeds the
//! default persona and serves the router until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use personaiq_common::{
    completion::create_completer,
    config::{AppConfig, ObservabilityConfig},
    embeddings::create_embedder,
    metrics,
    services::Services,
    store::Stores,
};
use personaiq_gateway::{create_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting PersonaIQ API Gateway v{}",
        personaiq_common::VERSION
    );

    // Initialize metrics
    let metrics_handle = install_metrics()?;
    metrics::register_metrics();

    // Providers
    let embedder = create_embedder(&config.embedding)?;
    let completer = create_completer(&config.completion)?;
    info!(
        embedding_model = embedder.model_name(),
        completion_model = completer.model_name(),
        "Providers configured"
    );

    // Vector store and persona registry
    let stores = Stores::from_config(&config.store, embedder.dimension()).await?;
    info!(backend = %config.store.backend, "Store ready");

    let services = Services::new(&config, stores.clone(), embedder, completer);
    services.personas.ensure_default().await?;

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), services, stores).with_metrics(metrics_handle);

    // Build the router
    let app = create_router(state);

    // Start the server
    let ip = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the global Prometheus recorder
fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let mut builder = PrometheusBuilder::new();
    for suffix in [
        "chat_duration_seconds",
        "ingest_duration_seconds",
        "embedding_duration_seconds",
        "completion_duration_seconds",
    ] {
        builder = builder.set_buckets_for_metric(Matcher::Full(metrics::name(suffix)), metrics::PROVIDER_BUCKETS)?;
    }
    builder = builder.set_buckets_for_metric(
        Matcher::Full(metrics::name("retrieved_chunks")),
        metrics::RETRIEVAL_BUCKETS,
    )?;

    builder
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
