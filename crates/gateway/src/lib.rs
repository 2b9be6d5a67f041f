//! PersonaIQ API Gateway
//!
//! HTTP surface of PersonaIQ. Handles:
//! - Chat, ingestion and persona registry endpoints under `/api`
//! - Health, readiness and Prometheus metrics
//! - CORS for the web client, request ids, body and time limits
//! - Serving the built web client with an SPA fallback

pub mod extract;
pub mod handlers;

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{request::Parts, HeaderValue},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use personaiq_common::{config::AppConfig, services::Services, store::Stores};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Services,
    pub stores: Stores,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, services: Services, stores: Stores) -> Self {
        Self {
            config,
            services,
            stores,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// `http://localhost:<port>` or `http://127.0.0.1:<port>`, any port
fn is_local_dev_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    let rest = origin
        .strip_prefix("http://localhost")
        .or_else(|| origin.strip_prefix("http://127.0.0.1"));

    match rest {
        Some("") => true,
        Some(port) => port
            .strip_prefix(':')
            .is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

/// CORS policy for the web client
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    let allow_local = config.cors.allow_localhost_any_port;

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origins.contains(origin) || (allow_local && is_local_dev_origin(origin))
        }))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/ingest", post(handlers::ingest::ingest))
        .route(
            "/personas",
            get(handlers::personas::list_personas).post(handlers::personas::create_persona),
        )
        .route(
            "/personas/{id}",
            get(handlers::personas::get_persona).delete(handlers::personas::delete_persona),
        )
        .fallback(handlers::not_found);

    let router = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api", api_routes);

    // Built web client, when present
    let router = match config.server.static_dir.as_deref().filter(|d| Path::new(d).is_dir()) {
        Some(dir) => {
            info!(dir, "Serving static web client");
            let index = Path::new(dir).join("index.html");
            router.fallback_service(ServeDir::new(dir).not_found_service(ServeFile::new(index)))
        }
        None => router.fallback(handlers::not_found),
    };

    router
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

#[cfg(test)]
mod tests;
