//! Domain services behind the HTTP endpoints
//!
//! Each outbound call (embedding, completion, store) is bounded by its
//! configured timeout and attempted once.

mod chat;
mod ingest;
mod personas;

pub use chat::ChatService;
pub use ingest::IngestService;
pub use personas::PersonaService;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::completion::Completer;
use crate::config::AppConfig;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::store::Stores;

/// Run a store operation, failing with `StorageTimeout` past `limit`.
pub(crate) async fn bounded_store<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StorageTimeout {
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Run a provider call, failing with `ProviderTimeout` past `limit`.
pub(crate) async fn bounded_provider<T>(
    provider: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::ProviderTimeout {
            provider: provider.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// The three services wired to one set of providers and stores
#[derive(Clone)]
pub struct Services {
    pub personas: PersonaService,
    pub ingest: IngestService,
    pub chat: ChatService,
}

impl Services {
    pub fn new(
        config: &AppConfig,
        stores: Stores,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        let personas = PersonaService::new(config, stores.clone());
        let ingest = IngestService::new(config, stores.vectors.clone(), embedder.clone(), personas.clone());
        let chat = ChatService::new(config, stores.vectors, embedder, completer, personas.clone());

        Self { personas, ingest, chat }
    }
}
