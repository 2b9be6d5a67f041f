//! Storage abstraction for persona knowledge.
//!
//! [`VectorStore`] holds embedded chunks and answers nearest-neighbour
//! queries scoped to a persona. [`PersonaRegistry`] holds the persona records.
//! Both have a Postgres + pgvector backend and an in-memory backend.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{EmbeddingChunk, Persona, ScoredChunk};

/// Chunk storage with cosine nearest-neighbour search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Write all chunks of one ingestion. Either every chunk is stored or none.
    async fn insert_chunks(&self, chunks: &[EmbeddingChunk]) -> Result<()>;

    /// Up to `limit` chunks of `persona_id`, most similar first.
    async fn search(&self, embedding: &[f32], persona_id: &str, limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks for a persona.
    async fn count_by_persona(&self, persona_id: &str) -> Result<u64>;

    /// Remove every chunk of a persona, returning how many were removed.
    async fn delete_persona_chunks(&self, persona_id: &str) -> Result<u64>;

    /// Connectivity check for readiness.
    async fn ping(&self) -> Result<()>;
}

/// Persona records keyed by slug.
#[async_trait]
pub trait PersonaRegistry: Send + Sync {
    /// Insert a new persona. Fails with `DuplicatePersona` when the id exists.
    async fn create(&self, persona: &Persona) -> Result<Persona>;

    async fn get(&self, id: &str) -> Result<Option<Persona>>;

    /// All personas sorted by id.
    async fn list(&self) -> Result<Vec<Persona>>;

    /// Remove a persona record. Returns false when it did not exist.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Handles to the configured backend, both traits served by one store.
#[derive(Clone)]
pub struct Stores {
    pub vectors: Arc<dyn VectorStore>,
    pub personas: Arc<dyn PersonaRegistry>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            vectors: store.clone(),
            personas: store,
        }
    }

    /// Build the backend named by `store.backend`.
    pub async fn from_config(config: &StoreConfig, dimension: usize) -> Result<Self> {
        match config.backend.as_str() {
            "memory" => Ok(Self::in_memory()),
            "postgres" => {
                let store = Arc::new(PgStore::connect(config, dimension).await?);
                Ok(Self {
                    vectors: store.clone(),
                    personas: store,
                })
            }
            other => Err(AppError::Configuration {
                message: format!("unknown store backend '{}'", other),
            }),
        }
    }
}
