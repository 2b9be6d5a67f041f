//! Ingestion: chunk, embed, store

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::api::{IngestRequest, IngestResponse};
use crate::chunker::{chunk_text, ChunkingConfig};
use crate::config::AppConfig;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::EmbeddingChunk;
use crate::store::VectorStore;

use super::{bounded_provider, bounded_store, PersonaService};

#[derive(Clone)]
pub struct IngestService {
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    personas: PersonaService,
    chunking: ChunkingConfig,
    batch_size: usize,
    max_text_chars: usize,
    embed_timeout: Duration,
    store_timeout: Duration,
}

impl IngestService {
    pub fn new(
        config: &AppConfig,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        personas: PersonaService,
    ) -> Self {
        Self {
            vectors,
            embedder,
            personas,
            chunking: ChunkingConfig::from(&config.ingest),
            batch_size: config.embedding.batch_size.max(1),
            max_text_chars: config.ingest.max_text_chars,
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            store_timeout: config.store_timeout(),
        }
    }

    /// Chunk, embed and store `request.text` for its persona.
    #[instrument(skip(self, request), fields(persona_id = tracing::field::Empty, text_len = request.text.len()))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        let start = Instant::now();
        let persona_id = request
            .persona_id
            .clone()
            .unwrap_or_else(|| self.personas.default_id().to_string());
        tracing::Span::current().record("persona_id", persona_id.as_str());

        let mut resolved = None;
        let result = self.run(request, &mut resolved).await;

        let chunks = result.as_ref().map(|r| r.chunks_processed).unwrap_or(0);
        metrics::record_ingestion(start.elapsed().as_secs_f64(), resolved.as_deref(), chunks, result.is_ok());
        result
    }

    /// `resolved` is set once the persona is known to exist.
    async fn run(&self, request: IngestRequest, resolved: &mut Option<String>) -> Result<IngestResponse> {
        if request.text.trim().is_empty() {
            return Err(AppError::validation("text", "text must not be empty"));
        }
        let chars = request.text.chars().count();
        if chars > self.max_text_chars {
            return Err(AppError::validation(
                "text",
                format!("text is {} characters, the limit is {}", chars, self.max_text_chars),
            ));
        }
        if let Some(metadata) = &request.metadata {
            if !metadata.is_object() && !metadata.is_null() {
                return Err(AppError::validation("metadata", "metadata must be a JSON object"));
            }
        }
        let metadata = request.metadata.filter(|m| !m.is_null());

        let persona = self.personas.resolve(request.persona_id.as_deref()).await?;
        *resolved = Some(persona.id.clone());

        let chunks = chunk_text(&request.text, &self.chunking)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        let embeddings = self.embed_all(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(AppError::provider(
                "embedding",
                format!("expected {} embeddings, received {}", texts.len(), embeddings.len()),
            ));
        }

        let now = Utc::now();
        let rows: Vec<EmbeddingChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddingChunk {
                id: Uuid::new_v4().to_string(),
                text: chunk.content,
                embedding,
                metadata: metadata.clone(),
                created_at: now,
                persona_id: persona.id.clone(),
                chunk_index: chunk.index,
            })
            .collect();

        bounded_store(self.store_timeout, self.vectors.insert_chunks(&rows)).await?;

        // A delete that raced this ingestion must not leave its rows behind
        if let Err(e) = self.personas.resolve(Some(&persona.id)).await {
            warn!(persona_id = %persona.id, error = %e, "Persona gone after write, removing its chunks");
            bounded_store(self.store_timeout, self.vectors.delete_persona_chunks(&persona.id)).await?;
            return Err(e);
        }

        let n = rows.len();
        info!(persona_id = %persona.id, chunks = n, "Text ingested");

        Ok(IngestResponse {
            success: true,
            chunks_processed: n,
            message: format!("Successfully processed {} chunks for persona '{}'", n, persona.id),
            persona_id: persona.id,
        })
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let result = bounded_provider("embedding", self.embed_timeout, self.embedder.embed_batch(batch)).await;
            metrics::record_embedding(start.elapsed().as_secs_f64(), self.embedder.model_name(), result.is_ok());

            let batch_embeddings = result?;
            debug!(batch = batch.len(), "Embedded chunk batch");
            embeddings.extend(batch_embeddings);
        }

        Ok(embeddings)
    }
}
