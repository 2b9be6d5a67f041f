//! In-memory store for tests and offline runs.
//!
//! Uses `BTreeMap` and `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over the persona's chunks. Locks are never
//! held across an `.await`.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embeddings::cosine_similarity;
use crate::errors::{AppError, Result};
use crate::models::{EmbeddingChunk, Persona, ScoredChunk};

use super::{PersonaRegistry, VectorStore};

/// In-memory vector store and persona registry.
#[derive(Default)]
pub struct InMemoryStore {
    personas: RwLock<BTreeMap<String, Persona>>,
    chunks: RwLock<Vec<EmbeddingChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| AppError::storage("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| AppError::storage("in-memory store lock poisoned"))
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert_chunks(&self, chunks: &[EmbeddingChunk]) -> Result<()> {
        let mut stored = write(&self.chunks)?;
        if let Some(dup) = chunks.iter().find(|c| stored.iter().any(|s| s.id == c.id)) {
            return Err(AppError::storage(format!("chunk id {} already stored", dup.id)));
        }
        stored.extend_from_slice(chunks);
        Ok(())
    }

    async fn search(&self, embedding: &[f32], persona_id: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        let stored = read(&self.chunks)?;
        let mut scored: Vec<ScoredChunk> = stored
            .iter()
            .filter(|c| c.persona_id == persona_id)
            .map(|c| ScoredChunk {
                id: c.id.clone(),
                persona_id: c.persona_id.clone(),
                chunk_index: c.chunk_index,
                text: c.text.clone(),
                score: cosine_similarity(embedding, &c.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count_by_persona(&self, persona_id: &str) -> Result<u64> {
        let stored = read(&self.chunks)?;
        Ok(stored.iter().filter(|c| c.persona_id == persona_id).count() as u64)
    }

    async fn delete_persona_chunks(&self, persona_id: &str) -> Result<u64> {
        let mut stored = write(&self.chunks)?;
        let before = stored.len();
        stored.retain(|c| c.persona_id != persona_id);
        Ok((before - stored.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        read(&self.chunks).map(|_| ())
    }
}

#[async_trait]
impl PersonaRegistry for InMemoryStore {
    async fn create(&self, persona: &Persona) -> Result<Persona> {
        let mut personas = write(&self.personas)?;
        if personas.contains_key(&persona.id) {
            return Err(AppError::DuplicatePersona { id: persona.id.clone() });
        }
        personas.insert(persona.id.clone(), persona.clone());
        Ok(persona.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Persona>> {
        Ok(read(&self.personas)?.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Persona>> {
        Ok(read(&self.personas)?.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(write(&self.personas)?.remove(id).is_some())
    }
}
