//! Text chunking module
//!
//! Splits ingested text into overlapping character windows for embedding.
//! Windows prefer semantic boundaries (paragraphs, then sentences, then words).

use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

use crate::config::IngestConfig;
use crate::errors::{AppError, Result};

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<&IngestConfig> for ChunkingConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// A text chunk with its position in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The chunk content
    pub content: String,
    /// 0-based index of this chunk in the source text
    pub index: i32,
}

/// Split text into chunks for embedding.
///
/// Any text with non-whitespace content yields at least one chunk, and chunk
/// indices always run `0..n` without gaps.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let overlap = config.chunk_overlap.min(config.chunk_size.saturating_sub(1));
    let chunk_config = ChunkConfig::new(config.chunk_size.max(1))
        .with_overlap(overlap)
        .map_err(|e| AppError::Configuration {
            message: format!("invalid chunking configuration: {}", e),
        })?;
    let splitter = TextSplitter::new(chunk_config);

    let mut pieces: Vec<String> = splitter
        .chunks(trimmed)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    if pieces.is_empty() {
        pieces.push(trimmed.to_string());
    }

    debug!(
        input_len = text.len(),
        chunk_count = pieces.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = overlap,
        "Text chunked"
    );

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| TextChunk {
            content,
            index: index as i32,
        })
        .collect())
}
