//! PersonaIQ Common Library
//!
//! Shared code for the PersonaIQ gateway and client including:
//! - Configuration management
//! - Error types and handling
//! - Domain model and API bodies
//! - Text chunking
//! - Embedding and chat-completion provider clients
//! - Vector store and persona registry (Postgres + pgvector, in-memory)
//! - Chat, ingestion and persona services
//! - Metrics

pub mod api;
pub mod chunker;
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use completion::Completer;
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use services::Services;
pub use store::{PersonaRegistry, Stores, VectorStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
