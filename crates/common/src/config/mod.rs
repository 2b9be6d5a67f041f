//! Configuration management for PersonaIQ services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Well-known deployment variables (OPENAI_API_KEY, DATABASE_URL, FRONTEND_URL, ...)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cross-origin policy for the web client
    #[serde(default)]
    pub cors: CorsConfig,

    /// Vector store and persona registry backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat-completion provider configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Context retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ingestion and chunking configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Default persona configuration
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Built frontend to serve for non-API paths
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Explicitly allowed origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Production frontend origin (FRONTEND_URL)
    #[serde(default)]
    pub frontend_url: Option<String>,

    /// Allow http://localhost:<any port> and http://127.0.0.1:<any port>
    #[serde(default = "default_true")]
    pub allow_localhost_any_port: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Backend: postgres, memory
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Postgres connection settings (used when backend = postgres)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Upper bound for a single store read or write, in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Create an HNSW index over the embedding column
    #[serde(default)]
    pub ann_index: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Completion provider: openai, echo
    #[serde(default = "default_completion_provider")]
    pub provider: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Chat model
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Number of nearest chunks fetched per chat turn
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a chunk to be used
    #[serde(default)]
    pub min_score: f64,

    /// Number of retrieved chunks echoed back as `context_used`
    #[serde(default = "default_context_preview")]
    pub context_preview: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Largest accepted ingestion text in characters
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaConfig {
    /// Id of the implicit default persona
    #[serde(default = "default_persona_id")]
    pub default_id: String,

    /// Display name of the default persona
    #[serde(default)]
    pub default_display_name: Option<String>,

    /// Persona description injected into the system prompt for the default persona
    #[serde(default)]
    pub default_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 120 }
fn default_max_body_bytes() -> usize { 4 * 1024 * 1024 }
fn default_static_dir() -> Option<String> { Some("frontend/dist".to_string()) }
fn default_allowed_origins() -> Vec<String> {
    ["3000", "5173", "3011"]
        .iter()
        .flat_map(|port| {
            [
                format!("http://localhost:{}", port),
                format!("http://127.0.0.1:{}", port),
            ]
        })
        .collect()
}
fn default_store_backend() -> String { "postgres".to_string() }
fn default_store_timeout() -> u64 { 15 }
fn default_database_url() -> String { "postgres://localhost/personaiq".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_provider_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 64 }
fn default_completion_provider() -> String { "openai".to_string() }
fn default_completion_model() -> String { "gpt-4o".to_string() }
fn default_top_k() -> usize { 5 }
fn default_context_preview() -> usize { 3 }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_max_text_chars() -> usize { 1_000_000 }
fn default_persona_id() -> String { "default".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_service_name() -> String { "personaiq".to_string() }

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let openai_key = std::env::var("OPENAI_API_KEY").ok();

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true)
            )

            // Deployment variables used by the hosted frontend/backend pair
            .set_override_option("embedding.api_key", openai_key.clone())?
            .set_override_option("completion.api_key", openai_key)?
            .set_override_option("completion.model", std::env::var("OPENAI_MODEL").ok())?
            .set_override_option("store.database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("cors.frontend_url", std::env::var("FRONTEND_URL").ok())?
            .set_override_option(
                "server.port",
                std::env::var("PORT").ok().and_then(|p| p.parse::<i64>().ok()),
            )?

            .build()?;

        config.try_deserialize()
    }

    /// Fully offline configuration: in-memory store and deterministic providers
    pub fn offline() -> Self {
        let mut config = Self::default();
        config.store.backend = "memory".to_string();
        config.embedding.provider = "hash".to_string();
        config.completion.provider = "echo".to_string();
        config.server.static_dir = None;
        config
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the store operation bound as Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    /// All origins the CORS layer accepts verbatim
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = self.cors.allowed_origins.clone();
        if let Some(url) = self.cors.frontend_url.as_deref() {
            let url = url.trim_end_matches('/');
            if !url.is_empty() && !origins.iter().any(|o| o == url) {
                origins.push(url.to_string());
            }
        }
        origins
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            frontend_url: None,
            allow_localhost_any_port: default_true(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database: DatabaseConfig::default(),
            timeout_secs: default_store_timeout(),
            ann_index: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_provider_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            api_key: None,
            api_base: None,
            model: default_completion_model(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: 0.0,
            context_preview: default_context_preview(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            default_id: default_persona_id(),
            default_display_name: None,
            default_profile: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}
