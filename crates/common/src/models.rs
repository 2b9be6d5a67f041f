//! Domain types shared by the gateway, the services and the client.

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::errors::{AppError, Result};

/// A named scope partitioning ingested knowledge and retrieval results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-text persona description injected into the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Persona {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            profile: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_profile(mut self, display_name: Option<String>, profile: Option<String>) -> Self {
        self.display_name = display_name;
        self.profile = profile;
        self
    }
}

/// One stored span of source text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingChunk {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub persona_id: String,
    pub chunk_index: i32,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub persona_id: String,
    pub chunk_index: i32,
    pub text: String,
    /// Cosine similarity, `1 - cosine distance`
    pub score: f64,
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One `{role, content}` turn as exchanged with the client and the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Content of the most recent non-blank user turn.
pub fn latest_user_message(turns: &[ChatTurn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .find(|t| t.role == Role::User && !t.content.trim().is_empty())
        .map(|t| t.content.as_str())
}

fn persona_slug() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").expect("static regex")
    })
}

/// Check that a persona id is a lowercase slug.
pub fn validate_persona_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AppError::MissingField { field: "persona_id".to_string() });
    }
    if !persona_slug().is_match(id) {
        return Err(AppError::validation(
            "persona_id",
            format!(
                "'{}' is not a valid persona id (lowercase letters, digits, '-' or '_', max 64 chars)",
                id
            ),
        ));
    }
    Ok(())
}
