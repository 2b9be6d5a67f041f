//! Request and response bodies of the HTTP API.
//!
//! Shared by the gateway handlers and the typed client.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ChatTurn, Persona};

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

/// `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChatRequest {
    /// Convenience single message, appended as the final user turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Prior conversation, oldest first
    #[serde(default)]
    pub messages: Vec<ChatTurn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    #[serde(default = "default_true")]
    pub use_context: bool,

    #[validate(range(min = 0.0, max = 2.0))]
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[validate(range(min = 1, max = 16384))]
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            message: None,
            messages: Vec::new(),
            persona_id: None,
            use_context: default_true(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ChatRequest {
    /// Request carrying a full history for one persona
    pub fn with_history(messages: Vec<ChatTurn>, persona_id: impl Into<String>) -> Self {
        Self {
            messages,
            persona_id: Some(persona_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,

    /// Leading retrieved chunks, omitted when nothing was retrieved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<Vec<String>>,
}

/// `POST /api/ingest`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    /// Attached to every stored chunk; must be a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub chunks_processed: usize,
    pub persona_id: String,
    pub message: String,
}

/// `POST /api/personas`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreatePersonaRequest {
    #[serde(default, alias = "name", alias = "id")]
    pub persona_id: String,

    #[validate(length(max = 128))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[validate(length(max = 8000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// A persona record with its stored chunk count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSummary {
    #[serde(flatten)]
    pub persona: Persona,
    pub chunks: u64,
}

/// `GET /api/personas`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaList {
    pub personas: Vec<PersonaSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(request.use_context);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 1000);
        assert!(request.messages.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_chat_request_ranges() {
        let hot = ChatRequest {
            temperature: 2.5,
            ..ChatRequest::default()
        };
        assert!(hot.validate().is_err());

        let empty = ChatRequest {
            max_tokens: 0,
            ..ChatRequest::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_create_persona_aliases() {
        for body in [r#"{"persona_id":"doug"}"#, r#"{"name":"doug"}"#, r#"{"id":"doug"}"#] {
            let request: CreatePersonaRequest = serde_json::from_str(body).unwrap();
            assert_eq!(request.persona_id, "doug");
        }
    }

    #[test]
    fn test_chat_response_omits_empty_context() {
        let response = ChatResponse {
            message: "hey".to_string(),
            context_used: None,
        };
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"message":"hey"}"#);
    }
}
