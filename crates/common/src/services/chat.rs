//! Chat: retrieve persona context, assemble the prompt, complete

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};
use validator::Validate;

use crate::api::{ChatRequest, ChatResponse};
use crate::completion::{Completer, CompletionOptions};
use crate::config::{AppConfig, RetrievalConfig};
use crate::context::PromptBuilder;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{latest_user_message, ChatTurn};
use crate::store::VectorStore;

use super::{bounded_provider, bounded_store, PersonaService};

#[derive(Clone)]
pub struct ChatService {
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    personas: PersonaService,
    retrieval: RetrievalConfig,
    embed_timeout: Duration,
    completion_timeout: Duration,
    store_timeout: Duration,
}

impl ChatService {
    pub fn new(
        config: &AppConfig,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        personas: PersonaService,
    ) -> Self {
        Self {
            vectors,
            embedder,
            completer,
            personas,
            retrieval: config.retrieval.clone(),
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            completion_timeout: Duration::from_secs(config.completion.timeout_secs),
            store_timeout: config.store_timeout(),
        }
    }

    /// Answer the latest user turn in character, grounded in the persona's chunks.
    #[instrument(skip(self, request), fields(persona_id = tracing::field::Empty, turns = request.messages.len()))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let persona_id = request
            .persona_id
            .clone()
            .unwrap_or_else(|| self.personas.default_id().to_string());
        tracing::Span::current().record("persona_id", persona_id.as_str());

        let mut resolved = None;
        let result = self.run(request, &mut resolved).await;

        let retrieved = result
            .as_ref()
            .map(|(_, n)| *n)
            .unwrap_or(0);
        metrics::record_chat(start.elapsed().as_secs_f64(), resolved.as_deref(), retrieved, result.is_ok());
        result.map(|(response, _)| response)
    }

    /// `resolved` is set once the persona is known to exist.
    async fn run(&self, request: ChatRequest, resolved: &mut Option<String>) -> Result<(ChatResponse, usize)> {
        request.validate()?;

        let mut turns = request.messages;
        if let Some(message) = request.message.filter(|m| !m.trim().is_empty()) {
            turns.push(ChatTurn::user(message));
        }
        let query = latest_user_message(&turns)
            .ok_or_else(|| AppError::validation("messages", "at least one non-empty user message is required"))?
            .to_string();

        let persona = self.personas.resolve(request.persona_id.as_deref()).await?;
        *resolved = Some(persona.id.clone());

        let context = if request.use_context {
            self.retrieve(&query, &persona.id).await?
        } else {
            Vec::new()
        };

        let messages = PromptBuilder::new(persona.profile.clone()).build(&turns, &context);

        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let started = Instant::now();
        let reply = bounded_provider(
            "completion",
            self.completion_timeout,
            self.completer.complete(&messages, options),
        )
        .await;
        metrics::record_completion(started.elapsed().as_secs_f64(), self.completer.model_name(), reply.is_ok());
        let reply = reply?;

        info!(
            persona_id = %persona.id,
            context_chunks = context.len(),
            reply_len = reply.len(),
            "Chat completed"
        );

        let retrieved = context.len();
        let context_used = (!context.is_empty())
            .then(|| context.into_iter().take(self.retrieval.context_preview).collect());

        Ok((
            ChatResponse {
                message: reply,
                context_used,
            },
            retrieved,
        ))
    }

    /// Nearest chunks for `query` within one persona, best first.
    async fn retrieve(&self, query: &str, persona_id: &str) -> Result<Vec<String>> {
        let started = Instant::now();
        let embedding = bounded_provider("embedding", self.embed_timeout, self.embedder.embed(query)).await;
        metrics::record_embedding(started.elapsed().as_secs_f64(), self.embedder.model_name(), embedding.is_ok());
        let embedding = embedding?;

        let hits = bounded_store(
            self.store_timeout,
            self.vectors.search(&embedding, persona_id, self.retrieval.top_k),
        )
        .await?;

        let min_score = self.retrieval.min_score;
        let texts: Vec<String> = hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .map(|hit| hit.text)
            .collect();

        debug!(persona_id, retrieved = texts.len(), "Context retrieved");
        Ok(texts)
    }
}
