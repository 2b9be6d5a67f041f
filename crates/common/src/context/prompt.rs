//! System-prompt assembly for persona chat
//!
//! The persona block is made of the persona profile, the retrieved context
//! between fixed delimiters, and in-character instructions, joined by blank
//! lines. It is merged into the history's leading system turn or inserted as
//! one.

use crate::models::{ChatTurn, Role};

pub const CONTEXT_START: &str = "---CONTEXT START---";
pub const CONTEXT_END: &str = "---CONTEXT END---";
pub const CHUNK_SEPARATOR: &str = "\n---\n";

const INSTRUCTIONS: [&str; 4] = [
    "Use this context to respond in character, matching the tone, style, and knowledge of the persona.",
    "Do not explicitly mention that you're using context or reference the context directly.",
    "Respond naturally as if you are the persona.",
    "Do not open the conversation by asking the user questions; only respond.",
];

/// Builds the provider message list for one chat turn
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    profile: Option<String>,
}

impl PromptBuilder {
    pub fn new(profile: Option<String>) -> Self {
        Self {
            profile: profile.filter(|p| !p.trim().is_empty()),
        }
    }

    /// The persona system block, or `None` when there is neither a profile nor context.
    pub fn system_block(&self, context: &[String]) -> Option<String> {
        if self.profile.is_none() && context.is_empty() {
            return None;
        }

        let mut parts: Vec<String> = Vec::new();
        if let Some(profile) = &self.profile {
            parts.push("You are responding based on the following persona:".to_string());
            parts.push(profile.trim().to_string());
        }
        if !context.is_empty() {
            parts.push(CONTEXT_START.to_string());
            parts.push(context.join(CHUNK_SEPARATOR));
            parts.push(CONTEXT_END.to_string());
        }
        parts.extend(INSTRUCTIONS.iter().map(|s| s.to_string()));

        Some(parts.join("\n\n"))
    }

    /// Merge the persona block into `history`. All other turns pass through unchanged.
    pub fn build(&self, history: &[ChatTurn], context: &[String]) -> Vec<ChatTurn> {
        let mut messages = history.to_vec();

        if let Some(block) = self.system_block(context) {
            match messages.first_mut() {
                Some(first) if first.role == Role::System => {
                    first.content = format!("{}\n\n{}", first.content, block);
                }
                _ => messages.insert(0, ChatTurn::system(block)),
            }
        }

        messages
    }
}

/// Text between the context delimiters of a system turn, if any.
pub fn extract_context(system: &str) -> Option<&str> {
    let start = system.find(CONTEXT_START)? + CONTEXT_START.len();
    let end = start + system[start..].find(CONTEXT_END)?;
    let body = system[start..end].trim();
    (!body.is_empty()).then_some(body)
}
