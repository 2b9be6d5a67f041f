//! Persona prompt construction
//!
//! Turns a persona profile and retrieved chunks into the message list sent to
//! the completion provider.

mod prompt;

pub use prompt::{extract_context, PromptBuilder, CHUNK_SEPARATOR, CONTEXT_END, CONTEXT_START};
