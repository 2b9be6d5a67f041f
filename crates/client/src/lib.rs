//! PersonaIQ client core
//!
//! Everything the web client does, without a UI runtime:
//! - [`api::ApiClient`]: typed calls to the gateway
//! - [`chat_view::ChatView`] and [`ingest_view::IngestView`]: explicit state machines
//! - [`reveal::RevealTask`]: the cancelable typewriter reveal
//! - [`controller`]: drives the views against the API

pub mod api;
pub mod chat_view;
pub mod controller;
pub mod ingest_view;
pub mod reveal;
pub mod toast;

pub use api::{ApiClient, ClientError, PersonaApi};
pub use chat_view::{ChatEvent, ChatView, Effect};
pub use controller::{ChatController, IngestController};
pub use ingest_view::{IngestEffect, IngestEvent, IngestView};
pub use reveal::{RevealPace, RevealTask};
pub use toast::{Toast, ToastKind};
