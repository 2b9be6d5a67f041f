//! Drives the view reducers against a [`PersonaApi`].
//!
//! A controller owns one view, runs the effects it emits and feeds the
//! outcomes back in as events. Toasts are queued until the UI drains them.

use std::collections::VecDeque;

use tracing::warn;

use crate::api::{ClientError, PersonaApi};
use crate::chat_view::{ChatEvent, ChatView, Effect};
use crate::ingest_view::{IngestEffect, IngestEvent, IngestView};
use crate::reveal::{RevealPace, RevealTask};
use crate::toast::Toast;

pub struct ChatController<A> {
    view: ChatView,
    api: A,
    pace: RevealPace,
    reveal: Option<RevealTask>,
    toasts: Vec<Toast>,
}

impl<A: PersonaApi> ChatController<A> {
    pub fn new(api: A, view: ChatView) -> Self {
        Self {
            view,
            api,
            pace: RevealPace::default(),
            reveal: None,
            toasts: Vec::new(),
        }
    }

    pub fn with_pace(mut self, pace: RevealPace) -> Self {
        self.pace = pace;
        self
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.is_some()
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    /// Fetch the persona card for the view's persona
    pub async fn load_persona(&mut self) -> Result<(), ClientError> {
        let summary = self.api.get_persona(self.view.persona_id()).await?;
        self.view.apply(ChatEvent::PersonaLoaded(summary));
        Ok(())
    }

    /// Apply `event` and run every effect it causes, including the API call.
    pub async fn dispatch(&mut self, event: ChatEvent) {
        let mut queue: VecDeque<Effect> = self.view.apply(event).into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::SendChat(request) => {
                    let next = match self.api.chat(&request).await {
                        Ok(response) => ChatEvent::ResponseReceived(response.message),
                        Err(e) => {
                            warn!(error = %e, "Chat request failed");
                            ChatEvent::ResponseFailed(e.to_string())
                        }
                    };
                    queue.extend(self.view.apply(next));
                }
                Effect::StartReveal { text, .. } => {
                    // Replacing drops and aborts any previous reveal
                    self.reveal = Some(RevealTask::spawn(&text, self.pace));
                }
                Effect::CancelReveal => {
                    self.reveal = None;
                }
                Effect::Toast(toast) => self.toasts.push(toast),
            }
        }
    }

    /// Feed reveal ticks into the view until the running reveal ends.
    pub async fn finish_reveal(&mut self) {
        let Some(task) = self.reveal.as_ref() else {
            return;
        };
        let mut shown = task.subscribe();

        while shown.changed().await.is_ok() {
            let count = *shown.borrow_and_update();
            self.view.apply(ChatEvent::RevealTick(count));
        }

        self.reveal = None;
        self.view.apply(ChatEvent::RevealFinished);
    }

    /// Show the full reply at once and stop the reveal task
    pub async fn skip_reveal(&mut self) {
        self.dispatch(ChatEvent::SkipReveal).await;
    }
}

pub struct IngestController<A> {
    view: IngestView,
    api: A,
    toasts: Vec<Toast>,
}

impl<A: PersonaApi> IngestController<A> {
    pub fn new(api: A, view: IngestView) -> Self {
        Self {
            view,
            api,
            toasts: Vec::new(),
        }
    }

    pub fn view(&self) -> &IngestView {
        &self.view
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub async fn dispatch(&mut self, event: IngestEvent) {
        let mut queue: VecDeque<IngestEffect> = self.view.apply(event).into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                IngestEffect::SendIngest(request) => {
                    let next = match self.api.ingest(&request).await {
                        Ok(response) => IngestEvent::Completed(response),
                        Err(e) => {
                            warn!(error = %e, "Ingest request failed");
                            IngestEvent::Failed(e.to_string())
                        }
                    };
                    queue.extend(self.view.apply(next));
                }
                IngestEffect::Toast(toast) => self.toasts.push(toast),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use personaiq_common::api::{ChatRequest, ChatResponse, IngestRequest, IngestResponse, PersonaSummary};
    use personaiq_common::models::{Persona, Role};

    use super::*;
    use crate::chat_view::ChatState;
    use crate::toast::ToastKind;

    #[derive(Default)]
    struct FakeApi {
        fail_with: Option<String>,
        chats: Mutex<Vec<ChatRequest>>,
    }

    impl FakeApi {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        fn check(&self) -> Result<(), ClientError> {
            match &self.fail_with {
                Some(message) => Err(ClientError::Api {
                    status: 502,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl PersonaApi for FakeApi {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
            self.check()?;
            self.chats.lock().unwrap().push(request.clone());
            Ok(ChatResponse {
                message: "Doug's favorite color is blue.".to_string(),
                context_used: None,
            })
        }

        async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, ClientError> {
            self.check()?;
            let persona_id = request.persona_id.clone().unwrap_or_default();
            Ok(IngestResponse {
                success: true,
                chunks_processed: 1,
                message: format!("Successfully processed 1 chunks for persona '{}'", persona_id),
                persona_id,
            })
        }

        async fn get_persona(&self, id: &str) -> Result<PersonaSummary, ClientError> {
            self.check()?;
            Ok(PersonaSummary {
                persona: Persona {
                    id: id.to_string(),
                    display_name: Some("Doug".to_string()),
                    profile: None,
                    created_at: Utc::now(),
                },
                chunks: 3,
            })
        }
    }

    fn fast() -> RevealPace {
        RevealPace {
            chars_per_tick: 4,
            tick: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_chat_round_trip_with_reveal() {
        let mut controller = ChatController::new(FakeApi::default(), ChatView::new("doug")).with_pace(fast());

        controller
            .dispatch(ChatEvent::InputChanged("What color does Doug like?".to_string()))
            .await;
        controller.dispatch(ChatEvent::Submit).await;

        assert!(controller.is_revealing());
        assert!(matches!(controller.view().state(), ChatState::Revealing { .. }));

        controller.finish_reveal().await;

        assert!(!controller.is_revealing());
        assert!(controller.view().is_idle());
        let messages = controller.view().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Doug's favorite color is blue.");

        let sent = controller.api.chats.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].persona_id.as_deref(), Some("doug"));
    }

    #[tokio::test]
    async fn test_chat_failure_restores_input() {
        let mut controller = ChatController::new(FakeApi::failing("Upstream timeout"), ChatView::new("doug"));

        controller.dispatch(ChatEvent::InputChanged("hello".to_string())).await;
        controller.dispatch(ChatEvent::Submit).await;

        assert!(controller.view().is_idle());
        assert!(controller.view().messages().is_empty());
        assert_eq!(controller.view().input(), "hello");
        assert!(!controller.is_revealing());

        let toasts = controller.take_toasts();
        assert_eq!(toasts, vec![Toast::error("Upstream timeout")]);
        assert!(controller.take_toasts().is_empty());
    }

    #[tokio::test]
    async fn test_skip_reveal_drops_task() {
        let slow = RevealPace {
            chars_per_tick: 1,
            tick: Duration::from_secs(10),
        };
        let mut controller = ChatController::new(FakeApi::default(), ChatView::new("doug")).with_pace(slow);

        controller.dispatch(ChatEvent::InputChanged("hi".to_string())).await;
        controller.dispatch(ChatEvent::Submit).await;
        assert!(controller.is_revealing());

        controller.skip_reveal().await;
        assert!(!controller.is_revealing());
        assert_eq!(controller.view().messages()[1].content, "Doug's favorite color is blue.");

        // Nothing left to drive
        controller.finish_reveal().await;
        assert!(controller.view().is_idle());
    }

    #[tokio::test]
    async fn test_load_persona() {
        let mut controller = ChatController::new(FakeApi::default(), ChatView::new("doug"));
        controller.load_persona().await.unwrap();

        let persona = controller.view().persona().unwrap();
        assert_eq!(persona.persona.id, "doug");
        assert_eq!(persona.chunks, 3);
    }

    #[tokio::test]
    async fn test_ingest_success_and_failure() {
        let mut controller = IngestController::new(FakeApi::default(), IngestView::new("doug"));
        controller
            .dispatch(IngestEvent::InputChanged("Doug loves blue.".to_string()))
            .await;
        controller.dispatch(IngestEvent::Submit).await;

        assert!(!controller.view().is_processing());
        assert_eq!(controller.view().text(), "Doug loves blue.");
        let toasts = controller.take_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Success);

        let mut failing = IngestController::new(FakeApi::failing("Text cannot be empty"), IngestView::new("doug"));
        failing.dispatch(IngestEvent::InputChanged("x".to_string())).await;
        failing.dispatch(IngestEvent::Submit).await;
        assert_eq!(failing.take_toasts(), vec![Toast::error("Text cannot be empty")]);
        assert!(matches!(failing.view().last_result(), Some(Err(_))));
    }
}
