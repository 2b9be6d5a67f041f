//! Chat view state machine.
//!
//! `ChatView::apply` is a pure reducer: it updates the view and returns the
//! side effects the caller must run. The thread only ever holds completed
//! turns; a failed send leaves no trace in it.

use chrono::{DateTime, Utc};
use personaiq_common::api::{ChatRequest, PersonaSummary};
use personaiq_common::models::{ChatTurn, Role};

use crate::reveal::prefix;
use crate::toast::Toast;

/// Prompts offered as one-click starters
pub const DEFAULT_QUICK_ACTIONS: [&str; 4] = [
    "Tell me a bit about yourself.",
    "What are you working on these days?",
    "Which launch are you proudest of?",
    "Any advice for someone early in their marketing career?",
];

/// One message in the local thread
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatState {
    Idle,
    /// Waiting for the gateway; `pending` is the id of the user message in flight
    Sending { pending: u64 },
    /// Assistant reply known, being revealed
    Revealing {
        message_id: u64,
        target: String,
        shown: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    InputChanged(String),
    QuickAction(usize),
    Submit,
    ResponseReceived(String),
    RevealTick(usize),
    RevealFinished,
    SkipReveal,
    ResponseFailed(String),
    PersonaLoaded(PersonaSummary),
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SendChat(ChatRequest),
    StartReveal { message_id: u64, text: String },
    CancelReveal,
    Toast(Toast),
}

#[derive(Debug, Clone)]
pub struct ChatView {
    persona_id: String,
    persona: Option<PersonaSummary>,
    messages: Vec<ChatMessage>,
    input: String,
    state: ChatState,
    quick_actions: Vec<String>,
    next_id: u64,
}

impl ChatView {
    pub fn new(persona_id: impl Into<String>) -> Self {
        Self {
            persona_id: persona_id.into(),
            persona: None,
            messages: Vec::new(),
            input: String::new(),
            state: ChatState::Idle,
            quick_actions: DEFAULT_QUICK_ACTIONS.iter().map(|s| s.to_string()).collect(),
            next_id: 1,
        }
    }

    pub fn with_quick_actions(mut self, actions: Vec<String>) -> Self {
        self.quick_actions = actions;
        self
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    pub fn persona(&self) -> Option<&PersonaSummary> {
        self.persona.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn quick_actions(&self) -> &[String] {
        &self.quick_actions
    }

    pub fn is_idle(&self) -> bool {
        self.state == ChatState::Idle
    }

    fn push(&mut self, role: Role, content: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            content,
            timestamp: Utc::now(),
        });
        id
    }

    fn history(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .map(|m| ChatTurn::new(m.role, m.content.clone()))
            .collect()
    }

    fn set_content(&mut self, id: u64, content: String) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.content = content;
        }
    }

    fn finish_reveal(&mut self, skipped: bool) -> Vec<Effect> {
        match std::mem::replace(&mut self.state, ChatState::Idle) {
            ChatState::Revealing { message_id, target, .. } => {
                self.set_content(message_id, target);
                if skipped {
                    vec![Effect::CancelReveal]
                } else {
                    Vec::new()
                }
            }
            other => {
                self.state = other;
                Vec::new()
            }
        }
    }

    /// Apply one event, returning the effects to run
    pub fn apply(&mut self, event: ChatEvent) -> Vec<Effect> {
        match event {
            ChatEvent::InputChanged(text) => {
                if self.is_idle() {
                    self.input = text;
                }
                Vec::new()
            }

            ChatEvent::QuickAction(index) => {
                if self.is_idle() {
                    if let Some(prompt) = self.quick_actions.get(index) {
                        self.input = prompt.clone();
                    }
                }
                Vec::new()
            }

            ChatEvent::Submit => {
                if !self.is_idle() || self.input.trim().is_empty() {
                    return Vec::new();
                }
                let text = std::mem::take(&mut self.input).trim().to_string();
                let pending = self.push(Role::User, text);
                self.state = ChatState::Sending { pending };

                vec![Effect::SendChat(ChatRequest::with_history(
                    self.history(),
                    self.persona_id.clone(),
                ))]
            }

            ChatEvent::ResponseReceived(text) => {
                if !matches!(self.state, ChatState::Sending { .. }) {
                    return Vec::new();
                }
                let message_id = self.push(Role::Assistant, String::new());
                self.state = ChatState::Revealing {
                    message_id,
                    target: text.clone(),
                    shown: 0,
                };
                vec![Effect::StartReveal { message_id, text }]
            }

            ChatEvent::RevealTick(count) => {
                if let ChatState::Revealing { message_id, target, shown } = &mut self.state {
                    let total = target.chars().count();
                    *shown = count.min(total).max(*shown);
                    let (id, visible) = (*message_id, prefix(target, *shown).to_string());
                    self.set_content(id, visible);
                }
                Vec::new()
            }

            ChatEvent::RevealFinished => self.finish_reveal(false),

            ChatEvent::SkipReveal => self.finish_reveal(true),

            ChatEvent::ResponseFailed(error) => {
                let ChatState::Sending { pending } = self.state else {
                    return Vec::new();
                };
                if let Some(pos) = self.messages.iter().position(|m| m.id == pending) {
                    let message = self.messages.remove(pos);
                    self.input = message.content;
                }
                self.state = ChatState::Idle;
                vec![Effect::Toast(Toast::error(error))]
            }

            ChatEvent::PersonaLoaded(summary) => {
                self.persona = Some(summary);
                Vec::new()
            }

            ChatEvent::Reset => {
                if self.is_idle() {
                    self.messages.clear();
                    self.input.clear();
                }
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(text: &str) -> (ChatView, Vec<Effect>) {
        let mut view = ChatView::new("default");
        view.apply(ChatEvent::InputChanged(text.to_string()));
        let effects = view.apply(ChatEvent::Submit);
        (view, effects)
    }

    #[test]
    fn test_submit_sends_full_history() {
        let (view, effects) = submitted("What color does Doug like?");

        assert!(matches!(view.state(), ChatState::Sending { .. }));
        assert_eq!(view.input(), "");
        assert_eq!(view.messages().len(), 1);

        let [Effect::SendChat(request)] = effects.as_slice() else {
            panic!("expected a single SendChat, got {effects:?}");
        };
        assert_eq!(request.persona_id.as_deref(), Some("default"));
        assert_eq!(request.messages, vec![ChatTurn::user("What color does Doug like?")]);
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let (view, effects) = submitted("   ");
        assert!(effects.is_empty());
        assert!(view.is_idle());
        assert!(view.messages().is_empty());
    }

    #[test]
    fn test_input_ignored_while_sending() {
        let (mut view, _) = submitted("hi");
        view.apply(ChatEvent::InputChanged("typing".to_string()));
        assert_eq!(view.input(), "");
        assert!(view.apply(ChatEvent::Submit).is_empty());
    }

    #[test]
    fn test_quick_action_prefills_without_submitting() {
        let mut view = ChatView::new("default");
        let effects = view.apply(ChatEvent::QuickAction(1));
        assert!(effects.is_empty());
        assert!(view.is_idle());
        assert_eq!(view.input(), DEFAULT_QUICK_ACTIONS[1]);
        assert!(view.messages().is_empty());

        view.apply(ChatEvent::QuickAction(99));
        assert_eq!(view.input(), DEFAULT_QUICK_ACTIONS[1]);
    }

    #[test]
    fn test_reveal_flow() {
        let (mut view, _) = submitted("hi");
        let effects = view.apply(ChatEvent::ResponseReceived("Hey there!".to_string()));
        let [Effect::StartReveal { message_id, text }] = effects.as_slice() else {
            panic!("expected StartReveal, got {effects:?}");
        };
        assert_eq!(text, "Hey there!");

        view.apply(ChatEvent::RevealTick(3));
        assert_eq!(view.messages()[1].content, "Hey");
        assert_eq!(view.messages()[1].id, *message_id);

        // Ticks never move backwards
        view.apply(ChatEvent::RevealTick(1));
        assert_eq!(view.messages()[1].content, "Hey");

        view.apply(ChatEvent::RevealFinished);
        assert!(view.is_idle());
        assert_eq!(view.messages()[1].content, "Hey there!");
        assert_eq!(view.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn test_skip_reveal_cancels_task() {
        let (mut view, _) = submitted("hi");
        view.apply(ChatEvent::ResponseReceived("Long answer".to_string()));
        let effects = view.apply(ChatEvent::SkipReveal);
        assert_eq!(effects, vec![Effect::CancelReveal]);
        assert_eq!(view.messages()[1].content, "Long answer");
        assert!(view.is_idle());
    }

    #[test]
    fn test_failure_rolls_back_turn() {
        let mut view = ChatView::new("default");
        view.apply(ChatEvent::InputChanged("first".to_string()));
        view.apply(ChatEvent::Submit);
        view.apply(ChatEvent::ResponseReceived("ok".to_string()));
        view.apply(ChatEvent::RevealFinished);

        view.apply(ChatEvent::InputChanged("second".to_string()));
        view.apply(ChatEvent::Submit);
        let effects = view.apply(ChatEvent::ResponseFailed("Upstream timeout".to_string()));

        assert_eq!(effects, vec![Effect::Toast(Toast::error("Upstream timeout"))]);
        assert!(view.is_idle());
        assert_eq!(view.input(), "second");
        assert_eq!(view.messages().len(), 2);
        assert_eq!(view.messages()[1].content, "ok");
    }

    #[test]
    fn test_reset_only_when_idle() {
        let (mut view, _) = submitted("hi");
        view.apply(ChatEvent::Reset);
        assert_eq!(view.messages().len(), 1);

        view.apply(ChatEvent::ResponseFailed("boom".to_string()));
        view.apply(ChatEvent::Reset);
        assert!(view.messages().is_empty());
        assert_eq!(view.input(), "");
    }
}
