//! Ingestion view state machine

use personaiq_common::api::{IngestRequest, IngestResponse};

use crate::toast::Toast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Processing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    InputChanged(String),
    PersonaChanged(String),
    Submit,
    Completed(IngestResponse),
    Failed(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestEffect {
    SendIngest(IngestRequest),
    Toast(Toast),
}

#[derive(Debug, Clone)]
pub struct IngestView {
    persona_id: String,
    text: String,
    state: IngestState,
    last_result: Option<Result<IngestResponse, String>>,
}

impl IngestView {
    pub fn new(persona_id: impl Into<String>) -> Self {
        Self {
            persona_id: persona_id.into(),
            text: String::new(),
            state: IngestState::Idle,
            last_result: None,
        }
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn last_result(&self) -> Option<&Result<IngestResponse, String>> {
        self.last_result.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.state == IngestState::Processing
    }

    /// Apply one event, returning the effects to run
    pub fn apply(&mut self, event: IngestEvent) -> Vec<IngestEffect> {
        match event {
            IngestEvent::InputChanged(text) => {
                if !self.is_processing() {
                    self.text = text;
                }
                Vec::new()
            }

            IngestEvent::PersonaChanged(id) => {
                if !self.is_processing() {
                    self.persona_id = id;
                }
                Vec::new()
            }

            IngestEvent::Submit => {
                if self.is_processing() || self.text.trim().is_empty() {
                    return Vec::new();
                }
                self.state = IngestState::Processing;
                vec![IngestEffect::SendIngest(IngestRequest {
                    text: self.text.clone(),
                    persona_id: Some(self.persona_id.clone()),
                    metadata: None,
                })]
            }

            IngestEvent::Completed(response) => {
                if !self.is_processing() {
                    return Vec::new();
                }
                self.state = IngestState::Idle;
                let toast = Toast::success(response.message.clone());
                self.last_result = Some(Ok(response));
                vec![IngestEffect::Toast(toast)]
            }

            IngestEvent::Failed(error) => {
                if !self.is_processing() {
                    return Vec::new();
                }
                self.state = IngestState::Idle;
                self.last_result = Some(Err(error.clone()));
                vec![IngestEffect::Toast(Toast::error(error))]
            }

            IngestEvent::Clear => {
                if !self.is_processing() {
                    self.text.clear();
                    self.last_result = None;
                }
                Vec::new()
            }
        }
    }
}
