//! One browser tab's chat session.
//!
//! A `ChatSession` owns the conversation log, the model selection and the
//! turn state. The transport that accepted the connection owns the session
//! and drops it when the connection ends.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use streamchat_types::chat::{ConversationLog, ModelSelection, TurnState};
use streamchat_types::error::TurnError;

pub struct ChatSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    pub(crate) log: ConversationLog,
    model: ModelSelection,
    pub(crate) state: TurnState,
}

impl ChatSession {
    /// Start an empty session that will call `model`.
    pub fn new(model: ModelSelection) -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: Utc::now(),
            log: ConversationLog::new(),
            model,
            state: TurnState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn model(&self) -> &ModelSelection {
        &self.model
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TurnState::Idle
    }

    /// Select the model for future turns.
    ///
    /// `allowed` lists the selectable models; an empty list accepts any
    /// non-empty identifier. Turns already in the log keep the model they
    /// were generated with.
    pub fn set_model(&mut self, model: &str, allowed: &[String]) -> Result<(), TurnError> {
        if !self.is_idle() {
            return Err(TurnError::Busy);
        }
        let model = model.trim();
        if model.is_empty() || (!allowed.is_empty() && !allowed.iter().any(|m| m == model)) {
            return Err(TurnError::InvalidModel(model.to_string()));
        }
        if self.model.as_str() != model {
            tracing::info!(
                session_id = %self.id,
                from = %self.model,
                to = model,
                "Model changed"
            );
            self.model = ModelSelection::new(model);
        }
        Ok(())
    }

    /// Clear the conversation log. The model selection is kept.
    pub fn reset(&mut self) -> Result<(), TurnError> {
        if !self.is_idle() {
            return Err(TurnError::Busy);
        }
        tracing::info!(session_id = %self.id, turns = self.log.len(), "Conversation reset");
        self.log.clear();
        Ok(())
    }
}
