//! Conversation types for streamchat.
//!
//! These types model one browser session's conversation: the ordered log of
//! turns, the model selection, and the per-turn state of the streaming loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::LogError;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// How an assistant turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The stream finished normally with at least one fragment.
    Complete,
    /// The stream finished normally with zero fragments.
    Empty,
    /// The completion API could not be reached or the connection dropped.
    NetworkFailure,
    /// The completion API answered with an error or an unreadable payload.
    UpstreamError,
    /// The session went away before the stream finished.
    Abandoned,
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Complete => write!(f, "complete"),
            TurnOutcome::Empty => write!(f, "empty"),
            TurnOutcome::NetworkFailure => write!(f, "network_failure"),
            TurnOutcome::UpstreamError => write!(f, "upstream_error"),
            TurnOutcome::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// One message in the conversation.
///
/// Assistant turns carry the model that produced them and, once closed,
/// their outcome. An assistant turn with `outcome == None` is the one
/// currently being streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TurnOutcome>,
}

impl Turn {
    fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            created_at: Utc::now(),
            model: None,
            outcome: None,
        }
    }

    fn assistant_placeholder(model: String) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            model: Some(model),
            outcome: None,
        }
    }

    /// Whether this is an assistant turn still receiving fragments.
    pub fn is_open(&self) -> bool {
        self.role == Role::Assistant && self.outcome.is_none()
    }
}

/// One piece of the assistant's reply, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Log index of the assistant turn this fragment belongs to.
    pub index: usize,
    pub text: String,
}

/// Ordered, append-only history of turns for one session.
///
/// Every mutator checks the alternation invariant: the log starts with a
/// user turn and no two consecutive turns share a role. Only the newest
/// assistant turn may change after it is appended, and only while open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// The assistant turn currently being streamed, if any.
    pub fn open_turn(&self) -> Option<&Turn> {
        self.turns.last().filter(|t| t.is_open())
    }

    /// Append a user turn. Returns its index.
    pub fn push_user(&mut self, content: impl Into<String>) -> Result<usize, LogError> {
        match self.turns.last() {
            Some(t) if t.role == Role::User => {
                return Err(LogError::OutOfOrder {
                    expected: Role::Assistant,
                    got: Role::User,
                });
            }
            Some(t) if t.is_open() => return Err(LogError::TurnInProgress),
            _ => {}
        }
        self.turns.push(Turn::user(content.into()));
        Ok(self.turns.len() - 1)
    }

    /// Append an empty assistant turn answering the last user turn.
    /// Returns its index.
    pub fn push_assistant_placeholder(
        &mut self,
        model: impl Into<String>,
    ) -> Result<usize, LogError> {
        match self.turns.last() {
            Some(t) if t.role == Role::User => {}
            _ => {
                return Err(LogError::OutOfOrder {
                    expected: Role::User,
                    got: Role::Assistant,
                });
            }
        }
        self.turns.push(Turn::assistant_placeholder(model.into()));
        Ok(self.turns.len() - 1)
    }

    /// Append a fragment to the open assistant turn.
    pub fn append_to_open(&mut self, fragment: &str) -> Result<&Turn, LogError> {
        let turn = self.open_turn_mut()?;
        turn.content.push_str(fragment);
        Ok(turn)
    }

    /// Close the open assistant turn with `outcome`.
    ///
    /// When `replacement` is given it overwrites whatever content was
    /// streamed so far.
    pub fn close_open(
        &mut self,
        outcome: TurnOutcome,
        replacement: Option<String>,
    ) -> Result<&Turn, LogError> {
        let turn = self.open_turn_mut()?;
        if let Some(content) = replacement {
            turn.content = content;
        }
        turn.outcome = Some(outcome);
        Ok(turn)
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Whether the log starts with a user turn and strictly alternates.
    pub fn is_alternating(&self) -> bool {
        let mut expected = Role::User;
        for turn in &self.turns {
            if turn.role != expected {
                return false;
            }
            expected = match expected {
                Role::User => Role::Assistant,
                Role::Assistant => Role::User,
            };
        }
        true
    }

    fn open_turn_mut(&mut self) -> Result<&mut Turn, LogError> {
        self.turns
            .last_mut()
            .filter(|t| t.is_open())
            .ok_or(LogError::NoOpenTurn)
    }
}

impl<'a> IntoIterator for &'a ConversationLog {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Identifier of the remote model variant to call for future turns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSelection(String);

impl ModelSelection {
    pub fn new(model: impl Into<String>) -> Self {
        Self(model.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session is in its turn loop.
///
/// `Idle -> AwaitingResponse -> Streaming -> Idle`; a failure at any point
/// returns straight to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingResponse,
    Streaming,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::AwaitingResponse => write!(f, "awaiting_response"),
            TurnState::Streaming => write!(f, "streaming"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::User, Role::Assistant] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&TurnOutcome::NetworkFailure).unwrap();
        assert_eq!(json, "\"network_failure\"");
        assert_eq!(TurnOutcome::UpstreamError.to_string(), "upstream_error");
    }

    #[test]
    fn test_log_starts_with_user() {
        let mut log = ConversationLog::new();
        let err = log.push_assistant_placeholder("m").unwrap_err();
        assert!(matches!(err, LogError::OutOfOrder { .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_log_rejects_two_user_turns() {
        let mut log = ConversationLog::new();
        log.push_user("Hello").unwrap();
        assert!(log.push_user("again").is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_log_rejects_user_turn_while_streaming() {
        let mut log = ConversationLog::new();
        log.push_user("Hello").unwrap();
        log.push_assistant_placeholder("m").unwrap();
        assert!(matches!(log.push_user("next"), Err(LogError::TurnInProgress)));
    }

    #[test]
    fn test_open_turn_grows_then_freezes() {
        let mut log = ConversationLog::new();
        log.push_user("Hello").unwrap();
        let idx = log.push_assistant_placeholder("gemini-x").unwrap();
        assert_eq!(idx, 1);
        log.append_to_open("Hi").unwrap();
        log.append_to_open(" there").unwrap();
        assert_eq!(log.open_turn().unwrap().content, "Hi there");

        let closed = log.close_open(TurnOutcome::Complete, None).unwrap();
        assert_eq!(closed.content, "Hi there");
        assert_eq!(closed.model.as_deref(), Some("gemini-x"));
        assert!(log.open_turn().is_none());
        assert!(matches!(log.append_to_open("late"), Err(LogError::NoOpenTurn)));
        assert_eq!(log.get(1).unwrap().content, "Hi there");
    }

    #[test]
    fn test_close_with_replacement() {
        let mut log = ConversationLog::new();
        log.push_user("Hello").unwrap();
        log.push_assistant_placeholder("m").unwrap();
        log.append_to_open("partial").unwrap();
        let closed = log
            .close_open(TurnOutcome::NetworkFailure, Some("failed".to_string()))
            .unwrap();
        assert_eq!(closed.content, "failed");
        assert_eq!(closed.outcome, Some(TurnOutcome::NetworkFailure));
    }

    #[test]
    fn test_is_alternating() {
        let mut log = ConversationLog::new();
        assert!(log.is_alternating());
        log.push_user("a").unwrap();
        log.push_assistant_placeholder("m").unwrap();
        log.close_open(TurnOutcome::Empty, Some("none".into())).unwrap();
        log.push_user("b").unwrap();
        assert!(log.is_alternating());
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_model_selection_is_transparent() {
        let model = ModelSelection::new("gemini-2.5-pro-preview-05-06");
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, "\"gemini-2.5-pro-preview-05-06\"");
        assert_eq!(model.to_string(), "gemini-2.5-pro-preview-05-06");
    }

    #[test]
    fn test_turn_state_default() {
        assert_eq!(TurnState::default(), TurnState::Idle);
        assert_eq!(TurnState::AwaitingResponse.to_string(), "awaiting_response");
    }
}
