use thiserror::Error;

use crate::chat::{Role, TurnOutcome};
use crate::llm::LlmError;

/// Text written into an assistant turn that was cut off before it finished.
pub const ABANDONED_INDICATOR: &str = "*Response interrupted.*";

/// Errors from mutating a [`ConversationLog`](crate::chat::ConversationLog).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("expected a {expected} turn, got {got}")]
    OutOfOrder { expected: Role, got: Role },

    #[error("an assistant turn is still in progress")]
    TurnInProgress,

    #[error("no assistant turn is in progress")]
    NoOpenTurn,
}

/// Errors from a single chat turn.
///
/// The first three end a turn that was already recorded; their
/// [`user_message`](TurnError::user_message) becomes the assistant turn's
/// content. The rest reject an operation before anything is recorded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("could not reach the completion API: {0}")]
    NetworkFailure(String),

    #[error("completion API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    UpstreamError {
        status: Option<u16>,
        message: String,
    },

    #[error("the model returned an empty response")]
    EmptyResponse,

    #[error("message is empty")]
    EmptyMessage,

    #[error("a response is still streaming")]
    Busy,

    #[error("unknown model '{0}'")]
    InvalidModel(String),
}

impl TurnError {
    /// Text shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::NetworkFailure(_) => "*Could not connect to the API.*".to_string(),
            TurnError::UpstreamError { .. } => {
                "*An error occurred while generating the response.*".to_string()
            }
            TurnError::EmptyResponse => "*The model returned an empty response.*".to_string(),
            TurnError::EmptyMessage => "Type a message before sending.".to_string(),
            TurnError::Busy => "Wait for the current response to finish.".to_string(),
            TurnError::InvalidModel(model) => format!("Model '{model}' is not available."),
        }
    }

    /// Short machine-readable code, used in rejection frames.
    pub fn reason(&self) -> &'static str {
        match self {
            TurnError::NetworkFailure(_) => "network_failure",
            TurnError::UpstreamError { .. } => "upstream_error",
            TurnError::EmptyResponse => "empty_response",
            TurnError::EmptyMessage => "empty_message",
            TurnError::Busy => "busy",
            TurnError::InvalidModel(_) => "invalid_model",
        }
    }

    /// Outcome recorded on the assistant turn this error closed, if it
    /// closes one at all.
    pub fn outcome(&self) -> Option<TurnOutcome> {
        match self {
            TurnError::NetworkFailure(_) => Some(TurnOutcome::NetworkFailure),
            TurnError::UpstreamError { .. } => Some(TurnOutcome::UpstreamError),
            TurnError::EmptyResponse => Some(TurnOutcome::Empty),
            _ => None,
        }
    }
}

impl From<&LlmError> for TurnError {
    fn from(err: &LlmError) -> Self {
        match err {
            LlmError::Network(msg) => TurnError::NetworkFailure(msg.clone()),
            other => TurnError::UpstreamError {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<LlmError> for TurnError {
    fn from(err: LlmError) -> Self {
        TurnError::from(&err)
    }
}

/// Errors raised while loading configuration. All of them are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing API key: set the {var} environment variable")]
    MissingApiKey { var: String },

    #[error("invalid provider '{0}' (expected 'gemini' or 'openrouter')")]
    InvalidProvider(String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: String, value: String },

    #[error("no models configured and no default model set")]
    EmptyModels,

    #[error("default model '{0}' is not in the configured model list")]
    UnknownDefaultModel(String),

    #[error("'{model}' is not a {provider} model id")]
    ModelNotForProvider { model: String, provider: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_fixed() {
        assert_eq!(
            TurnError::NetworkFailure("refused".into()).user_message(),
            "*Could not connect to the API.*"
        );
        assert_eq!(
            TurnError::UpstreamError {
                status: Some(500),
                message: "boom".into()
            }
            .user_message(),
            "*An error occurred while generating the response.*"
        );
        assert_eq!(
            TurnError::EmptyResponse.user_message(),
            "*The model returned an empty response.*"
        );
    }

    #[test]
    fn test_llm_error_classification() {
        let net: TurnError = LlmError::Network("connection refused".into()).into();
        assert!(matches!(net, TurnError::NetworkFailure(_)));

        let upstream: TurnError = LlmError::Upstream {
            status: 503,
            body: "unavailable".into(),
        }
        .into();
        assert!(matches!(
            upstream,
            TurnError::UpstreamError {
                status: Some(503),
                ..
            }
        ));

        let malformed: TurnError = LlmError::Deserialization("bad json".into()).into();
        assert!(matches!(
            malformed,
            TurnError::UpstreamError { status: None, .. }
        ));

        let auth: TurnError = LlmError::AuthenticationFailed.into();
        assert_eq!(auth.outcome(), Some(TurnOutcome::UpstreamError));
    }

    #[test]
    fn test_turn_error_display() {
        let err = TurnError::UpstreamError {
            status: Some(429),
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "completion API error (429): slow down");
        let err = TurnError::UpstreamError {
            status: None,
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "completion API error: bad");
    }

    #[test]
    fn test_rejections_close_nothing() {
        assert_eq!(TurnError::Busy.outcome(), None);
        assert_eq!(TurnError::EmptyMessage.reason(), "empty_message");
        assert_eq!(TurnError::InvalidModel("x".into()).reason(), "invalid_model");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingApiKey {
            var: "GEMINI_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing API key: set the GEMINI_API_KEY environment variable"
        );
    }

    #[test]
    fn test_log_error_display() {
        let err = LogError::OutOfOrder {
            expected: Role::User,
            got: Role::Assistant,
        };
        assert_eq!(err.to_string(), "expected a user turn, got assistant");
    }
}
