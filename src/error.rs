use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by a [`ResponseGenerator`](crate::generator::ResponseGenerator).
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    Auth(String),
    /// Errors returned by the model-serving backend
    #[error("Provider error: {0}")]
    Provider(String),
    /// API response parsing or format error
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormat {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    Json(String),
    /// The generator did not answer in time
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
    /// Retry attempts exceeded
    #[error("Retry attempts exceeded after {attempts} tries: {last_error}")]
    RetryExceeded { attempts: usize, last_error: String },
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Json(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

/// Error types that can occur while setting up, playing or replaying an episode.
#[derive(Debug, Error)]
pub enum GameError {
    /// A participant with the same name is already registered
    #[error("Participant '{0}' is already registered")]
    DuplicateParticipant(String),
    /// Lookup of a participant that was never registered
    #[error("Unknown participant '{0}'")]
    UnknownParticipant(String),
    /// Participant name is empty or reserved
    #[error("Invalid participant: {0}")]
    InvalidParticipant(String),
    /// A generator call failed during an exchange
    #[error("Backend error for {participant}: {source}")]
    Backend {
        participant: String,
        #[source]
        source: BackendError,
    },
    /// An utterance was rejected by the game's validation
    #[error("Response of {participant} rejected: {reason}")]
    ValidationRejected { participant: String, reason: String },
    /// The engine-level reprompt cap was hit
    #[error("Reprompt limit of {limit} exceeded for {participant}")]
    RepromptLimitExceeded { participant: String, limit: usize },
    /// A persisted interaction log violates the recorder invariants
    #[error("Replay inconsistency: {0}")]
    ReplayInconsistency(String),
    /// The game instance is malformed or misses required parameters
    #[error("Invalid game instance: {0}")]
    InvalidInstance(String),
    /// Operation not allowed in the current episode state
    #[error("Invalid episode state: {0}")]
    InvalidState(String),
    /// Episode was cancelled from the outside
    #[error("Episode cancelled")]
    Cancelled,
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Filesystem errors of the episode store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::Json(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
