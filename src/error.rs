//! Error types for the calendar chat agent.

use thiserror::Error;

/// Every failure a chat turn can run into.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Function arguments were missing or did not match the declared shape.
    #[error("invalid arguments: {0}")]
    Argument(String),

    /// A date or timestamp could not be parsed.
    #[error("invalid date/time format: {0}")]
    Format(String),

    #[error("no event types are configured with the calendar provider")]
    NoEventTypes,

    /// The requested slot overlaps an event the attendee already has.
    #[error("You already have an event scheduled at that time: {title} ({start} to {end})")]
    Conflict { title: String, start: String, end: String },

    #[error("{0}")]
    NotFound(String),

    /// Non-success response from the calendar provider.
    #[error("API error: {body} (status code: {status})")]
    Provider { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("language model error: {0}")]
    Model(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("history store error: {0}")]
    History(String),

    /// A provider-side failure annotated with the operation that hit it.
    #[error("failed to {operation}: {source}")]
    Calendar {
        operation: &'static str,
        #[source]
        source: Box<AgentError>,
    },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub fn during(self, operation: &'static str) -> Self {
        AgentError::Calendar { operation, source: Box::new(self) }
    }

    /// Peels off operation context and returns the underlying kind.
    pub fn root(&self) -> &AgentError {
        match self {
            AgentError::Calendar { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors caused by what the client sent rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self.root(), AgentError::InvalidRequest(_) | AgentError::Argument(_))
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::History(err.to_string())
    }
}

impl From<redis::RedisError> for AgentError {
    fn from(err: redis::RedisError) -> Self {
        AgentError::History(err.to_string())
    }
}
