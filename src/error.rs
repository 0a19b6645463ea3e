//! Error types for the Kwork bot.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the Kwork request/response API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("kwork error: {0}")]
    Rejected(String),

    #[error("Unexpected non-JSON response: {0}")]
    UnexpectedBody(String),

    #[error("Missing field {field} in {method} response")]
    MissingField { method: String, field: String },

    #[error("Invalid proxy URL {url}: {reason}")]
    InvalidProxy { url: String, reason: String },
}

/// Push channel (WebSocket) errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to get channel: {0}")]
    Token(#[from] ApiError),

    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Failed to read message: {0}")]
    Read(String),

    #[error("Push channel closed by server")]
    Closed,

    #[error("Push channel listener cancelled")]
    Cancelled,
}

/// Dispatcher errors.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("kwork bot error: no handlers registered")]
    NoHandlers,

    #[error("kwork bot cancelled")]
    Cancelled,

    #[error("Listener stopped: {0}")]
    Channel(#[from] ChannelError),
}

impl BotError {
    /// Cancellation is the normal way to stop a bot, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Channel(ChannelError::Cancelled))
    }
}
