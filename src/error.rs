// src/error.rs

//! Unified error handling for the collector application.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regex compilation failed
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The messaging backend has no authorized session
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// The backend asked us to back off before retrying
    #[error("Rate limited, retry after {}s", retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },

    /// Transport-level failure for a single request
    #[error("Transport error for {context}: {message}")]
    Transport { context: String, message: String },

    /// The run was cancelled while waiting
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthenticationRequired(message.into())
    }

    /// Create a rate-limit signal.
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a transport error with context.
    pub fn transport(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error must abort the whole run rather than one channel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationRequired(_) | Self::Config(_))
    }
}
