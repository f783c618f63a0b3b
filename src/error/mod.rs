use crate::routing::PatternError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Hydrogen framework
#[derive(Error, Debug)]
pub enum Error {
    /// A route pattern was rejected at registration time
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: PatternError,
    },

    /// A request body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// A middleware failed while the chain was running
    #[error("Handler failure: {0}")]
    Handler(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("HTTP build error: {0}")]
    HttpBuild(#[from] hyper::http::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_pattern(pattern: impl Into<String>, reason: PatternError) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get error code for log lines
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidPattern { .. } => "E_INVALID_PATTERN",
            Error::Parse(_) => "E_PARSE",
            Error::Handler(_) => "E_HANDLER",
            Error::Http(_) => "E_HTTP",
            Error::HttpBuild(_) => "E_HTTP_BUILD",
            Error::Json(_) => "E_JSON",
            Error::Io(_) => "E_IO",
            Error::Config(_) => "E_CONFIG",
            Error::Internal(_) => "E_INTERNAL",
        }
    }
}
