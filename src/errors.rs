//! # Error Types Module
//!
//! Error types for static resource lookup and completion requests.

use std::path::PathBuf;

/// Errors raised while loading templates from the resources directory
#[derive(Debug)]
pub enum ResourceError {
    /// The named file does not exist
    NotFound(PathBuf),
    /// The file exists but could not be read as UTF-8 text
    Unreadable { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceError::NotFound(path) => write!(f, "Resource not found: {}", path.display()),
            ResourceError::Unreadable { path, source } => {
                write!(f, "Resource unreadable: {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::NotFound(_) => None,
            ResourceError::Unreadable { source, .. } => Some(source),
        }
    }
}

/// Errors returned by a completion backend
#[derive(Debug, Clone)]
pub enum CompletionError {
    /// Transport-level failure (connect, timeout, body read)
    Http(String),
    /// Non-success status from the API
    Api { status: u16, body: String },
    /// Response body did not match the expected shape
    Parse(String),
    /// The API answered without any content
    Empty,
    /// Too many recent failures; requests are short-circuited
    CircuitOpen,
}

impl CompletionError {
    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http(_) => true,
            CompletionError::Api { status, .. } => *status == 429 || *status >= 500,
            CompletionError::Parse(_) | CompletionError::Empty | CompletionError::CircuitOpen => {
                false
            }
        }
    }
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Http(msg) => write!(f, "HTTP error: {msg}"),
            CompletionError::Api { status, body } => write!(f, "API error: {status}: {body}"),
            CompletionError::Parse(msg) => write!(f, "Parse error: {msg}"),
            CompletionError::Empty => write!(f, "Empty response"),
            CompletionError::CircuitOpen => write!(f, "Circuit breaker open"),
        }
    }
}

impl std::error::Error for CompletionError {}
