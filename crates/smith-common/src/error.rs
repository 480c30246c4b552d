//! Smith Error Types
//!
//! Centralized error handling for the relay agent

use std::fmt;

/// Main error type for relay operations
#[derive(Debug)]
pub enum SmithError {
    /// Generic error with message
    Generic(String),
    /// IO-related errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
    /// Personality file errors
    Personality(String),
    /// Configuration errors
    Config(String),
    /// Transport faults on the chat connection
    Transport(String),
    /// Generation backend errors
    Backend(String),
}

impl fmt::Display for SmithError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmithError::Generic(msg) => write!(f, "Smith error: {}", msg),
            SmithError::Io(err) => write!(f, "IO error: {}", err),
            SmithError::Serde(err) => write!(f, "Serialization error: {}", err),
            SmithError::Personality(msg) => write!(f, "Personality error: {}", msg),
            SmithError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SmithError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SmithError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for SmithError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SmithError::Io(err) => Some(err),
            SmithError::Serde(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience result type for relay operations
pub type Result<T> = std::result::Result<T, SmithError>;

impl From<std::io::Error> for SmithError {
    fn from(err: std::io::Error) -> Self {
        SmithError::Io(err)
    }
}

impl From<serde_json::Error> for SmithError {
    fn from(err: serde_json::Error) -> Self {
        SmithError::Serde(err)
    }
}

impl From<serde_yaml::Error> for SmithError {
    fn from(err: serde_yaml::Error) -> Self {
        SmithError::Personality(err.to_string())
    }
}

impl From<anyhow::Error> for SmithError {
    fn from(err: anyhow::Error) -> Self {
        SmithError::Generic(err.to_string())
    }
}
