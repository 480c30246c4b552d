//! Configuration types for the relay agent

use crate::constants::*;
use crate::error::{Result, SmithError};
use crate::types::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete runtime configuration, assembled by the binary before the loop starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    pub connection: ConnectionConfig,
    pub backend: BackendConfig,
    pub processor: ProcessorConfig,
    pub logging: LogConfig,
}

impl RelayConfig {
    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.connection.read_buffer_size == 0 {
            return Err(SmithError::Config(
                "read buffer size must be greater than zero".to_string(),
            ));
        }
        if self.processor.context_window == 0 {
            return Err(SmithError::Config(
                "context window must hold at least one message".to_string(),
            ));
        }
        if self.backend.model.trim().is_empty() {
            return Err(SmithError::Config("model name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Chat relay connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Maximum bytes read per frame
    pub read_buffer_size: usize,
    /// Leading `<word>` markers that identify control frames
    pub control_markers: Vec<String>,
}

impl ConnectionConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CHAT_HOST.to_string(),
            port: DEFAULT_CHAT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            control_markers: DEFAULT_CONTROL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Generation backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Ollama host, ignored by the genai backend
    pub host: String,
    /// Ollama port, ignored by the genai backend
    pub port: u16,
    /// Model identifier sent with every request
    pub model: String,
}

impl BackendConfig {
    /// Endpoint of the Ollama generate API
    pub fn generate_url(&self) -> String {
        format!("http://{}:{}/api/generate", self.host, self.port)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            host: DEFAULT_OLLAMA_HOST.to_string(),
            port: DEFAULT_OLLAMA_PORT,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Message processor options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Recognize and dispatch tool calls in generated text
    pub tool_calling: bool,
    /// Record every history entry in the session history file
    pub persist_history: bool,
    /// Number of recent history entries included in each prompt
    pub context_window: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tool_calling: true,
            persist_history: true,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl LogConfig {
    pub fn session_log_file(&self, session: &str) -> PathBuf {
        self.log_dir.join(format!("chat_session_{}.log", session))
    }

    pub fn history_file(&self, session: &str) -> PathBuf {
        self.log_dir.join(format!("chat_history_{}.txt", session))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_agent() {
        let config = RelayConfig::default();
        assert_eq!(config.connection.address(), "127.0.0.1:9000");
        assert_eq!(
            config.backend.generate_url(),
            "http://127.0.0.1:11434/api/generate"
        );
        assert_eq!(config.processor.context_window, 10);
        assert_eq!(config.connection.control_markers, vec!["announce".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = RelayConfig::default();
        config.processor.context_window = 0;
        assert!(matches!(config.validate(), Err(SmithError::Config(_))));
    }

    #[test]
    fn test_session_file_names() {
        let logging = LogConfig::default();
        assert_eq!(
            logging.history_file("20240101_000000"),
            PathBuf::from("logs/chat_history_20240101_000000.txt")
        );
        assert_eq!(
            logging.session_log_file("20240101_000000"),
            PathBuf::from("logs/chat_session_20240101_000000.log")
        );
    }
}
