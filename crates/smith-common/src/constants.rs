//! Common constants used across the relay agent

/// Default chat relay address
pub const DEFAULT_CHAT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CHAT_PORT: u16 = 9000;

/// Default Ollama endpoint and model
pub const DEFAULT_OLLAMA_HOST: &str = "127.0.0.1";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Size of a single transport read
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Number of history entries sent with each prompt
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

/// Default personality file
pub const DEFAULT_PERSONALITY_FILE: &str = "personality.yaml";

/// Directory for session logs and history files
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Control frame markers that are never treated as chat messages
pub const DEFAULT_CONTROL_MARKERS: &[&str] = &["announce"];

/// Personality defaults
pub const DEFAULT_AGENT_NAME: &str = "Unknown Agent";
pub const DEFAULT_AGENT_DESCRIPTION: &str = "No description available";

/// Placeholder sent when a tool returns nothing
pub const NO_TOOL_DATA: &str = "No data returned by the tool";

/// Default timeout values in seconds
pub mod timeouts {
    pub const DEFAULT_TOOL_TIMEOUT: u64 = 60;
}
