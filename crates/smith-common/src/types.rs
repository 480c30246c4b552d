//! Common types used across relay components

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Generation backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama server, `/api/generate`
    #[default]
    Ollama,
    /// Any provider supported by the genai client
    Genai,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::Genai => write!(f, "genai"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "genai" => Ok(BackendKind::Genai),
            other => Err(format!("unknown backend '{}', expected 'ollama' or 'genai'", other)),
        }
    }
}
