//! Tools the agent can invoke from generated text
//!
//! A tool declares its name, description and parameters. The same declaration
//! drives the prompt instructions and the dispatch contract.

pub mod dns;
pub mod registry;

pub use dns::QueryDnsTool;
pub use registry::ToolRegistry;

use anyhow::{Error, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named parameter of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Static description of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpec {
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }
}

/// A tool that can be used by the agent
#[async_trait]
pub trait AiTool: Send + Sync {
    /// The name of the tool
    fn name(&self) -> &str;

    /// A description of what the tool does
    fn description(&self) -> &str;

    /// Declared parameters, all required
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Execute the tool with the given arguments
    async fn execute(&self, params: &Map<String, Value>) -> Result<String, Error>;

    /// Check that every declared parameter is present
    fn validate_params(&self, params: &Map<String, Value>) -> Result<(), Error> {
        let missing: Vec<String> = self
            .parameters()
            .into_iter()
            .filter(|p| !params.contains_key(&p.name))
            .map(|p| p.name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Missing required parameters: {}", missing.join(", ")))
        }
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Read an argument as text; strings are taken as-is, other values use their JSON form
pub fn arg_as_text(params: &Map<String, Value>, name: &str) -> Option<String> {
    params.get(name).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
