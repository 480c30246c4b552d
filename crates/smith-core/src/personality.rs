//! Agent identity loaded from the personality file
//!
//! ```yaml
//! agent-name: Smith
//! description: A terse network operator
//! function_name: query_dns
//! function_description: Query a DNS server for a specific record type
//! function_parameters:
//!   query: Domain to resolve
//!   query_type: Record type
//! memory_lines: 10
//! ```

use crate::tools::{ToolParameter, ToolRegistry, ToolSpec};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use smith_common::{
    DEFAULT_AGENT_DESCRIPTION, DEFAULT_AGENT_NAME, DEFAULT_CONTEXT_WINDOW, Result, SmithError,
};
use std::path::Path;
use tracing::{info, warn};

/// Who the agent is, plus the one tool it may call. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub name: String,
    pub description: String,
    pub tool: Option<ToolSpec>,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool: None,
        }
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tool = Some(tool);
        self
    }
}

/// A loaded personality file
#[derive(Debug, Clone)]
pub struct Personality {
    pub identity: AgentIdentity,
    /// `memory_lines`: how many history entries go into each prompt
    pub context_window: usize,
}

#[derive(Debug, Deserialize)]
struct PersonalityFile {
    #[serde(rename = "agent-name")]
    agent_name: Option<String>,
    description: Option<String>,
    function_name: Option<String>,
    function_description: Option<String>,
    function_parameters: Option<YamlValue>,
    memory_lines: Option<usize>,
}

impl Personality {
    /// Load and resolve a personality file
    pub fn load(path: impl AsRef<Path>, registry: &ToolRegistry) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SmithError::Personality(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let personality = Self::from_yaml_str(&contents, registry)?;
        info!(
            "Loaded personality '{}' from {}",
            personality.identity.name,
            path.display()
        );
        Ok(personality)
    }

    pub fn from_yaml_str(contents: &str, registry: &ToolRegistry) -> Result<Self> {
        let file: PersonalityFile = serde_yaml::from_str(contents)?;

        let tool = match file.function_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => Some(resolve_tool(
                name,
                file.function_description,
                file.function_parameters.as_ref(),
                registry,
            )?),
            None => None,
        };

        let context_window = file.memory_lines.unwrap_or(DEFAULT_CONTEXT_WINDOW);
        if context_window == 0 {
            return Err(SmithError::Personality(
                "memory_lines must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            identity: AgentIdentity {
                name: file
                    .agent_name
                    .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
                description: file
                    .description
                    .unwrap_or_else(|| DEFAULT_AGENT_DESCRIPTION.to_string()),
                tool,
            },
            context_window,
        })
    }
}

/// Combine the file's tool description with the registered tool.
///
/// Text given in the file wins for the prompt; the registered declaration fills
/// anything the file leaves out.
fn resolve_tool(
    name: String,
    description: Option<String>,
    parameters: Option<&YamlValue>,
    registry: &ToolRegistry,
) -> Result<ToolSpec> {
    let registered = registry.spec(&name);
    if registered.is_none() {
        warn!(
            "Personality names tool '{}' which is not registered; calls to it will be ignored. Available: {:?}",
            name,
            registry.list_tools()
        );
    }

    let mut parameters = match parameters {
        Some(value) => parse_parameters(value)?,
        None => Vec::new(),
    };
    if parameters.is_empty() {
        parameters = registered
            .as_ref()
            .map(|spec| spec.parameters.clone())
            .unwrap_or_default();
    }

    let description = description
        .or_else(|| registered.map(|spec| spec.description))
        .unwrap_or_default();

    Ok(ToolSpec {
        name,
        description,
        parameters,
    })
}

/// Accepts a mapping (`name: description`), a list of names or
/// `{name, description}` entries, or a comma separated string of names.
fn parse_parameters(value: &YamlValue) -> Result<Vec<ToolParameter>> {
    match value {
        YamlValue::Null => Ok(Vec::new()),
        YamlValue::String(names) => Ok(names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| ToolParameter::new(n, ""))
            .collect()),
        YamlValue::Mapping(map) => map
            .iter()
            .map(|(k, v)| Ok(ToolParameter::new(yaml_text(k)?, yaml_text(v)?)))
            .collect(),
        YamlValue::Sequence(items) => items
            .iter()
            .map(|item| match item {
                YamlValue::Mapping(entry) => {
                    let name = entry
                        .get("name")
                        .ok_or_else(|| {
                            SmithError::Personality(
                                "function_parameters entry without a name".to_string(),
                            )
                        })
                        .and_then(yaml_text)?;
                    let description = match entry.get("description") {
                        Some(d) => yaml_text(d)?,
                        None => String::new(),
                    };
                    Ok(ToolParameter::new(name, description))
                }
                other => Ok(ToolParameter::new(yaml_text(other)?, "")),
            })
            .collect(),
        other => Err(SmithError::Personality(format!(
            "function_parameters has an unsupported shape: {:?}",
            other
        ))),
    }
}

fn yaml_text(value: &YamlValue) -> Result<String> {
    match value {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Null => Ok(String::new()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        other => Ok(serde_yaml::to_string(other)?.trim().to_string()),
    }
}
