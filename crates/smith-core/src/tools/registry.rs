//! Tool registry and dispatch

use crate::tool_call::ToolCall;
use crate::tools::{AiTool, QueryDnsTool, ToolSpec};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Fixed mapping from tool name to tool, built once at startup
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn AiTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry holding every built-in tool
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(QueryDnsTool::default()));
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Box<dyn AiTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn AiTool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn spec(&self, name: &str) -> Option<ToolSpec> {
        self.get(name).map(|t| t.spec())
    }

    /// List all registered tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a parsed call.
    ///
    /// Returns `None` when the call is inert: the tool is unknown or a required
    /// parameter is missing. A failing tool yields its error as text.
    pub async fn dispatch(&self, call: &ToolCall) -> Option<String> {
        let Some(tool) = self.tools.get(&call.name) else {
            debug!("Ignoring call to unknown tool '{}'", call.name);
            return None;
        };

        if let Err(e) = tool.validate_params(&call.arguments) {
            debug!("Ignoring call to '{}': {}", call.name, e);
            return None;
        }

        info!("Executing tool: {} with args: {:?}", call.name, call.arguments);
        match tool.execute(&call.arguments).await {
            Ok(result) => {
                info!("Tool {} completed successfully", call.name);
                Some(result)
            }
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                Some(format!("Error executing tool {}: {}", call.name, e))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
