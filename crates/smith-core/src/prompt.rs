//! Prompt assembly
//!
//! A prompt is three labeled segments in fixed order: the agent personality,
//! the tool instructions and the transcript. The segments are serialized as
//! one JSON text because the generation backends only take a string.

use crate::history::ChatMessage;
use crate::personality::AgentIdentity;
use crate::tools::ToolSpec;
use serde::Serialize;

/// One labeled part of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptSegment {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prompt {
    pub segments: Vec<PromptSegment>,
}

impl Prompt {
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub struct PromptBuilder<'a> {
    identity: &'a AgentIdentity,
    tool_calling: bool,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(identity: &'a AgentIdentity) -> Self {
        Self {
            identity,
            tool_calling: true,
        }
    }

    /// Leave the tool instructions out of the prompt
    pub fn tool_calling(mut self, enabled: bool) -> Self {
        self.tool_calling = enabled;
        self
    }

    /// `context` is expected in chronological order
    pub fn build(&self, context: &[ChatMessage], message: &str) -> Prompt {
        let mut segments = vec![PromptSegment {
            role: "personality",
            content: format!(
                "Agent Name: {}\nDescription: {}",
                self.identity.name, self.identity.description
            ),
        }];

        if let Some(tool) = self.identity.tool.as_ref().filter(|_| self.tool_calling) {
            segments.push(PromptSegment {
                role: "tool",
                content: tool_instructions(tool),
            });
        }

        let transcript = context
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str().to_lowercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        segments.push(PromptSegment {
            role: "user",
            content: format!(
                "Previous conversation:\n{}\n\nCurrent message: {}",
                transcript, message
            ),
        });

        Prompt { segments }
    }
}

fn tool_instructions(tool: &ToolSpec) -> String {
    let parameters = tool
        .parameters
        .iter()
        .map(|p| {
            if p.description.is_empty() {
                format!("- {}", p.name)
            } else {
                format!("- {}: {}", p.name, p.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let example = tool
        .parameters
        .iter()
        .map(|p| format!("    \"{}\": \"{}_value\"", p.name, p.name))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"You have access to the function '{name}' to '{description}'. Using parameters:
{parameters}

If you choose to call a function ONLY reply in the following format with no prefix or suffix:

{{
  "function": "{name}",
  "parameters": {{
{example}
  }}
}}

Reminder:
- Function calls MUST follow the specified format
- Pay attention to the correct format
- Required parameters MUST be specified
- Put the entire function call reply on one line"#,
        name = tool.name,
        description = tool.description,
        parameters = parameters,
        example = example,
    )
}
