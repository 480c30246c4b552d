//! Per-message pipeline
//!
//! history(User) → prompt → generation → tool call → history(Assistant) → reply.
//! Every invocation is independent; nothing that goes wrong inside one can reach
//! the connection loop or a sibling invocation.

use crate::connection::{FrameFilter, ReplySink};
use crate::history::{ConversationHistory, Role};
use crate::llm::GenerationClient;
use crate::personality::AgentIdentity;
use crate::prompt::PromptBuilder;
use crate::tool_call::parse_tool_call;
use crate::tools::ToolRegistry;
use smith_common::{NO_TOOL_DATA, ProcessorConfig, Result, truncate_for_log};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What one invocation sends and records
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    line: String,
    history_entry: String,
}

pub struct MessageProcessor {
    identity: Arc<AgentIdentity>,
    history: Arc<ConversationHistory>,
    client: Arc<dyn GenerationClient>,
    registry: Arc<ToolRegistry>,
    config: ProcessorConfig,
    filter: FrameFilter,
}

impl MessageProcessor {
    pub fn new(
        identity: Arc<AgentIdentity>,
        history: Arc<ConversationHistory>,
        client: Arc<dyn GenerationClient>,
        registry: Arc<ToolRegistry>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            identity,
            history,
            client,
            registry,
            config,
            filter: FrameFilter::default(),
        }
    }

    /// Markers of frames this processor refuses to handle
    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Process one inbound message. Never fails; errors are reported on the sink.
    pub async fn handle(&self, raw: &str, sink: &ReplySink) {
        if let Err(e) = self.process(raw, sink).await {
            let message = format!("Error processing message: {}", e);
            error!("{}", message);
            if let Err(e) = sink.send_line(&message).await {
                error!("Failed to send error reply: {}", e);
            }
        }
    }

    async fn process(&self, raw: &str, sink: &ReplySink) -> Result<()> {
        if self.filter.is_control(raw) {
            info!("Skipping announcement: {}", raw.trim_end());
            return Ok(());
        }

        info!("Processing message: {}", truncate_for_log(raw, 10_000));
        self.history.append(Role::User, raw);

        let generated = self.generate(raw).await;
        let reply = self.compose_reply(&generated).await;

        self.history.append(Role::Assistant, reply.history_entry);
        sink.send_line(&reply.line).await?;
        info!("Response sent back to chat");
        Ok(())
    }

    /// Generated text, or a readable description of why generation failed
    async fn generate(&self, message: &str) -> String {
        let context = self.history.window(self.config.context_window);
        let prompt = PromptBuilder::new(&self.identity)
            .tool_calling(self.config.tool_calling)
            .build(&context, message);

        let result = match prompt.render() {
            Ok(text) => {
                debug!("Prompt: {}", text);
                self.client.generate(&text).await
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(text) => {
                info!("Backend response: {}", truncate_for_log(&text, 10_000));
                text
            }
            Err(e) => {
                error!("Error querying generation backend: {}", e);
                format!("Error querying generation backend: {}", e)
            }
        }
    }

    async fn compose_reply(&self, generated: &str) -> Reply {
        if self.config.tool_calling {
            if let Some(result) = self.run_tool_call(generated).await {
                let line = format!("{}: {}", self.identity.name, result);
                info!("Tool Response: {}", line);
                return Reply {
                    history_entry: line.clone(),
                    line,
                };
            }
        }

        Reply {
            line: format!("{}: {}", self.identity.name, generated),
            history_entry: generated.to_string(),
        }
    }

    /// Tool output for a dispatched call; `None` when there is no call or it is inert
    async fn run_tool_call(&self, generated: &str) -> Option<String> {
        let call = parse_tool_call(generated)?;
        let result = self.registry.dispatch(&call).await?;
        if result.trim().is_empty() {
            Some(NO_TOOL_DATA.to_string())
        } else {
            Some(result)
        }
    }
}
