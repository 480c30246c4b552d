//! Doubles shared by the unit tests

use crate::history::ConversationHistory;
use crate::llm::GenerationClient;
use crate::personality::AgentIdentity;
use crate::processor::MessageProcessor;
use crate::tools::{AiTool, ToolParameter, ToolRegistry, arg_as_text};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value};
use smith_common::ProcessorConfig;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type Script = dyn Fn(&str) -> Result<String, String> + Send + Sync;

/// Generation client answering from a closure over the current message
#[derive(Clone)]
pub struct ScriptedClient {
    script: Arc<Script>,
    delays: Arc<HashMap<String, Duration>>,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl ScriptedClient {
    pub fn new(script: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            delays: Arc::new(HashMap::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    /// Answers `echo: <message>`
    pub fn echo() -> Self {
        Self::new(|message| Ok(format!("echo: {}", message)))
    }

    /// Hold the answer to `message` back for `delay`
    pub fn with_delay(mut self, message: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(message.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

/// The new message as placed at the end of the rendered prompt
fn current_message(prompt: &str) -> String {
    let marker = "Current message: ";
    let start = prompt.rfind(marker).map(|i| i + marker.len()).unwrap_or(0);
    let rest = &prompt[start..];
    rest.split('"').next().unwrap_or(rest).to_string()
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());

        let message = current_message(prompt);
        if let Some(delay) = self.delays.get(&message) {
            tokio::time::sleep(*delay).await;
        }
        (self.script)(&message).map_err(|e| anyhow!(e))
    }
}

/// Returns its `text` argument
pub struct EchoTool;

#[async_trait]
impl AiTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input text"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new("text", "Text to echo back")]
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<String, Error> {
        arg_as_text(params, "text").ok_or_else(|| anyhow!("Missing 'text' parameter"))
    }
}

pub fn processor(client: ScriptedClient) -> (MessageProcessor, Arc<ConversationHistory>) {
    processor_with(client, ProcessorConfig::default())
}

pub fn processor_with(
    client: ScriptedClient,
    config: ProcessorConfig,
) -> (MessageProcessor, Arc<ConversationHistory>) {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    let identity = AgentIdentity::new("Smith", "test agent")
        .with_tool(EchoTool.spec());
    let history = Arc::new(ConversationHistory::new());
    let processor = MessageProcessor::new(
        Arc::new(identity),
        history.clone(),
        Arc::new(client),
        Arc::new(registry),
        config,
    );
    (processor, history)
}

/// Writer that records every write call separately
#[derive(Clone, Default)]
pub struct RecordingWriter {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: bool,
}

impl RecordingWriter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|w| String::from_utf8_lossy(w).to_string())
            .collect()
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.fail {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer went away",
            )));
        }
        self.writes.lock().unwrap().push(buf.to_vec());
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Reader whose first read fails
pub struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}
