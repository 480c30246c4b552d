//! Conversation history shared by every in-flight message
//!
//! The history is append-only. All access goes through [`ConversationHistory::append`]
//! and [`ConversationHistory::window`], serialized by one short-lived mutex. The
//! optional session history file is written by a background task, fed in append
//! order while that mutex is held.

use serde::{Deserialize, Serialize};
use smith_common::{Result, entry_timestamp};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    Personality,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Personality => "Personality",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exchanged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub timestamp: String,
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: entry_timestamp(),
            role,
            content: content.into(),
        }
    }

    /// Line written to the history file
    pub fn to_log_line(&self) -> String {
        format!("[{}] {}: {}\n", self.timestamp, self.role, self.content)
    }
}

struct HistoryInner {
    messages: Vec<ChatMessage>,
    sink: Option<HistorySink>,
}

enum SinkCommand {
    Record(String),
    Sync(oneshot::Sender<()>),
}

/// Handle to the task appending every history entry to the session file
struct HistorySink {
    path: PathBuf,
    tx: mpsc::UnboundedSender<SinkCommand>,
}

impl HistorySink {
    async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let task_path = path.to_path_buf();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    SinkCommand::Record(line) => {
                        let written = match file.write_all(line.as_bytes()).await {
                            Ok(()) => file.flush().await,
                            Err(e) => Err(e),
                        };
                        if let Err(e) = written {
                            warn!(
                                "Failed to write history entry to {}: {}",
                                task_path.display(),
                                e
                            );
                        }
                    }
                    SinkCommand::Sync(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("History writer for {} stopped", task_path.display());
        });

        Ok(Self {
            path: path.to_path_buf(),
            tx,
        })
    }

    fn record(&self, message: &ChatMessage) {
        if self.tx.send(SinkCommand::Record(message.to_log_line())).is_err() {
            warn!("History writer for {} is gone", self.path.display());
        }
    }
}

/// Thread-safe conversation history
pub struct ConversationHistory {
    inner: Mutex<HistoryInner>,
}

impl ConversationHistory {
    /// History kept in memory only
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HistoryInner {
                messages: Vec::new(),
                sink: None,
            }),
        }
    }

    /// History that also appends every entry to `path`. Must be called inside a runtime.
    pub async fn with_sink(path: impl AsRef<Path>) -> Result<Self> {
        let sink = HistorySink::open(path.as_ref()).await?;
        debug!("Recording conversation history to {}", sink.path.display());
        Ok(Self {
            inner: Mutex::new(HistoryInner {
                messages: Vec::new(),
                sink: Some(sink),
            }),
        })
    }

    // A panic while holding the lock cannot leave the Vec half-pushed,
    // so a poisoned guard is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry. The history file is written in the background.
    pub fn append(&self, role: Role, content: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(role, content);
        let mut inner = self.lock();
        if let Some(sink) = inner.sink.as_ref() {
            sink.record(&message);
        }
        inner.messages.push(message.clone());
        message
    }

    /// Wait until every entry appended so far has reached the history file
    pub async fn sync(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let sent = {
            let inner = self.lock();
            match inner.sink.as_ref() {
                Some(sink) => sink.tx.send(SinkCommand::Sync(done_tx)).is_ok(),
                None => false,
            }
        };
        if sent {
            let _ = done_rx.await;
        }
    }

    /// The `size` most recent entries in append order
    pub fn window(&self, size: usize) -> Vec<ChatMessage> {
        let inner = self.lock();
        let start = inner.messages.len().saturating_sub(size);
        inner.messages[start..].to_vec()
    }

    /// Every entry in append order
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}
