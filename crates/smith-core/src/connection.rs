//! The chat connection
//!
//! One loop owns the read side of the transport. Every data frame is handed to
//! its own task; the loop goes straight back to reading. Replies from all tasks
//! share the write side through [`ReplySink`].

use crate::processor::MessageProcessor;
use regex::Regex;
use smith_common::{ConnectionConfig, Result, SmithError, truncate_for_log};
use std::sync::{Arc, LazyLock};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

static LEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(\w+)>").expect("marker pattern is valid"));

/// How the loop treats an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Transport metadata such as `<announce>...`
    Control,
    /// Nothing left once a leading marker is removed
    Empty,
    /// A chat message for the processor
    Message,
}

/// Recognizes control frames by their leading `<word>` marker
#[derive(Debug, Clone)]
pub struct FrameFilter {
    markers: Vec<String>,
}

impl FrameFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.control_markers.iter().cloned())
    }

    /// True when the text starts with one of the configured markers
    pub fn is_control(&self, text: &str) -> bool {
        LEADING_MARKER
            .captures(text)
            .and_then(|caps| caps.get(1))
            .is_some_and(|word| self.markers.iter().any(|m| m == word.as_str()))
    }

    pub fn classify(&self, text: &str) -> FrameKind {
        if self.is_control(text) {
            return FrameKind::Control;
        }
        let stripped = LEADING_MARKER.replace(text, "");
        if stripped.trim().is_empty() {
            FrameKind::Empty
        } else {
            FrameKind::Message
        }
    }
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

/// Shared write side of the connection. Each reply is written whole under one lock.
#[derive(Clone)]
pub struct ReplySink {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl ReplySink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write `line` followed by exactly one newline
    pub async fn send_line(&self, line: &str) -> Result<()> {
        let mut framed = line.trim_end_matches('\n').to_string();
        framed.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| SmithError::Transport(format!("Failed to send message: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| SmithError::Transport(format!("Failed to flush message: {}", e)))?;
        Ok(())
    }
}

/// Why the loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The peer closed the connection
    Disconnected,
}

/// Open the TCP connection to the chat relay
pub async fn connect(config: &ConnectionConfig) -> Result<TcpStream> {
    let address = config.address();
    let stream = TcpStream::connect(&address).await.map_err(|e| {
        SmithError::Transport(format!("Failed to connect to chat server {}: {}", address, e))
    })?;
    info!("Successfully connected to chat server at {}", address);
    Ok(stream)
}

pub struct ConnectionLoop {
    processor: Arc<MessageProcessor>,
    filter: FrameFilter,
    read_buffer_size: usize,
}

impl ConnectionLoop {
    pub fn new(processor: Arc<MessageProcessor>, config: &ConnectionConfig) -> Self {
        Self {
            processor,
            filter: FrameFilter::from_config(config),
            read_buffer_size: config.read_buffer_size.max(1),
        }
    }

    pub async fn run_tcp(&self, stream: TcpStream) -> Result<LoopExit> {
        let (reader, writer) = stream.into_split();
        self.run(reader, writer).await
    }

    /// Read frames until the peer closes or the read fails.
    ///
    /// Spawned message tasks are not awaited; they keep running after this returns.
    pub async fn run<R, W>(&self, mut reader: R, writer: W) -> Result<LoopExit>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let sink = ReplySink::new(writer);
        let mut buf = vec![0u8; self.read_buffer_size];
        // Bytes of a character split across reads
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    error!("Error receiving message: {}", e);
                    return Err(SmithError::Transport(format!(
                        "Error receiving message: {}",
                        e
                    )));
                }
            };

            if n == 0 {
                if !pending.is_empty() {
                    debug!("Dropping {} bytes of an unfinished character", pending.len());
                }
                warn!("Disconnected from server");
                return Ok(LoopExit::Disconnected);
            }

            pending.extend_from_slice(&buf[..n]);
            let complete = complete_prefix_len(&pending);
            if complete == 0 {
                continue;
            }
            let data = String::from_utf8_lossy(&pending[..complete]).into_owned();
            pending.drain(..complete);
            info!("Received new message from chat: {}", truncate_for_log(&data, 10_000));

            match self.filter.classify(&data) {
                FrameKind::Control => {
                    info!("Skipping control frame: {}", data.trim_end());
                    continue;
                }
                FrameKind::Empty => {
                    debug!("Skipping empty frame");
                    continue;
                }
                FrameKind::Message => {}
            }

            let processor = self.processor.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                processor.handle(&data, &sink).await;
            });
            info!("Started processing task for message");
        }
    }
}

/// Length of `bytes` without a trailing, still incomplete UTF-8 sequence.
///
/// Invalid sequences elsewhere count as complete and are decoded lossily.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let mut start = 0;
    loop {
        match std::str::from_utf8(&bytes[start..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                Some(invalid) => start += e.valid_up_to() + invalid,
                None => return start + e.valid_up_to(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Role;
    use crate::test_support::{
        FailingReader, RecordingWriter, ScriptedClient, processor, wait_until,
    };
    use std::time::Duration;

    #[test]
    fn test_classify_frames() {
        let filter = FrameFilter::default();
        assert_eq!(
            filter.classify("<announce>server restarted</announce>"),
            FrameKind::Control
        );
        assert_eq!(filter.classify("<msg>   \n"), FrameKind::Empty);
        assert_eq!(filter.classify(" \n"), FrameKind::Empty);
        assert_eq!(filter.classify("<msg>hello"), FrameKind::Message);
        assert_eq!(filter.classify("hello <announce>"), FrameKind::Message);
        assert!(!filter.is_control("<announcement>x"));
    }

    #[test]
    fn test_complete_prefix_holds_back_split_character() {
        assert_eq!(complete_prefix_len(b"abc"), 3);
        assert_eq!(complete_prefix_len(b"abc\xC3"), 3);
        assert_eq!(complete_prefix_len(b"\xE2\x82"), 0);
        assert_eq!(complete_prefix_len("abcé".as_bytes()), 5);
        // Invalid bytes in the middle are not held back
        assert_eq!(complete_prefix_len(b"a\xFFb"), 3);
        assert_eq!(complete_prefix_len(b"a\xFFb\xC3"), 3);
    }

    #[tokio::test]
    async fn test_character_split_across_reads_is_kept_whole() {
        let (processor, history) = processor(ScriptedClient::echo());
        let config = ConnectionConfig {
            read_buffer_size: 4,
            ..ConnectionConfig::default()
        };
        let connection = ConnectionLoop::new(Arc::new(processor), &config);
        let (mut chat, agent) = tokio::io::duplex(4096);
        let writer = RecordingWriter::default();

        let run = tokio::spawn({
            let writer = writer.clone();
            async move { connection.run(agent, writer).await }
        });

        chat.write_all("abcé".as_bytes()).await.unwrap();
        wait_until(|| writer.lines().len() == 2).await;
        drop(chat);
        run.await.unwrap().unwrap();

        let entries = history.snapshot();
        assert!(entries.iter().all(|m| !m.content.contains('\u{FFFD}')));
        let mut users: Vec<String> = entries
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .collect();
        users.sort();
        assert_eq!(users, vec!["abc".to_string(), "é".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_sink_appends_single_newline() {
        let writer = RecordingWriter::default();
        let sink = ReplySink::new(writer.clone());
        sink.send_line("Smith: hello").await.unwrap();
        sink.send_line("Smith: bye\n").await.unwrap();
        assert_eq!(writer.lines(), vec!["Smith: hello\n", "Smith: bye\n"]);
    }

    #[tokio::test]
    async fn test_control_frame_never_reaches_history() {
        let client = ScriptedClient::echo();
        let (processor, history) = processor(client.clone());
        let connection = ConnectionLoop::new(Arc::new(processor), &ConnectionConfig::default());
        let (mut chat, agent) = tokio::io::duplex(4096);
        let writer = RecordingWriter::default();

        let run = tokio::spawn({
            let writer = writer.clone();
            async move { connection.run(agent, writer).await }
        });

        chat.write_all(b"<announce>server restarted</announce>").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        chat.write_all(b"hello").await.unwrap();
        wait_until(|| writer.lines().len() == 1).await;
        drop(chat);

        assert_eq!(run.await.unwrap().unwrap(), LoopExit::Disconnected);
        let entries = history.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "hello");
        assert!(entries.iter().all(|m| !m.content.contains("announce")));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_loop_forwards_original_unstripped_text() {
        let client = ScriptedClient::echo();
        let (processor, history) = processor(client);
        let connection = ConnectionLoop::new(Arc::new(processor), &ConnectionConfig::default());
        let (mut chat, agent) = tokio::io::duplex(4096);
        let writer = RecordingWriter::default();

        let run = tokio::spawn({
            let writer = writer.clone();
            async move { connection.run(agent, writer).await }
        });

        chat.write_all(b"<alice>hi there").await.unwrap();
        wait_until(|| writer.lines().len() == 1).await;
        drop(chat);
        run.await.unwrap().unwrap();

        assert_eq!(history.snapshot()[0].content, "<alice>hi there");
    }

    #[tokio::test]
    async fn test_loop_does_not_wait_for_processing() {
        let client = ScriptedClient::echo().with_delay("slow", Duration::from_millis(300));
        let (processor, history) = processor(client);
        let connection = ConnectionLoop::new(Arc::new(processor), &ConnectionConfig::default());
        let (mut chat, agent) = tokio::io::duplex(4096);
        let writer = RecordingWriter::default();

        let run = tokio::spawn({
            let writer = writer.clone();
            async move { connection.run(agent, writer).await }
        });

        chat.write_all(b"slow").await.unwrap();
        wait_until(|| history.len() == 1).await;
        chat.write_all(b"fast").await.unwrap();
        wait_until(|| writer.lines().len() == 2).await;
        drop(chat);
        run.await.unwrap().unwrap();

        // The second message overtook the first
        assert_eq!(
            writer.lines(),
            vec!["Smith: echo: fast\n", "Smith: echo: slow\n"]
        );
    }

    #[tokio::test]
    async fn test_peer_close_ends_loop_without_error() {
        let (processor, history) = processor(ScriptedClient::echo());
        let connection = ConnectionLoop::new(Arc::new(processor), &ConnectionConfig::default());
        let (chat, agent) = tokio::io::duplex(64);
        drop(chat);

        let exit = connection.run(agent, RecordingWriter::default()).await.unwrap();
        assert_eq!(exit, LoopExit::Disconnected);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_is_a_transport_error() {
        let (processor, _history) = processor(ScriptedClient::echo());
        let connection = ConnectionLoop::new(Arc::new(processor), &ConnectionConfig::default());

        let result = connection.run(FailingReader, RecordingWriter::default()).await;
        assert!(matches!(result, Err(SmithError::Transport(_))));
    }
}
