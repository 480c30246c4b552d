use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use smith_common::{
    BackendKind, DEFAULT_CHAT_HOST, DEFAULT_CHAT_PORT, DEFAULT_LOG_DIR, DEFAULT_MODEL,
    DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_PORT, DEFAULT_PERSONALITY_FILE, LogConfig, RelayConfig,
    session_timestamp,
};
use smith_core::{
    ConnectionLoop, ConversationHistory, FrameFilter, LoopExit, MessageProcessor, Personality,
    Role, ToolRegistry, client_from_config, connect,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the relay agent
#[derive(Parser, Debug)]
#[command(
    name = "smith",
    about = "Smith - an AI agent relaying a chat server to a text-generation backend"
)]
pub struct Args {
    /// Amount of verbosity
    #[clap(short, long, default_value_t = 0)]
    verbose: u8,

    /// Amount of debugging
    #[clap(short = 'e', long, default_value_t = 0)]
    debug: u8,

    /// Chat server address
    #[clap(short = 's', long, default_value = DEFAULT_CHAT_HOST)]
    chatserverip: String,

    /// Chat server port
    #[clap(short = 'p', long, default_value_t = DEFAULT_CHAT_PORT)]
    chatserverport: u16,

    /// Address of the Ollama server
    #[clap(short = 'o', long, default_value = DEFAULT_OLLAMA_HOST)]
    ollamaserver: String,

    /// Port of the Ollama server
    #[clap(short = 'P', long, default_value_t = DEFAULT_OLLAMA_PORT)]
    ollamaserverport: u16,

    /// Generation backend: ollama or genai
    #[clap(long, default_value = "ollama")]
    backend: BackendKind,

    /// Model to generate with
    #[clap(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Personality of the agent
    #[clap(short = 'n', long, default_value = DEFAULT_PERSONALITY_FILE)]
    personality: PathBuf,

    /// History entries sent with each prompt (overrides memory_lines)
    #[clap(long)]
    memory_lines: Option<usize>,

    /// Never parse or run tool calls
    #[clap(long)]
    no_tools: bool,

    /// Keep history in memory only
    #[clap(long)]
    no_history_file: bool,

    /// Directory for session logs and history files
    #[clap(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
}

impl Args {
    fn log_level(&self) -> &'static str {
        if self.debug > 0 {
            "trace"
        } else if self.verbose > 0 {
            "debug"
        } else {
            "info"
        }
    }

    fn to_config(&self, context_window: usize) -> RelayConfig {
        let mut config = RelayConfig::default();
        config.connection.host = self.chatserverip.clone();
        config.connection.port = self.chatserverport;
        config.backend.kind = self.backend;
        config.backend.host = self.ollamaserver.clone();
        config.backend.port = self.ollamaserverport;
        config.backend.model = self.model.clone();
        config.processor.tool_calling = !self.no_tools;
        config.processor.persist_history = !self.no_history_file;
        config.processor.context_window = self.memory_lines.unwrap_or(context_window);
        config.logging = self.log_config();
        config
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.log_dir.clone(),
            log_level: self.log_level().to_string(),
        }
    }
}

/// Log to stdout and to the session log file
fn setup_logging(logging: &LogConfig, session: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(&logging.log_dir)
        .with_context(|| format!("Failed to create {}", logging.log_dir.display()))?;
    let log_file = logging.session_log_file(session);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open {}", log_file.display()))?;

    let level = &logging.log_level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,smith={level},smith_core={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()?;

    Ok(log_file)
}

fn print_banner() {
    println!(
        "{}",
        "Smith: An AI Agent to follow your orders.".bright_cyan().bold()
    );
}

async fn open_history(config: &RelayConfig, session: &str) -> Result<ConversationHistory> {
    if !config.processor.persist_history {
        return Ok(ConversationHistory::new());
    }
    let path = config.logging.history_file(session);
    let history = ConversationHistory::with_sink(&path).await?;
    info!("Conversation history file: {}", path.display());
    Ok(history)
}

fn load_personality(path: &Path, registry: &ToolRegistry) -> Result<Personality> {
    Personality::load(path, registry)
        .with_context(|| format!("Failed to load personality from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    print_banner();

    let session = session_timestamp();
    let log_file = setup_logging(&args.log_config(), &session)?;
    info!("Starting new chat session. Log file: {}", log_file.display());

    let registry = ToolRegistry::with_defaults();
    let personality = load_personality(&args.personality, &registry)?;
    let config = args.to_config(personality.context_window);
    config.validate()?;

    let identity = Arc::new(personality.identity);
    let history = Arc::new(open_history(&config, &session).await?);
    history.append(
        Role::Personality,
        format!("{}: {}", identity.name, identity.description),
    );

    let client = client_from_config(&config.backend)?;
    let processor = Arc::new(
        MessageProcessor::new(
            identity.clone(),
            history.clone(),
            client,
            Arc::new(registry),
            config.processor.clone(),
        )
        .with_filter(FrameFilter::from_config(&config.connection)),
    );

    let stream = match connect(&config.connection).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("{}", e);
            history.sync().await;
            std::process::exit(1);
        }
    };

    let connection = ConnectionLoop::new(processor, &config.connection);
    info!("Message receiving loop started for agent '{}'", identity.name);

    let exit_code = tokio::select! {
        result = connection.run_tcp(stream) => match result {
            Ok(LoopExit::Disconnected) => 0,
            Err(e) => {
                error!("{}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Closing connection...".bright_yellow());
            info!("Received shutdown signal");
            0
        }
    };

    history.sync().await;
    info!("Closing connection and ending session");
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_flags() {
        let args = Args::parse_from(["smith"]);
        let config = args.to_config(10);
        assert_eq!(config.connection.address(), "127.0.0.1:9000");
        assert_eq!(config.backend.generate_url(), "http://127.0.0.1:11434/api/generate");
        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert!(config.processor.tool_calling);
        assert!(config.processor.persist_history);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_flags_override_personality_window() {
        let args = Args::parse_from([
            "smith", "-s", "10.0.0.2", "-p", "9100", "-P", "11500", "--memory-lines", "3",
            "--no-tools", "--backend", "genai", "-m", "gpt-4o-mini", "-v", "1",
        ]);
        let config = args.to_config(10);
        assert_eq!(config.connection.address(), "10.0.0.2:9100");
        assert_eq!(config.backend.port, 11500);
        assert_eq!(config.backend.kind, BackendKind::Genai);
        assert_eq!(config.backend.model, "gpt-4o-mini");
        assert_eq!(config.processor.context_window, 3);
        assert!(!config.processor.tool_calling);
        assert_eq!(config.logging.log_level, "debug");
    }
}
