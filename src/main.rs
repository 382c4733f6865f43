mod cli;
mod config;
mod gemini_client;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use eyre::Result;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::ChatContext;
use crate::gemini_client::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: ChatOptions,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatOptions),
}

#[derive(Args, Clone)]
struct ChatOptions {
    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Path to the file holding API_KEY
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gemini model to talk to
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Root URL of the Gemini API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds to wait for a reply before giving up
    #[arg(short, long, default_value_t = 60)]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let options = match cli.command {
        Some(Commands::Chat(options)) => options,
        // Default to chat if no subcommand is provided
        None => cli.options,
    };

    let log_level = if options.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Gemini Chat CLI");

    let config_path = options
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let api_key = match config::load_api_key(&config_path) {
        Ok(key) => key,
        Err(e) => {
            error!(path = %config_path.display(), "{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let client = GeminiClient::new(api_key)?
        .with_model(options.model.as_str())
        .with_base_url(&options.base_url)?
        .with_timeout(Duration::from_secs(options.timeout))?;
    info!(model = client.model(), "Gemini client ready");

    let interactive = options.input.is_none();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        options.input,
        interactive,
        Arc::new(client),
    );
    chat_context.run().await
}
