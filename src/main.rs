mod commands;
mod config;
mod credentials;
mod events;
mod llm;
mod prompts;
mod search;
mod session;
mod streaming;
mod turn;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, CredentialPolicy};
use crate::llm::LlmClient;
use crate::search::{DuckDuckGo, WebContextFetcher};
use crate::session::ChatSession;
use crate::turn::TurnHandler;
use crate::ui::conversation::ConversationManager;

#[derive(Parser)]
#[command(name = "unichat")]
#[command(version)]
#[command(about = "Chat with an LLM whose answers are grounded in a live web search", long_about = None)]
struct Cli {
    /// Model identifier to request completions from
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key for the completion provider (otherwise GROQ_API_KEY, config, or secrets.toml)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Ask for the API key inside the chat instead of requiring it at startup
    #[arg(long)]
    interactive_key: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question on stdout
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

enum LogTarget {
    Stderr,
    File,
}

fn init_tracing(config: &Config, target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogTarget::File => {
            let path = config.log_path();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if cli.interactive_key {
        config.credential_policy = CredentialPolicy::Interactive;
    }

    let target = match cli.command {
        Some(Commands::Ask { .. }) => LogTarget::Stderr,
        None => LogTarget::File,
    };
    init_tracing(&config, target)?;

    let credential = credentials::resolve(&config, cli.api_key.as_deref())?;
    let interactive = cli.command.is_none() && config.credential_policy == CredentialPolicy::Interactive;
    if !interactive && !credential.is_available() {
        anyhow::bail!(
            "⚠️ Add {} to the environment, {}, or pass --api-key (or start with --interactive-key).",
            credentials::API_KEY_ENV,
            config.secrets_path().display()
        );
    }

    let fetcher = WebContextFetcher::new(
        DuckDuckGo::from_config(&config).context("Failed to create search client")?,
        &config.search,
    );
    let llm = LlmClient::new(&config).context("Failed to create completion client")?;
    let handler = TurnHandler::new(fetcher, llm, config.model.clone());
    let mut session = ChatSession::new(credential);

    match cli.command {
        Some(Commands::Ask { query }) => commands::ask(&handler, &mut session, &query.join(" ")).await,
        None => {
            let manager = ConversationManager::new(config.credential_policy, config.model.clone());
            ui::app::run(handler, session, manager).await
        }
    }
}
