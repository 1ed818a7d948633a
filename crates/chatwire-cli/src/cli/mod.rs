//! CLI entry and dispatch.

use anyhow::{Context, Result};
use chatwire_core::config::{self, Config};
use chatwire_core::logging;
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "chatwire")]
#[command(version)]
#[command(about = "Streams chat replies from a render/patch backend into the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL (overrides CHATWIRE_BASE_URL and config)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Stop each turn at the backend's `done` event
    #[arg(long, global = true)]
    stop_on_done: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat: every input line is one turn (default)
    Chat,
    /// Sends a single prompt and streams the reply to stdout
    Exec {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Print the conversation history as JSON after the turn
        #[arg(long)]
        transcript: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Save the backend base URL to the config file
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        base_url,
        stop_on_done,
    } = cli;

    if let Some(Commands::Config { command }) = command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        };
    }

    let mut config = Config::load().context("load config")?;
    config.base_url_override = base_url;
    config.stop_on_done |= stop_on_done;

    let _log_guard = match logging::init(&config::paths::logs_dir(), &config.log_filter) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    match command {
        None | Some(Commands::Chat) => commands::chat::run(&config).await,
        Some(Commands::Exec { prompt, transcript }) => {
            commands::exec::run(&prompt, &config, transcript).await
        }
        Some(Commands::Config { .. }) => Ok(()),
    }
}
