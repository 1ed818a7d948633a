//! Interactive line-based chat.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use chatwire_core::config::Config;
use chatwire_core::{HttpTransport, Session, SessionOptions, SubmitError, Surface};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::terminal::{TerminalOptions, TerminalSurface};

const EXIT_COMMANDS: [&str; 2] = ["/exit", "/quit"];

/// Runs the chat loop until EOF or an exit command.
///
/// # Errors
/// Returns an error if the configuration is invalid or stdin cannot be read.
/// Failed turns are rendered and the loop continues.
pub async fn run_chat(config: &Config) -> Result<()> {
    let transport = HttpTransport::from_config(config)?;
    eprintln!("Connected to {}. Type /exit to quit.", transport.url());

    let stdin_is_tty = std::io::stdin().is_terminal();
    let mut options = TerminalOptions::chat(std::io::stdout().is_terminal());
    if !stdin_is_tty {
        options.prompt = None;
        options.echo_user = true;
    }

    let mut session = Session::with_options(
        transport,
        TerminalSurface::stdio(options),
        SessionOptions {
            stop_on_done: config.stop_on_done,
        },
    );
    session.surface_mut().set_input_enabled(true);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read input")? {
        let input = line.trim();
        if EXIT_COMMANDS.contains(&input) {
            break;
        }

        match session.submit(input).await {
            Ok(_) => {}
            Err(SubmitError::Blank) => session.surface_mut().set_input_enabled(true),
            Err(err @ SubmitError::Busy) => {
                tracing::warn!(%err, "Input ignored");
                session.surface_mut().set_input_enabled(true);
            }
        }
    }

    session.surface_mut().finish();
    tracing::info!(turns = session.history().len(), "Chat ended");
    Ok(())
}
