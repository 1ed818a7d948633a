//! Single-shot exec mode.

use anyhow::{Context, Result};
use chatwire_core::config::Config;
use chatwire_core::{HttpTransport, Session, SessionOptions};

use super::terminal::{TerminalOptions, TerminalSurface};

/// A turn failure that the surface has already shown to the user.
///
/// `main` exits non-zero on it without printing anything else.
#[derive(Debug)]
pub struct ReportedError;

impl std::fmt::Display for ReportedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Turn failed")
    }
}

impl std::error::Error for ReportedError {}

/// Options for exec execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Print the conversation history as JSON once the turn ends.
    pub transcript: bool,
}

/// Sends `prompt` as a one-turn conversation and streams the reply.
///
/// Assistant text goes to stdout as it arrives; meta items and tool activity
/// go to stderr. Returns the reply recorded in the history (empty if the
/// backend rendered none).
///
/// # Errors
/// Returns an error if the prompt is blank or the configuration is invalid.
/// Transport failures are rendered first and then returned as
/// [`ReportedError`].
pub async fn run_exec(prompt: &str, config: &Config, options: ExecOptions) -> Result<String> {
    let transport = HttpTransport::from_config(config)?;
    tracing::info!(url = transport.url(), "Exec turn");

    let mut session = Session::with_options(
        transport,
        TerminalSurface::stdio(TerminalOptions::exec()),
        SessionOptions {
            stop_on_done: config.stop_on_done,
        },
    );

    let outcome = session.submit(prompt).await?;
    session.surface_mut().finish();

    if options.transcript {
        let transcript =
            serde_json::to_string_pretty(session.history()).context("serialize transcript")?;
        println!("{transcript}");
    }

    if let Some(err) = outcome.transport_error {
        tracing::warn!(kind = %err.kind, %err, "Exec turn failed");
        return Err(ReportedError.into());
    }
    Ok(outcome.reply.unwrap_or_default())
}
