//! Exec command handler.

use anyhow::{Context, Result};
use chatwire_core::config::Config;

use crate::modes;

pub async fn run(prompt: &str, config: &Config, transcript: bool) -> Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("Prompt is empty");
    }

    let options = modes::exec::ExecOptions { transcript };
    modes::exec::run_exec(prompt, config, options)
        .await
        .context("execute prompt")?;

    Ok(())
}
