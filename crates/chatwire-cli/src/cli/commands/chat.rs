//! Chat command handler.

use anyhow::{Context, Result};
use chatwire_core::config::Config;

use crate::modes;

pub async fn run(config: &Config) -> Result<()> {
    modes::chat::run_chat(config).await.context("chat session")
}
