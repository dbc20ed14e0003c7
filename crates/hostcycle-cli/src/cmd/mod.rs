pub mod config;
pub mod probe;
pub mod restart;

use anyhow::Context;
use hostcycle_core::config::Config;
use std::path::Path;

/// Resolve and load the inventory shared by every subcommand.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = Config::resolve_path(explicit).context("failed to locate config")?;
    tracing::debug!(path = %path.display(), "loading config");
    Config::load(&path).with_context(|| format!("failed to load config from {}", path.display()))
}
