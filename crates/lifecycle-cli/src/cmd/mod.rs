pub mod audit;
pub mod config;
pub mod extract;
pub mod init;
pub mod repair;
pub mod state;
pub mod transition;

use anyhow::Context;
use lifecycle_core::config::Config;
use lifecycle_core::observability::Observability;
use std::path::Path;

/// Config for read-only commands: defaults when the root has no lifecycle.yaml.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(root).context("failed to load lifecycle.yaml")
}

pub fn observability(config: &Config) -> Observability {
    Observability::new(&config.observability)
}
