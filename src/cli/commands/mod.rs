//! CLI command implementations.

pub mod benchmark;
pub mod fleet;
pub mod solve;

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Load configuration and install the logger. The logger must stay alive
/// for the duration of the command.
pub(crate) fn bootstrap(
    config_path: Option<&Path>,
    apply: impl FnOnce(&mut Config),
) -> Result<(Config, LoggerImpl)> {
    let mut config = ConfigLoader::load(config_path)?;
    apply(&mut config);
    ConfigLoader::validate(&config).context("Invalid command-line overrides")?;

    let logger = LoggerImpl::init(&LogConfig::from_settings(&config.logging)?)?;
    Ok((config, logger))
}
