use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Inference api_url cannot be empty")]
    EmptyApiUrl,

    #[error("Invalid {name}: {value}. Must be at least 1")]
    InvalidThreshold { name: &'static str, value: u64 },

    #[error("Invalid num_attempts: {0}. Must be at least 1")]
    InvalidNumAttempts(usize),

    #[error("Invalid max_workers: {0}. Must be at least 1")]
    InvalidMaxWorkers(usize),

    #[error("Invalid stream guard: {0}")]
    InvalidStreamGuard(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Environment variables read by earlier deployments of the solver, mapped
/// onto their configuration keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("GPT_OSS_API_URL", "inference.api_url"),
    ("GPT_OSS_API_KEY", "inference.api_key"),
    ("GPT_OSS_REASONING_EFFORT", "effort.generation"),
    ("GPT_OSS_REASONING_EFFORT", "effort.self_improvement"),
    ("GPT_OSS_REASONING_EFFORT", "effort.verification"),
];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .proofloop/config.yaml (project config)
    /// 3. .proofloop/local.yaml (project local overrides, optional)
    /// 4. `config_path`, when given on the command line
    /// 5. Legacy `GPT_OSS_*` environment variables
    /// 6. Environment variables (`PROOFLOOP_*` prefix, `__` for nesting)
    pub fn load(config_path: Option<&Path>) -> Result<Config> {
        let config: Config = Self::figment(config_path)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The merged provider stack used by [`ConfigLoader::load`].
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".proofloop/config.yaml"))
            .merge(Yaml::file(".proofloop/local.yaml"));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        for &(var, key) in LEGACY_ENV {
            figment = figment.merge(Env::raw().only(&[var]).map(move |_| key.into()));
        }

        figment.merge(Env::prefixed("PROOFLOOP_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.inference.api_url.trim().is_empty() {
            return Err(ConfigError::EmptyApiUrl);
        }
        if config.inference.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "request_timeout_secs",
                value: 0,
            });
        }

        let convergence = &config.convergence;
        for (name, value) in [
            ("accept_streak", convergence.accept_streak),
            ("failure_streak", convergence.failure_streak),
            ("max_rounds", convergence.max_rounds),
            ("max_runs", convergence.max_runs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidThreshold {
                    name,
                    value: u64::from(value),
                });
            }
        }

        let guard = &config.stream_guard;
        if guard.repetition_window == 0 || guard.repetition_threshold == 0 {
            return Err(ConfigError::InvalidStreamGuard(format!(
                "repetition_window ({}) and repetition_threshold ({}) must be positive",
                guard.repetition_window, guard.repetition_threshold
            )));
        }
        if guard.max_content_chars == 0 {
            return Err(ConfigError::InvalidStreamGuard(
                "max_content_chars must be positive".to_string(),
            ));
        }

        if config.fleet.num_attempts == 0 {
            return Err(ConfigError::InvalidNumAttempts(config.fleet.num_attempts));
        }
        if let Some(workers) = config.fleet.max_workers.filter(|w| *w == 0) {
            return Err(ConfigError::InvalidMaxWorkers(workers));
        }
        if config.fleet.timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "fleet.timeout_secs must be positive when set".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
