//! `load_config`: turns an optional YAML file plus the environment into a validated [`RunConfig`].
//!
//! Without a file the built-in defaults (the three upstream munin repositories)
//! are used. `MUNIN_GALLERY_WORKERS` overrides the worker count of either.
//!
//! # Errors
//! Unreadable files, malformed YAML, a malformed override and any invariant
//! violation reported by [`RunConfig::validate`] are returned as `anyhow::Error`
//! with the offending path in the context.

use anyhow::{Context, Result};
use munin_gallery_core::config::RunConfig;
use munin_gallery_core::error::ConfigurationError;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const WORKERS_ENV: &str = "MUNIN_GALLERY_WORKERS";

pub fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            info!("No config file given, using built-in sources");
            RunConfig::default()
        }
    };

    if let Ok(raw) = std::env::var(WORKERS_ENV) {
        let workers = parse_workers(&raw)?;
        info!(env = WORKERS_ENV, workers, "Worker count overridden from environment");
        config.workers = Some(workers);
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration rejected");
        return Err(e.into());
    }
    config.trace_loaded();
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<RunConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(e).with_context(|| format!("Failed to read config file {path:?}"));
        }
    };

    match serde_yaml::from_str::<RunConfig>(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(ConfigurationError::Parse(format!("{}: {e}", path.display())).into())
        }
    }
}

fn parse_workers(raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|e| {
        ConfigurationError::Invalid(format!("{WORKERS_ENV}='{raw}' is not a worker count: {e}"))
            .into()
    })
}
