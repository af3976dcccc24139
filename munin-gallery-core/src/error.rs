//! Error taxonomy of the ingestion pipeline.
//!
//! Errors are caught at the smallest scope that can absorb them: an
//! [`AcquisitionError`] ends one source's producer, an [`ExtractionError`]
//! degrades one field (or drops one plugin), and only a
//! [`ConfigurationError`] stops a run before it starts.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while fetching or materialising one source.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' failed for {location} ({status}): {stderr}")]
    Exit {
        program: &'static str,
        location: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to download archive from '{url}': {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to relay archive from '{url}' into the extractor: {source}")]
    Relay {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("repository '{0}' has not been acquired")]
    NotAcquired(String),

    #[error("'{path}' is not inside the plugin root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Failure while deriving metadata for one plugin.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read plugin source '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn documentation renderer '{program}': {source}")]
    RenderSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("documentation renderer exited with {status} for '{path}'")]
    RenderExit {
        path: PathBuf,
        status: std::process::ExitStatus,
    },

    #[error("documentation renderer produced invalid UTF-8 for '{path}'")]
    RenderOutput { path: PathBuf },
}

/// Invalid run configuration, detected before any work starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors returned by catalog sinks; they are logged by the pipeline, never propagated.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;
