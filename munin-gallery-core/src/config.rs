use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::ConfigurationError;
use crate::source::{SourceDescriptor, TransportKind};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_RENDERER_PROGRAM: &str = "perldoc";

/// Everything a pipeline run needs; built once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceDescriptor>,
    /// Size of the extraction worker pool; `None` uses the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    pub program: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_RENDERER_PROGRAM.to_owned(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            workers: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            renderer: RendererConfig::default(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// The upstream repositories published in the gallery.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::git(
            "munin",
            "https://github.com/munin-monitoring/munin.git",
            "master",
            "plugins",
        ),
        SourceDescriptor::git(
            "munin-2.0",
            "https://github.com/munin-monitoring/munin.git",
            "stable-2.0",
            "plugins",
        ),
        SourceDescriptor::git(
            "munin-contrib",
            "https://github.com/munin-monitoring/contrib.git",
            "master",
            "plugins",
        ),
    ]
}

impl RunConfig {
    /// Number of extraction workers to spawn.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigurationError::Invalid(
                    "source name must not be empty".into(),
                ));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigurationError::Invalid(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.url.trim().is_empty() {
                return Err(ConfigurationError::Invalid(format!(
                    "source '{}' has no url",
                    source.name
                )));
            }
            if source.transport == TransportKind::Git && source.branch.is_none() {
                return Err(ConfigurationError::Invalid(format!(
                    "git source '{}' requires a branch",
                    source.name
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(ConfigurationError::Invalid(
                "workers must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigurationError::Invalid(
                "queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            sources_count = self.sources.len(),
            workers = self.worker_count(),
            queue_capacity = self.queue_capacity,
            renderer = %self.renderer.program,
            "Loaded RunConfig"
        );
        for source in &self.sources {
            source.trace_loaded();
        }
        debug!(?self, "RunConfig loaded (full debug)");
    }
}
