//! # contract: the seams of the ingestion pipeline
//!
//! Three traits separate the pipeline from the outside world:
//! - [`Transport`] materialises a source in a workspace and answers per-file history questions.
//! - [`DocumentationRenderer`] turns a plugin file into markdown (an external program in production).
//! - [`CatalogSink`] receives finished plugin records one at a time.
//!
//! All traits are annotated for `mockall`, so tests can substitute deterministic
//! implementations (see `MockTransport`, `MockDocumentationRenderer`, `MockCatalogSink`).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::path::Path;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{AcquisitionError, ExtractionError, SinkError};
use crate::plugin::Plugin;
use crate::source::SourceDescriptor;

/// Transfers one source into a local workspace.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Populate `workspace` (an existing, empty directory) with the content of `source`.
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        workspace: &Path,
    ) -> Result<(), AcquisitionError>;

    /// Time of the most recent change of `path`, if the transport keeps history.
    async fn file_timestamp(&self, path: &Path) -> Option<DateTime<FixedOffset>>;
}

/// Produces markdown documentation for a plugin file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentationRenderer: Send + Sync {
    async fn render(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Consumer of completed plugin records (exporter, statistics, ...).
///
/// Implementations must accept plugins with any subset of metadata absent.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CatalogSink: Send {
    async fn add(&mut self, plugin: Plugin) -> Result<(), SinkError>;
}

#[async_trait]
impl CatalogSink for Vec<Plugin> {
    async fn add(&mut self, plugin: Plugin) -> Result<(), SinkError> {
        self.push(plugin);
        Ok(())
    }
}
