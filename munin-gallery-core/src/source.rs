use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// How a source is transferred to the local workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Full-history clone of one branch.
    Git,
    /// Gzip-compressed tarball fetched over HTTP.
    Archive,
}

/// Static description of one upstream plugin repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique key of the source (e.g. "munin-contrib").
    pub name: String,
    #[serde(rename = "type")]
    pub transport: TransportKind,
    pub url: String,
    /// Branch to clone; only meaningful for git sources.
    #[serde(default)]
    pub branch: Option<String>,
    /// Part of the tree holding the plugins.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SourceDescriptor {
    pub fn git(name: &str, url: &str, branch: &str, path: &str) -> Self {
        Self {
            name: name.to_owned(),
            transport: TransportKind::Git,
            url: url.to_owned(),
            branch: Some(branch.to_owned()),
            path: Some(PathBuf::from(path)),
        }
    }

    pub fn archive(name: &str, url: &str, path: &str) -> Self {
        Self {
            name: name.to_owned(),
            transport: TransportKind::Archive,
            url: url.to_owned(),
            branch: None,
            path: Some(PathBuf::from(path)),
        }
    }

    /// The sub-path filter, or `None` when the whole tree is requested ("." or empty).
    pub fn sub_path(&self) -> Option<&Path> {
        let path = self.path.as_deref()?;
        let trimmed = path.to_str().map(|p| p.trim_end_matches('/'));
        match trimmed {
            Some("") | Some(".") => None,
            _ => Some(path),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            source = %self.name,
            transport = ?self.transport,
            url = %self.url,
            branch = self.branch.as_deref().unwrap_or("-"),
            "Loaded plugin source"
        );
    }
}
