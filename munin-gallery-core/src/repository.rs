//! Repository acquisition: materialises one source in a private workspace.
//!
//! A [`Repository`] owns a temporary workspace directory from the moment it is
//! created. [`Repository::acquire`] fills it exactly once through the source's
//! [`Transport`]; concurrent or repeated calls share the first result. The
//! workspace is deleted (errors ignored) when the last reference to the
//! repository is dropped, whether or not acquisition ever succeeded.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::contract::Transport;
use crate::error::AcquisitionError;
use crate::source::{SourceDescriptor, TransportKind};

pub const WORKSPACE_PREFIX: &str = "munin-gallery-";

/// Upper bound for a single write into the extraction process.
pub const RELAY_CHUNK_SIZE: usize = 256 * 1024;

pub struct Repository {
    source: SourceDescriptor,
    transport: Arc<dyn Transport>,
    workspace: TempDir,
    plugin_root: OnceCell<PathBuf>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("source", &self.source.name)
            .field("workspace", &self.workspace.path())
            .field("plugin_root", &self.plugin_root.get())
            .finish()
    }
}

/// The built-in transport for a transport kind.
pub fn transport_for(kind: TransportKind) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Git => Arc::new(GitTransport),
        TransportKind::Archive => Arc::new(ArchiveTransport::default()),
    }
}

impl Repository {
    pub fn new(source: SourceDescriptor) -> Result<Self, AcquisitionError> {
        let transport = transport_for(source.transport);
        Self::with_transport(source, transport)
    }

    pub fn with_transport(
        source: SourceDescriptor,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AcquisitionError> {
        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(AcquisitionError::Workspace)?;
        debug!(
            source = %source.name,
            workspace = %workspace.path().display(),
            "Created repository workspace"
        );
        Ok(Self {
            source,
            transport,
            workspace,
            plugin_root: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Fetches the source into the workspace; later calls return the same plugin root.
    pub async fn acquire(&self) -> Result<&Path, AcquisitionError> {
        let root = self
            .plugin_root
            .get_or_try_init(|| async {
                info!(source = %self.source.name, url = %self.source.url, "Acquiring repository");
                self.transport
                    .fetch(&self.source, self.workspace.path())
                    .await?;
                let root = match self.source.sub_path() {
                    Some(sub_path) => self.workspace.path().join(sub_path),
                    None => self.workspace.path().to_path_buf(),
                };
                info!(
                    source = %self.source.name,
                    plugin_root = %root.display(),
                    "Repository acquired"
                );
                Ok::<_, AcquisitionError>(root)
            })
            .await?;
        Ok(root.as_path())
    }

    pub fn is_acquired(&self) -> bool {
        self.plugin_root.initialized()
    }

    pub fn plugin_root(&self) -> Option<&Path> {
        self.plugin_root.get().map(PathBuf::as_path)
    }

    pub async fn get_file_timestamp(&self, path: &Path) -> Option<DateTime<FixedOffset>> {
        self.transport.file_timestamp(path).await
    }

    /// `path` relative to the plugin root.
    pub fn get_relative_path(&self, path: &Path) -> Result<PathBuf, AcquisitionError> {
        let root = self
            .plugin_root()
            .ok_or_else(|| AcquisitionError::NotAcquired(self.source.name.clone()))?;
        path.strip_prefix(root)
            .map(Path::to_path_buf)
            .map_err(|_| AcquisitionError::OutsideRoot {
                path: path.to_path_buf(),
                root: root.to_path_buf(),
            })
    }
}

/// Full-history clone of a single branch; timestamps come from `git log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitTransport;

#[async_trait]
impl Transport for GitTransport {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        workspace: &Path,
    ) -> Result<(), AcquisitionError> {
        let branch = source.branch.as_deref().unwrap_or("master");
        // no "--depth": per-file timestamps need the history
        let output = Command::new("git")
            .arg("clone")
            .arg("--single-branch")
            .arg("--branch")
            .arg(branch)
            .arg(&source.url)
            .arg(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| AcquisitionError::Spawn {
                program: "git",
                source,
            })?;

        if output.status.success() {
            info!(
                url = %source.url,
                branch = branch,
                path = %workspace.display(),
                "Successfully cloned git repository"
            );
            Ok(())
        } else {
            Err(AcquisitionError::Exit {
                program: "git",
                location: source.url.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    async fn file_timestamp(&self, path: &Path) -> Option<DateTime<FixedOffset>> {
        let directory = path.parent()?;
        let file_name = path.file_name()?;
        let output = match Command::new("git")
            .args(["log", "-n", "1", "--no-merges", "--format=format:%aI", "--"])
            .arg(file_name)
            .current_dir(directory)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to run 'git log' for file timestamp");
                return None;
            }
        };
        if !output.status.success() {
            warn!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Failed to retrieve file timestamp via 'git log'"
            );
            return None;
        }
        parse_timestamp(&String::from_utf8_lossy(&output.stdout), path)
    }
}

fn parse_timestamp(raw: &str, path: &Path) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(timestamp) => Some(timestamp),
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                raw = %raw.trim(),
                "Failed to parse file timestamp"
            );
            None
        }
    }
}

/// Tarball streamed over HTTP straight into `tar`. Archives carry no per-file history.
#[derive(Debug, Default, Clone)]
pub struct ArchiveTransport {
    client: reqwest::Client,
}

impl ArchiveTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ArchiveTransport {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        workspace: &Path,
    ) -> Result<(), AcquisitionError> {
        // The top-level directory of the archive (named after repository and branch) is stripped.
        let mut command = Command::new("tar");
        command
            .arg("--extract")
            .arg("--gzip")
            .arg("--strip-components=1")
            .arg("--directory")
            .arg(workspace);
        if let Some(sub_path) = source.sub_path() {
            command.arg("--wildcards").arg(Path::new("*").join(sub_path));
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AcquisitionError::Spawn {
                program: "tar",
                source,
            })?;

        let relayed = match child.stdin.take() {
            Some(mut stdin) => {
                let result = relay_archive(&self.client, &source.url, &mut stdin).await;
                // closing stdin signals end of input to tar
                drop(stdin);
                result
            }
            None => Err(AcquisitionError::Relay {
                url: source.url.clone(),
                source: std::io::Error::other("stdin of tar was not captured"),
            }),
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| AcquisitionError::Spawn {
                program: "tar",
                source,
            })?;
        match relayed {
            // tar cannot succeed without the body: report the download failure itself
            Err(e @ AcquisitionError::Http { .. }) => Err(e),
            // a broken pipe after tar died says less than tar's own diagnostics
            _ if !output.status.success() => Err(AcquisitionError::Exit {
                program: "tar",
                location: source.url.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }),
            Err(e) => Err(e),
            Ok(bytes) => {
                info!(url = %source.url, bytes, path = %workspace.display(), "Extracted source archive");
                Ok(())
            }
        }
    }

    async fn file_timestamp(&self, _path: &Path) -> Option<DateTime<FixedOffset>> {
        None
    }
}

/// Streams the body of `url` into `sink` in chunks of at most [`RELAY_CHUNK_SIZE`] bytes,
/// then shuts the sink down. Returns the number of bytes relayed.
pub async fn relay_archive<W>(
    client: &reqwest::Client,
    url: &str,
    sink: &mut W,
) -> Result<u64, AcquisitionError>
where
    W: AsyncWrite + Unpin,
{
    let http_error = |source: reqwest::Error| AcquisitionError::Http {
        url: url.to_owned(),
        source,
    };
    let relay_error = |source: std::io::Error| AcquisitionError::Relay {
        url: url.to_owned(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_error)?;

    let mut body = response.bytes_stream();
    let mut relayed = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(http_error)?;
        for piece in chunk.chunks(RELAY_CHUNK_SIZE) {
            sink.write_all(piece).await.map_err(relay_error)?;
            relayed += piece.len() as u64;
        }
    }
    sink.shutdown().await.map_err(relay_error)?;
    debug!(url = %url, bytes = relayed, "Finished relaying archive");
    Ok(relayed)
}
