use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::RendererConfig;
use crate::contract::DocumentationRenderer;
use crate::error::ExtractionError;

/// Renders POD documentation to markdown by running `perldoc` (or a compatible program).
#[derive(Debug, Clone)]
pub struct PerldocRenderer {
    program: String,
}

impl PerldocRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            program: config.program.clone(),
        }
    }
}

impl Default for PerldocRenderer {
    fn default() -> Self {
        Self::new(&RendererConfig::default())
    }
}

#[async_trait]
impl DocumentationRenderer for PerldocRenderer {
    async fn render(&self, path: &Path) -> Result<String, ExtractionError> {
        // markdown output, argument is a file, no pager
        let output = Command::new(&self.program)
            .args(["-o", "markdown", "-F", "-T"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ExtractionError::RenderSpawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            debug!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Documentation renderer failed"
            );
            return Err(ExtractionError::RenderExit {
                path: path.to_path_buf(),
                status: output.status,
            });
        }
        String::from_utf8(output.stdout).map_err(|_| ExtractionError::RenderOutput {
            path: path.to_path_buf(),
        })
    }
}
