//! Plugin discovery: walks a plugin tree and yields uninitialised [`Plugin`]s.
//!
//! A file is a plugin candidate when it is executable by its owner, when its
//! name ends in one of [`OPTIONAL_PLUGIN_SUFFIXES`], or when it carries a
//! compiled-language extension. Example-graph and debug directories are not
//! descended into. Entries are visited in file-name order within each
//! directory, so the sequence is stable across platforms.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AcquisitionError;
use crate::plugin::{strip_optional_suffix, ExampleGraph, Plugin, OPTIONAL_PLUGIN_SUFFIXES};
use crate::repository::Repository;

pub const EXAMPLE_GRAPH_DIRECTORY_NAME: &str = "example-graphs";

/// Directories that never contain plugins.
pub const SKIPPED_DIRECTORY_NAMES: &[&str] = &[EXAMPLE_GRAPH_DIRECTORY_NAME, "node.d.debug"];

/// (extension, implementation language) of plugins that are compiled before use.
pub const COMPILED_LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[(".c", "c"), (".cpp", "cpp")];

const EXAMPLE_GRAPH_PERIODS: &[&str] = &["day", "week", "month", "year"];

/// Name and language assigned to a file during classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub language: Option<String>,
}

/// Lazy, depth-first sequence of plugin candidates below a plugin root.
pub struct PluginCandidates {
    repository: Option<Arc<Repository>>,
    directories: Vec<PathBuf>,
    files: VecDeque<PathBuf>,
}

/// Discovers the plugins of an acquired repository.
pub fn discover(repository: Arc<Repository>) -> Result<PluginCandidates, AcquisitionError> {
    let root = repository
        .plugin_root()
        .ok_or_else(|| AcquisitionError::NotAcquired(repository.name().to_owned()))?
        .to_path_buf();
    Ok(PluginCandidates {
        repository: Some(repository),
        directories: vec![root],
        files: VecDeque::new(),
    })
}

/// Discovers plugins below an arbitrary directory; the plugins have no owning repository.
pub fn discover_directory(root: impl Into<PathBuf>) -> PluginCandidates {
    PluginCandidates {
        repository: None,
        directories: vec![root.into()],
        files: VecDeque::new(),
    }
}

impl PluginCandidates {
    fn scan(&mut self, directory: &Path) {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %directory.display(), "Failed to read plugin directory");
                return;
            }
        };
        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirectories = Vec::new();
        for entry in entries {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Failed to stat directory entry");
                    continue;
                }
            };
            if file_type.is_dir() {
                let skipped = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRECTORY_NAMES.contains(&name));
                if skipped {
                    debug!(path = %path.display(), "Skipping directory");
                } else {
                    subdirectories.push(path);
                }
            } else {
                self.files.push_back(path);
            }
        }
        // popped from the end: keep the first subdirectory on top
        self.directories.extend(subdirectories.into_iter().rev());
    }

    fn to_plugin(&self, path: PathBuf) -> Option<Plugin> {
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to stat plugin candidate");
                return None;
            }
        };
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let candidate = classify(&file_name, is_owner_executable(&metadata))?;
        let mut plugin = Plugin::new(
            path,
            self.repository.clone(),
            Some(candidate.name),
            candidate.language,
        );
        let graphs = find_example_graphs(plugin.path(), plugin.name());
        plugin.set_example_graphs(graphs);
        Some(plugin)
    }
}

impl Iterator for PluginCandidates {
    type Item = Plugin;

    fn next(&mut self) -> Option<Plugin> {
        loop {
            if let Some(path) = self.files.pop_front() {
                match self.to_plugin(path) {
                    Some(plugin) => return Some(plugin),
                    None => continue,
                }
            }
            let directory = self.directories.pop()?;
            self.scan(&directory);
        }
    }
}

/// Decides whether a file is a plugin, and under which name and language.
pub fn classify(file_name: &str, owner_executable: bool) -> Option<Candidate> {
    if owner_executable {
        return Some(Candidate {
            name: strip_optional_suffix(file_name).to_owned(),
            language: None,
        });
    }
    // plugins are not marked executable in some branches (e.g. "stable-2.0")
    if let Some(name) = OPTIONAL_PLUGIN_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
    {
        return Some(Candidate {
            name: name.to_owned(),
            language: None,
        });
    }
    COMPILED_LANGUAGE_EXTENSIONS
        .iter()
        .find_map(|(extension, language)| {
            file_name.strip_suffix(extension).map(|name| Candidate {
                name: name.to_owned(),
                language: Some((*language).to_owned()),
            })
        })
}

#[cfg(unix)]
fn is_owner_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_owner_executable(_metadata: &fs::Metadata) -> bool {
    false
}

/// Example graphs named `<plugin>-<period-or-number>.png` in the sibling example-graph directory.
pub fn find_example_graphs(plugin_path: &Path, plugin_name: &str) -> Vec<ExampleGraph> {
    let Some(directory) = plugin_path
        .parent()
        .map(|parent| parent.join(EXAMPLE_GRAPH_DIRECTORY_NAME))
    else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(&directory) else {
        return Vec::new();
    };
    let prefix = format!("{plugin_name}-");
    let mut graphs: Vec<_> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let file_name = entry.file_name().into_string().ok()?;
            let key = file_name.strip_prefix(&prefix)?.strip_suffix(".png")?;
            let is_key = EXAMPLE_GRAPH_PERIODS.contains(&key)
                || (!key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()));
            is_key.then(|| ExampleGraph {
                key: key.to_owned(),
                path: entry.path(),
            })
        })
        .collect();
    graphs.sort();
    graphs
}
