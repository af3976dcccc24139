//! Plugin records and their example graphs.
//!
//! A [`Plugin`] is created cheaply by discovery (name, path, example graphs)
//! and stays uninitialised until the extractor attaches its
//! [`PluginMetadata`]. Derived attributes are only reachable through
//! [`Plugin::metadata`], so nothing can read them before extraction finished.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::repository::Repository;

/// Suffixes removed from plugin file names (the stable-2.0 branch uses ".in" for all plugins).
pub const OPTIONAL_PLUGIN_SUFFIXES: &[&str] = &[".in"];

/// A sample chart image associated with a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleGraph {
    /// Period ("day", "week", "month", "year"), a numeric index or any other key.
    pub key: String,
    pub path: PathBuf,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Period {
    Day,
    Week,
    Month,
    Year,
}

/// Sort weight of a graph key: named periods, then numbers, then everything else.
#[derive(Debug, PartialEq, Eq)]
enum GraphKey<'a> {
    Period(Period),
    Index(&'a str),
    Other(&'a str),
}

impl<'a> GraphKey<'a> {
    fn parse(key: &'a str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "day" => return GraphKey::Period(Period::Day),
            "week" => return GraphKey::Period(Period::Week),
            "month" => return GraphKey::Period(Period::Month),
            "year" => return GraphKey::Period(Period::Year),
            _ => {}
        }
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            let digits = key.trim_start_matches('0');
            GraphKey::Index(digits)
        } else {
            GraphKey::Other(key)
        }
    }

    fn rank(&self) -> u8 {
        match self {
            GraphKey::Period(_) => 0,
            GraphKey::Index(_) => 1,
            GraphKey::Other(_) => 2,
        }
    }
}

impl Ord for GraphKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GraphKey::Period(a), GraphKey::Period(b)) => a.cmp(b),
            // numeric comparison of arbitrarily long digit strings without leading zeros
            (GraphKey::Index(a), GraphKey::Index(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (GraphKey::Other(a), GraphKey::Other(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for GraphKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExampleGraph {
    fn cmp(&self, other: &Self) -> Ordering {
        GraphKey::parse(&self.key)
            .cmp(&GraphKey::parse(&other.key))
            .then_with(|| self.key.cmp(&other.key))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for ExampleGraph {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Attributes derived from a plugin's source text. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PluginMetadata {
    pub source_text: String,
    pub documentation: Option<String>,
    pub family: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub categories: BTreeSet<String>,
    pub summary: Option<String>,
    pub implementation_language: Option<String>,
    pub path_keywords: Vec<String>,
    pub changed_timestamp: Option<DateTime<FixedOffset>>,
}

/// One discovered plugin file.
#[derive(Debug, Clone)]
pub struct Plugin {
    name: String,
    path: PathBuf,
    repository: Option<Arc<Repository>>,
    language_hint: Option<String>,
    example_graphs: Vec<ExampleGraph>,
    metadata: Option<PluginMetadata>,
}

impl Plugin {
    /// Creates an uninitialised plugin; `name` defaults to the file name with optional suffixes removed.
    pub fn new(
        path: impl Into<PathBuf>,
        repository: Option<Arc<Repository>>,
        name: Option<String>,
        language_hint: Option<String>,
    ) -> Self {
        let path = path.into();
        let name = name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let name = strip_optional_suffix(&name).to_owned();
        Self {
            name,
            path,
            repository,
            language_hint,
            example_graphs: Vec::new(),
            metadata: None,
        }
    }

    /// A plugin given directly by file path, without an owning repository.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(path, None, None, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository(&self) -> Option<&Arc<Repository>> {
        self.repository.as_ref()
    }

    /// Language known before extraction (compiled plugins, from their extension).
    pub fn language_hint(&self) -> Option<&str> {
        self.language_hint.as_deref()
    }

    pub fn example_graphs(&self) -> &[ExampleGraph] {
        &self.example_graphs
    }

    pub fn set_example_graphs(&mut self, mut graphs: Vec<ExampleGraph>) {
        graphs.sort();
        self.example_graphs = graphs;
    }

    pub fn is_initialized(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<&PluginMetadata> {
        self.metadata.as_ref()
    }

    /// Attaches extracted metadata. Only the first call has an effect.
    pub(crate) fn initialize(&mut self, metadata: PluginMetadata) {
        if self.metadata.is_none() {
            self.metadata = Some(metadata);
        }
    }

    pub fn details(&self) -> Option<PluginDetails> {
        let metadata = self.metadata.as_ref()?;
        Some(PluginDetails {
            name: self.name.clone(),
            documentation: metadata.documentation.is_some(),
            family: metadata.family.clone(),
            capabilities: metadata.capabilities.clone(),
            categories: metadata.categories.clone(),
            keywords: metadata.path_keywords.iter().cloned().collect(),
            unexpected_categories: crate::extract::unexpected_categories(&metadata.categories),
            example_graphs: self
                .example_graphs
                .iter()
                .map(|g| (g.key.clone(), g.path.clone()))
                .collect(),
            changed_timestamp: metadata.changed_timestamp,
        })
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.example_graphs.is_empty() {
            write!(f, "Plugin '{}'", self.name)
        } else {
            write!(
                f,
                "Plugin '{}' ({} example graphs)",
                self.name,
                self.example_graphs.len()
            )
        }
    }
}

/// Serialisable overview of an extracted plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDetails {
    pub name: String,
    pub documentation: bool,
    pub family: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub categories: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
    pub unexpected_categories: BTreeSet<String>,
    pub example_graphs: BTreeMap<String, PathBuf>,
    pub changed_timestamp: Option<DateTime<FixedOffset>>,
}

pub fn strip_optional_suffix(name: &str) -> &str {
    OPTIONAL_PLUGIN_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name)
}
