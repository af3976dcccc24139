//! Site export: writes one content page per plugin for the static gallery website.
//!
//! For every plugin a directory `<site>/content/plugins/<name>/` is created
//! holding a copy of the plugin source (`source`), its example graphs
//! (`<key>.<ext>`) and an `index.md` page. The page starts with a YAML front
//! matter block, followed by the documentation and a collapsible source view.
//!
//! Building the site from these pages is left to the site generator.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use munin_gallery_core::contract::CatalogSink;
use munin_gallery_core::error::SinkError;
use munin_gallery_core::plugin::Plugin;
use munin_gallery_core::statistics::CatalogStatistics;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

pub const MISSING_DOCUMENTATION_TEXT: &str = "Sadly there is no documentation for this plugin";

const CONTENT_DIRECTORY_NAME: &str = "content";
const PLUGINS_DIRECTORY_NAME: &str = "plugins";
const SOURCE_FILE_NAME: &str = "source";
const PAGE_FILE_NAME: &str = "index.md";

/// Reduces documentation to a plain word list for the site's search index.
#[derive(Debug, Clone)]
pub struct ContentIndexer {
    ignored_line: Regex,
    common_words: Regex,
    special_characters: Regex,
    whitespace: Regex,
}

impl ContentIndexer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // headings and magic markers
            ignored_line: Regex::new(r"(^#|^\s+#%#)")?,
            common_words: Regex::new(r"(?i)\b(copyright|munin|plugin)\b")?,
            special_characters: Regex::new(r"[^\w\s.]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn indexing_content(&self, text: &str) -> String {
        text.lines()
            .filter(|line| !self.ignored_line.is_match(line))
            .map(|line| {
                let line = self.common_words.replace_all(line, " ");
                let line = self.special_characters.replace_all(&line, " ");
                self.whitespace.replace_all(&line, " ").trim().to_owned()
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalGraph {
    pub key: String,
    pub path: String,
}

/// Front matter of a plugin page. Absent attributes are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct FrontMatter {
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,
    pub documentation_status: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub families: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub implementation_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexing_content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub example_graphs: Vec<LocalGraph>,
}

/// Catalog sink writing the content tree of the gallery website.
pub struct SiteExport {
    content_directory: PathBuf,
    indexer: ContentIndexer,
    statistics: CatalogStatistics,
}

impl SiteExport {
    pub fn new(site_directory: impl AsRef<Path>) -> Result<Self, regex::Error> {
        Ok(Self {
            content_directory: site_directory.as_ref().join(CONTENT_DIRECTORY_NAME),
            indexer: ContentIndexer::new()?,
            statistics: CatalogStatistics::default(),
        })
    }

    pub fn content_directory(&self) -> &Path {
        &self.content_directory
    }

    pub fn plugin_directory(&self, plugin_name: &str) -> PathBuf {
        self.content_directory
            .join(PLUGINS_DIRECTORY_NAME)
            .join(plugin_name)
    }

    /// Statistics of all plugins exported so far.
    pub fn statistics(&self) -> &CatalogStatistics {
        &self.statistics
    }

    pub fn front_matter(&self, plugin: &Plugin, example_graphs: Vec<LocalGraph>) -> FrontMatter {
        let metadata = plugin.metadata();
        let documentation = metadata.and_then(|m| m.documentation.as_deref());
        let mut keywords = metadata
            .map(|m| m.path_keywords.clone())
            .unwrap_or_default();
        keywords.sort();

        FrontMatter {
            title: plugin.name().to_owned(),
            repositories: plugin
                .repository()
                .map(|r| vec![r.name().to_owned()])
                .unwrap_or_default(),
            documentation_status: vec![if documentation.is_some() {
                "documented".to_owned()
            } else {
                "missing documentation".to_owned()
            }],
            date: metadata
                .and_then(|m| m.changed_timestamp)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, false)),
            summary: metadata.and_then(|m| m.summary.clone()),
            categories: metadata
                .map(|m| m.categories.iter().cloned().collect())
                .unwrap_or_default(),
            families: metadata
                .and_then(|m| m.family.clone())
                .into_iter()
                .collect(),
            capabilities: metadata
                .and_then(|m| m.capabilities.clone())
                .unwrap_or_default(),
            keywords,
            implementation_languages: metadata
                .and_then(|m| m.implementation_language.clone())
                .into_iter()
                .collect(),
            indexing_content: documentation.map(|d| self.indexer.indexing_content(d)),
            example_graphs,
        }
    }

    async fn export(&self, plugin: &Plugin) -> Result<PathBuf, SinkError> {
        let directory = self.plugin_directory(plugin.name());
        tokio::fs::create_dir_all(&directory).await?;
        let timestamp = plugin.metadata().and_then(|m| m.changed_timestamp);

        let source_path = directory.join(SOURCE_FILE_NAME);
        tokio::fs::copy(plugin.path(), &source_path).await?;
        set_timestamp(&source_path, timestamp);

        let mut local_graphs = Vec::new();
        for graph in plugin.example_graphs() {
            let mut file_name = graph.key.clone();
            if let Some(extension) = graph.path.extension() {
                file_name.push('.');
                file_name.push_str(&extension.to_string_lossy());
            }
            let destination = directory.join(&file_name);
            tokio::fs::copy(&graph.path, &destination).await?;
            set_timestamp(&destination, timestamp);
            local_graphs.push(LocalGraph {
                key: graph.key.clone(),
                path: file_name,
            });
        }

        let front_matter = serde_yaml::to_string(&self.front_matter(plugin, local_graphs))?;
        let documentation = plugin
            .metadata()
            .and_then(|m| m.documentation.as_deref())
            .unwrap_or(MISSING_DOCUMENTATION_TEXT);
        let language = plugin
            .metadata()
            .and_then(|m| m.implementation_language.as_deref())
            .unwrap_or("");
        let source_reference = format!(
            "/{PLUGINS_DIRECTORY_NAME}/{}/{SOURCE_FILE_NAME}",
            plugin.name()
        );
        let page = format!(
            "---\n{front_matter}---\n{documentation}\n\n\
             {{{{< collapse title=\"Source Code\" >}}}}\n\
             {{{{< code lang=\"{language}\" file=\"{source_reference}\" >}}}}\n\
             {{{{< /collapse >}}}}\n"
        );
        let page_path = directory.join(PAGE_FILE_NAME);
        tokio::fs::write(&page_path, page).await?;
        set_timestamp(&page_path, timestamp);
        set_timestamp(&directory, timestamp);
        Ok(page_path)
    }
}

/// Carries the plugin's change time over to an exported file or directory.
fn set_timestamp(path: &Path, timestamp: Option<DateTime<FixedOffset>>) {
    let Some(timestamp) = timestamp else {
        return;
    };
    // read-only handle: directories cannot be opened for writing
    let result = std::fs::File::open(path)
        .and_then(|file| file.set_modified(SystemTime::from(timestamp)));
    if let Err(e) = result {
        warn!(error = %e, path = %path.display(), "Failed to set file timestamp");
    }
}

#[async_trait]
impl CatalogSink for SiteExport {
    async fn add(&mut self, plugin: Plugin) -> Result<(), SinkError> {
        let page = self.export(&plugin).await?;
        debug!(plugin = %plugin.name(), page = %page.display(), "Exported plugin page");
        self.statistics.observe(&plugin);
        if self.statistics.all % 100 == 0 {
            info!(exported = self.statistics.all, "Site export progress");
        }
        Ok(())
    }
}
