//! Metadata extraction: derives structured attributes from a plugin's source text.
//!
//! Each attribute is derived independently. A failure in one step (a crashing
//! documentation renderer, an unreadable history) leaves that attribute absent
//! and is logged; only an unreadable plugin file fails the whole extraction.

pub mod documentation;
pub mod rules;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::contract::DocumentationRenderer;
use crate::error::{ConfigurationError, ExtractionError};
use crate::plugin::{Plugin, PluginMetadata};
use rules::{RuleSet, DOCUMENTATION_MARKER, SUMMARY_SEARCH_LINES, WELL_KNOWN_CATEGORIES};

pub struct Extractor {
    rules: RuleSet,
    renderer: Arc<dyn DocumentationRenderer>,
}

impl Extractor {
    pub fn new(renderer: Arc<dyn DocumentationRenderer>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            rules: RuleSet::new()?,
            renderer,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Initialises `plugin` in place. Already initialised plugins are left untouched.
    pub async fn extract(&self, plugin: &mut Plugin) -> Result<(), ExtractionError> {
        if plugin.is_initialized() {
            debug!(plugin = %plugin.name(), "Plugin already initialised");
            return Ok(());
        }
        let raw = tokio::fs::read(plugin.path())
            .await
            .map_err(|source| ExtractionError::Read {
                path: plugin.path().to_path_buf(),
                source,
            })?;
        let source_text = String::from_utf8_lossy(&raw).into_owned();

        let documentation = self.documentation(plugin, &source_text).await;
        let summary = documentation.as_deref().and_then(|d| self.summary(d));
        let implementation_language = match plugin.language_hint() {
            Some(language) => Some(language.to_owned()),
            None => self.implementation_language(&source_text),
        };
        let changed_timestamp = match plugin.repository() {
            Some(repository) => repository.get_file_timestamp(plugin.path()).await,
            None => None,
        };

        let metadata = PluginMetadata {
            family: self.family(&source_text),
            capabilities: self.capabilities(&source_text),
            categories: self.categories(&source_text),
            path_keywords: self.plugin_keywords(plugin),
            documentation,
            summary,
            implementation_language,
            changed_timestamp,
            source_text,
        };
        plugin.initialize(metadata);
        Ok(())
    }

    async fn documentation(&self, plugin: &Plugin, source_text: &str) -> Option<String> {
        // skip the renderer for files without any documentation
        if !source_text.contains(DOCUMENTATION_MARKER) {
            return None;
        }
        match self.renderer.render(plugin.path()).await {
            Ok(rendered) => Some(documentation::postprocess(&rendered)).filter(|d| !d.is_empty()),
            Err(e) => {
                info!(plugin = %plugin.name(), error = %e, "Failed to generate documentation");
                None
            }
        }
    }

    /// The summary from a "NAME - SUMMARY" line near the top of the documentation.
    pub fn summary(&self, documentation: &str) -> Option<String> {
        documentation
            .lines()
            .take(SUMMARY_SEARCH_LINES)
            .find_map(|line| self.rules.summary.captures(line))
            .and_then(|captures| captures.name("summary"))
            .map(|m| m.as_str().trim().to_owned())
            .filter(|summary| !summary.is_empty())
    }

    pub fn family(&self, source_text: &str) -> Option<String> {
        source_text
            .lines()
            .find_map(|line| self.rules.family.captures(line))
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().trim().to_lowercase())
            .filter(|family| !family.is_empty())
    }

    /// Capability tokens in declaration order.
    pub fn capabilities(&self, source_text: &str) -> Option<Vec<String>> {
        source_text
            .lines()
            .find_map(|line| self.rules.capabilities.captures(line))
            .and_then(|captures| captures.get(1))
            .map(|m| {
                m.as_str()
                    .split_whitespace()
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
            })
            .filter(|capabilities| !capabilities.is_empty())
    }

    pub fn categories(&self, source_text: &str) -> BTreeSet<String> {
        let mut categories = BTreeSet::new();
        for captures in self.rules.category.captures_iter(source_text) {
            let (Some(line), Some(category)) = (captures.name("line"), captures.name("category"))
            else {
                continue;
            };
            let line = line.as_str();
            if spans_multiple_lines(line) {
                continue;
            }
            if let Some(label) = self.rules.category_noise(line) {
                debug!(line = %line.trim(), rule = label, "Ignoring category candidate");
                continue;
            }
            categories.insert(category.as_str().to_lowercase());
        }
        categories
    }

    /// Language named by the interpreter directive on the first line.
    pub fn implementation_language(&self, source_text: &str) -> Option<String> {
        let first_line = source_text.lines().next()?;
        self.rules
            .languages
            .iter()
            .find(|rule| rule.pattern.is_match(first_line))
            .map(|rule| rule.label.to_owned())
    }

    /// Lower-cased path components with the grouping directories cleaned up.
    pub fn path_keywords(&self, relative_path: &Path) -> Vec<String> {
        relative_path
            .components()
            .filter_map(|component| match component {
                std::path::Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
                _ => None,
            })
            .map(|mut token| {
                for rewrite in &self.rules.keyword_cleanup {
                    token = rewrite
                        .pattern
                        .replace(&token, rewrite.replacement)
                        .into_owned();
                }
                token
            })
            .filter(|token| !token.is_empty())
            .collect()
    }

    fn plugin_keywords(&self, plugin: &Plugin) -> Vec<String> {
        let (Some(repository), Some(directory)) = (plugin.repository(), plugin.path().parent())
        else {
            return Vec::new();
        };
        match repository.get_relative_path(directory) {
            Ok(relative) => self.path_keywords(&relative),
            Err(e) => {
                warn!(plugin = %plugin.name(), error = %e, "Failed to derive path keywords");
                Vec::new()
            }
        }
    }
}

/// Line boundaries other than '\n' that may occur inside a regex line match.
const LINE_BOUNDARIES: &[char] = &[
    '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}', '\u{2029}',
];

/// A trailing '\r' belongs to a CRLF line ending.
fn spans_multiple_lines(line: &str) -> bool {
    line.strip_suffix('\r')
        .unwrap_or(line)
        .contains(LINE_BOUNDARIES)
}

/// Categories outside the well-known vocabulary.
pub fn unexpected_categories(categories: &BTreeSet<String>) -> BTreeSet<String> {
    categories
        .iter()
        .filter(|category| !WELL_KNOWN_CATEGORIES.contains(&category.as_str()))
        .cloned()
        .collect()
}

/// Unexpected categories of an extracted plugin; empty before extraction.
pub fn get_unexpected_categories(plugin: &Plugin) -> BTreeSet<String> {
    plugin
        .metadata()
        .map(|metadata| unexpected_categories(&metadata.categories))
        .unwrap_or_default()
}
