use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::contract::CatalogSink;
use crate::error::SinkError;
use crate::extract::get_unexpected_categories;
use crate::plugin::Plugin;

/// Catalog sink counting plugins with missing or unusual metadata.
///
/// Plugins are released after counting, so their workspaces can be removed
/// while the run continues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStatistics {
    pub all: usize,
    pub missing_documentation: usize,
    pub missing_family: usize,
    pub missing_capabilities: usize,
    pub missing_summary: usize,
    pub unknown_implementation_language: usize,
    pub unexpected_categories: usize,
}

impl CatalogStatistics {
    pub fn observe(&mut self, plugin: &Plugin) {
        self.all += 1;
        let Some(metadata) = plugin.metadata() else {
            // uninitialised plugins lack everything
            self.missing_documentation += 1;
            self.missing_family += 1;
            self.missing_capabilities += 1;
            self.missing_summary += 1;
            self.unknown_implementation_language += 1;
            return;
        };
        self.missing_documentation += usize::from(metadata.documentation.is_none());
        self.missing_family += usize::from(metadata.family.is_none());
        self.missing_capabilities += usize::from(metadata.capabilities.is_none());
        self.missing_summary += usize::from(metadata.summary.is_none());
        self.unknown_implementation_language +=
            usize::from(metadata.implementation_language.is_none());
        self.unexpected_categories += usize::from(!get_unexpected_categories(plugin).is_empty());
    }

    /// (key, count) pairs in reporting order.
    pub fn entries(&self) -> [(&'static str, usize); 7] {
        [
            ("all", self.all),
            ("missing_documentation", self.missing_documentation),
            ("missing_family", self.missing_family),
            ("missing_capabilities", self.missing_capabilities),
            ("missing_summary", self.missing_summary),
            (
                "unknown_implementation_language",
                self.unknown_implementation_language,
            ),
            ("unexpected_categories", self.unexpected_categories),
        ]
    }
}

#[async_trait]
impl CatalogSink for CatalogStatistics {
    async fn add(&mut self, plugin: Plugin) -> Result<(), SinkError> {
        self.observe(&plugin);
        Ok(())
    }
}

impl fmt::Display for CatalogStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, count) in self.entries() {
            writeln!(f, "{key}: {count}")?;
        }
        Ok(())
    }
}
