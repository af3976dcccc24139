mod common;

use chrono::DateTime;
use munin_gallery_core::contract::{CatalogSink, MockDocumentationRenderer, MockTransport};
use munin_gallery_core::discovery::discover;
use munin_gallery_core::error::ExtractionError;
use munin_gallery_core::extract::{get_unexpected_categories, Extractor};
use munin_gallery_core::plugin::Plugin;
use munin_gallery_core::repository::Repository;
use munin_gallery_core::source::SourceDescriptor;
use munin_gallery_core::statistics::CatalogStatistics;
use std::sync::Arc;
use tempfile::tempdir;

const CPU_DOCUMENTATION: &str = "# NAME\n\ncpu - Plugin to monitor CPU usage.\n\n# CONFIGURATION\n\nNone.\n";
const TIMESTAMP: &str = "2020-05-17T12:30:00+02:00";

async fn acquired_plugins() -> Vec<Plugin> {
    let mut transport = MockTransport::new();
    transport.expect_fetch().returning(|_, workspace| {
        common::build_plugin_tree(&workspace.join("plugins"));
        Ok(())
    });
    transport
        .expect_file_timestamp()
        .returning(|_| DateTime::parse_from_rfc3339(TIMESTAMP).ok());
    let source = SourceDescriptor::git("core", "https://example.invalid/munin.git", "master", "plugins");
    let repository = Arc::new(Repository::with_transport(source, Arc::new(transport)).unwrap());
    repository.acquire().await.unwrap();
    discover(repository).unwrap().collect()
}

fn take(plugins: &mut Vec<Plugin>, name: &str) -> Plugin {
    let index = plugins.iter().position(|p| p.name() == name).unwrap();
    plugins.remove(index)
}

#[tokio::test]
async fn test_extract_documented_plugin() {
    let mut renderer = MockDocumentationRenderer::new();
    renderer
        .expect_render()
        .withf(|path| path.ends_with("node.d.linux/cpu"))
        .times(1)
        .returning(|_| Ok(CPU_DOCUMENTATION.to_owned()));
    let extractor = Extractor::new(Arc::new(renderer)).unwrap();

    let mut plugins = acquired_plugins().await;
    let mut cpu = take(&mut plugins, "cpu");
    extractor.extract(&mut cpu).await.unwrap();

    let metadata = cpu.metadata().unwrap();
    assert_eq!(
        metadata.documentation.as_deref(),
        Some("## Name\n\ncpu - Plugin to monitor CPU usage.\n\n## Configuration\n\nNone.")
    );
    assert_eq!(metadata.summary.as_deref(), Some("monitor CPU usage"));
    assert_eq!(metadata.family.as_deref(), Some("auto"));
    assert_eq!(metadata.capabilities, Some(vec!["autoconf".to_owned()]));
    assert_eq!(metadata.categories.iter().collect::<Vec<_>>(), vec!["system"]);
    assert_eq!(metadata.implementation_language.as_deref(), Some("sh"));
    assert_eq!(metadata.path_keywords, vec!["linux".to_owned()]);
    assert_eq!(
        metadata.changed_timestamp,
        DateTime::parse_from_rfc3339(TIMESTAMP).ok()
    );
    assert!(metadata.source_text.starts_with("#!/bin/sh"));
}

#[tokio::test]
async fn test_renderer_not_invoked_without_documentation_marker() {
    let mut renderer = MockDocumentationRenderer::new();
    renderer.expect_render().times(0);
    let extractor = Extractor::new(Arc::new(renderer)).unwrap();

    let mut plugins = acquired_plugins().await;
    let mut apache = take(&mut plugins, "apache_");
    extractor.extract(&mut apache).await.unwrap();

    let metadata = apache.metadata().unwrap();
    assert!(metadata.documentation.is_none());
    assert!(metadata.summary.is_none());
    assert_eq!(metadata.family.as_deref(), Some("contrib"));
    assert_eq!(
        metadata.capabilities,
        Some(vec!["autoconf".to_owned(), "suggest".to_owned()])
    );
    assert_eq!(metadata.implementation_language.as_deref(), Some("perl"));
    assert!(metadata.path_keywords.is_empty());
    assert_eq!(
        get_unexpected_categories(&apache).into_iter().collect::<Vec<_>>(),
        vec!["mysql".to_owned()]
    );
}

#[tokio::test]
async fn test_extraction_is_idempotent() {
    let mut renderer = MockDocumentationRenderer::new();
    renderer
        .expect_render()
        .times(1)
        .returning(|_| Ok(CPU_DOCUMENTATION.to_owned()));
    let extractor = Extractor::new(Arc::new(renderer)).unwrap();

    let mut plugins = acquired_plugins().await;
    let mut cpu = take(&mut plugins, "cpu");
    extractor.extract(&mut cpu).await.unwrap();
    let first = cpu.metadata().cloned();
    extractor.extract(&mut cpu).await.unwrap();
    assert_eq!(cpu.metadata().cloned(), first);
}

#[tokio::test]
async fn test_renderer_failure_only_drops_documentation() {
    let mut renderer = MockDocumentationRenderer::new();
    renderer.expect_render().returning(|path| {
        Err(ExtractionError::RenderOutput {
            path: path.to_path_buf(),
        })
    });
    let extractor = Extractor::new(Arc::new(renderer)).unwrap();

    let mut plugins = acquired_plugins().await;
    let mut cpu = take(&mut plugins, "cpu");
    extractor.extract(&mut cpu).await.unwrap();

    let metadata = cpu.metadata().unwrap();
    assert!(metadata.documentation.is_none());
    assert!(metadata.summary.is_none());
    assert_eq!(metadata.family.as_deref(), Some("auto"));
}

#[tokio::test]
async fn test_local_plugin_without_repository() {
    let dir = tempdir().unwrap();
    common::write_file(dir.path(), "exotic.in", common::EXOTIC_PLUGIN, false);
    let mut plugin = Plugin::from_path(dir.path().join("exotic.in"));
    assert_eq!(plugin.name(), "exotic");

    let mut renderer = MockDocumentationRenderer::new();
    renderer.expect_render().times(0);
    let extractor = Extractor::new(Arc::new(renderer)).unwrap();
    extractor.extract(&mut plugin).await.unwrap();

    let details = plugin.details().unwrap();
    assert!(!details.documentation);
    assert!(details.keywords.is_empty());
    assert!(details.changed_timestamp.is_none());
    assert_eq!(
        details.unexpected_categories.into_iter().collect::<Vec<_>>(),
        vec!["tinkering".to_owned()]
    );
    assert_eq!(
        plugin.metadata().unwrap().implementation_language.as_deref(),
        Some("python3")
    );
}

#[tokio::test]
async fn test_unreadable_plugin_fails_extraction() {
    let dir = tempdir().unwrap();
    let mut plugin = Plugin::from_path(dir.path().join("vanished"));
    let extractor = Extractor::new(Arc::new(MockDocumentationRenderer::new())).unwrap();

    let result = extractor.extract(&mut plugin).await;
    assert!(matches!(result, Err(ExtractionError::Read { .. })));
    assert!(!plugin.is_initialized());
}

#[tokio::test]
async fn test_statistics_over_extracted_plugins() {
    let mut renderer = MockDocumentationRenderer::new();
    renderer
        .expect_render()
        .returning(|_| Ok(CPU_DOCUMENTATION.to_owned()));
    let extractor = Extractor::new(Arc::new(renderer)).unwrap();

    let mut statistics = CatalogStatistics::default();
    for mut plugin in acquired_plugins().await {
        extractor.extract(&mut plugin).await.unwrap();
        statistics.add(plugin).await.unwrap();
    }

    // exotic, apache_, multicpu, cpu
    assert_eq!(statistics.all, 4);
    assert_eq!(statistics.missing_documentation, 3);
    assert_eq!(statistics.missing_summary, 3);
    assert_eq!(statistics.missing_family, 2);
    assert_eq!(statistics.missing_capabilities, 2);
    assert_eq!(statistics.unknown_implementation_language, 0);
    assert_eq!(statistics.unexpected_categories, 2);
}
