mod common;

use munin_gallery_core::contract::{
    MockCatalogSink, MockDocumentationRenderer, MockTransport, Transport,
};
use munin_gallery_core::error::AcquisitionError;
use munin_gallery_core::extract::Extractor;
use munin_gallery_core::pipeline::{Pipeline, PipelineOptions, PipelineState};
use munin_gallery_core::plugin::{Plugin, PluginMetadata};
use munin_gallery_core::source::SourceDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn tree_transport(build: fn(&std::path::Path)) -> Arc<dyn Transport> {
    let mut transport = MockTransport::new();
    transport.expect_fetch().times(1).returning(move |_, workspace| {
        build(workspace);
        Ok(())
    });
    transport.expect_file_timestamp().returning(|_| None);
    Arc::new(transport)
}

fn failing_transport() -> Arc<dyn Transport> {
    let mut transport = MockTransport::new();
    transport.expect_fetch().times(1).returning(|_, _| {
        Err(AcquisitionError::Workspace(std::io::Error::other(
            "host unreachable",
        )))
    });
    Arc::new(transport)
}

fn core_tree(workspace: &std::path::Path) {
    common::build_plugin_tree(&workspace.join("plugins"));
}

fn contrib_tree(workspace: &std::path::Path) {
    let root = workspace.join("plugins");
    common::write_file(&root, "mysql/mysql_queries", common::APACHE_PLUGIN, true);
    common::write_file(&root, "disk/smart_.in", common::CPU_PLUGIN, false);
}

fn extractor() -> Arc<Extractor> {
    let mut renderer = MockDocumentationRenderer::new();
    renderer
        .expect_render()
        .returning(|_| Ok("# NAME\n\ncpu - Plugin to monitor things\n".to_owned()));
    Arc::new(Extractor::new(Arc::new(renderer)).unwrap())
}

fn sources() -> Vec<(SourceDescriptor, Arc<dyn Transport>)> {
    vec![
        (
            SourceDescriptor::git("core", "https://example.invalid/munin.git", "master", "plugins"),
            tree_transport(core_tree),
        ),
        (
            SourceDescriptor::archive("offline", "https://example.invalid/gone.tar.gz", "."),
            failing_transport(),
        ),
        (
            SourceDescriptor::archive("contrib", "https://example.invalid/contrib.tar.gz", "plugins"),
            tree_transport(contrib_tree),
        ),
    ]
}

/// Extracted metadata and example-graph keys by plugin name; workspace paths differ between runs.
fn catalog(plugins: &[Plugin]) -> BTreeMap<String, (Option<PluginMetadata>, Vec<String>)> {
    plugins
        .iter()
        .map(|p| {
            let graphs = p.example_graphs().iter().map(|g| g.key.clone()).collect();
            (p.name().to_owned(), (p.metadata().cloned(), graphs))
        })
        .collect()
}

fn names(plugins: &[Plugin]) -> BTreeSet<String> {
    plugins.iter().map(|p| p.name().to_owned()).collect()
}

async fn run_with_workers(workers: usize) -> (Vec<Plugin>, munin_gallery_core::pipeline::PipelineReport) {
    let pipeline = Pipeline::new(
        sources(),
        extractor(),
        PipelineOptions {
            workers,
            queue_capacity: 2,
        },
    )
    .unwrap();
    let (report, plugins) = pipeline.run(Vec::new()).await;
    (plugins, report)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_source_does_not_abort_the_run() {
    let (plugins, report) = run_with_workers(3).await;

    let expected: BTreeSet<String> = ["apache_", "cpu", "exotic", "multicpu", "mysql_queries", "smart_"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(names(&plugins), expected);
    assert!(plugins.iter().all(Plugin::is_initialized));

    assert_eq!(report.sources, 3);
    assert_eq!(report.failed_sources, vec!["offline".to_owned()]);
    assert_eq!(report.discovered, 6);
    assert_eq!(report.extracted, 6);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.sink_errors, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_count_does_not_change_the_catalog() {
    let (single, _) = run_with_workers(1).await;
    let (many, _) = run_with_workers(8).await;
    assert!(single.iter().chain(&many).all(Plugin::is_initialized));
    assert_eq!(single.len(), many.len());
    assert_eq!(catalog(&single), catalog(&many));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_transitions_end_in_done() {
    let pipeline = Pipeline::new(
        sources(),
        extractor(),
        PipelineOptions {
            workers: 2,
            queue_capacity: 1,
        },
    )
    .unwrap();
    let mut states = pipeline.subscribe();
    assert_eq!(*states.borrow_and_update(), PipelineState::Idle);

    let (_, plugins) = pipeline.run(Vec::new()).await;
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), PipelineState::Done);
    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(plugins.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_errors_are_counted_not_propagated() {
    let pipeline = Pipeline::new(
        sources(),
        extractor(),
        PipelineOptions {
            workers: 2,
            queue_capacity: 4,
        },
    )
    .unwrap();
    let mut sink = MockCatalogSink::new();
    sink.expect_add()
        .times(6)
        .returning(|plugin| Err(format!("rejected {}", plugin.name()).into()));

    let (report, _) = pipeline.run(sink).await;
    assert_eq!(report.extracted, 6);
    assert_eq!(report.sink_errors, 6);
}

#[tokio::test]
async fn test_workspaces_are_removed_after_the_sink_releases_plugins() {
    let (plugins, _) = run_with_workers(2).await;
    let workspaces: BTreeSet<_> = plugins
        .iter()
        .filter_map(|p| p.repository())
        .map(|r| r.workspace().to_path_buf())
        .collect();
    assert_eq!(workspaces.len(), 2);
    assert!(workspaces.iter().all(|w| w.is_dir()));

    drop(plugins);
    assert!(workspaces.iter().all(|w| !w.exists()));
}

#[test]
fn test_pipeline_rejects_zero_workers() {
    let result = Pipeline::new(
        Vec::new(),
        extractor(),
        PipelineOptions {
            workers: 0,
            queue_capacity: 1,
        },
    );
    assert!(result.is_err());
}
