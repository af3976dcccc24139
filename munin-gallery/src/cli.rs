//! Command line interface of the munin plugin gallery.
//!
//! All pipeline logic lives in `munin-gallery-core`; this module parses the
//! command line, loads the configuration and wires the pipeline to its sinks.
//!
//! - `collect` runs the full ingestion pipeline and prints the catalog statistics.
//!   With `--export DIR` every plugin is additionally written as a site page below `DIR`.
//! - `inspect` extracts local plugin files and prints their details as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use munin_gallery_core::discovery::find_example_graphs;
use munin_gallery_core::extract::Extractor;
use munin_gallery_core::pipeline::{Pipeline, PipelineReport};
use munin_gallery_core::plugin::Plugin;
use munin_gallery_core::render::PerldocRenderer;
use munin_gallery_core::statistics::CatalogStatistics;
use std::path::PathBuf;
use std::sync::Arc;

use crate::export::SiteExport;
use crate::load_config::load_config;

/// Collect munin plugins from their upstream repositories into a browsable gallery.
#[derive(Parser)]
#[clap(
    name = "munin-gallery",
    version,
    about = "Collect munin plugins and their documentation into a plugin gallery"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import all configured plugin sources and report catalog statistics
    Collect {
        /// Path to the YAML config file (defaults to the upstream munin repositories)
        #[clap(long)]
        config: Option<PathBuf>,
        /// Site directory to export plugin pages into
        #[clap(long)]
        export: Option<PathBuf>,
    },
    /// Extract metadata of local plugin files and print it as JSON
    Inspect {
        /// Plugin files to inspect
        #[clap(required = true)]
        files: Vec<PathBuf>,
        /// Path to the YAML config file (only the renderer settings are used)
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Collect { config, export } => {
            let config = load_config(config.as_deref())?;
            let pipeline = Pipeline::from_config(&config)?;
            tracing::info!(command = "collect", "Starting plugin collection");

            match export {
                Some(site_directory) => {
                    let sink = SiteExport::new(&site_directory)?;
                    let (report, sink) = pipeline.run(sink).await;
                    print_summary(&report, sink.statistics());
                    tracing::info!(
                        command = "collect",
                        content = %sink.content_directory().display(),
                        "Site export complete"
                    );
                }
                None => {
                    let (report, statistics) = pipeline.run(CatalogStatistics::default()).await;
                    print_summary(&report, &statistics);
                }
            }
            Ok(())
        }
        Commands::Inspect { files, config } => {
            let config = load_config(config.as_deref())?;
            let renderer = Arc::new(PerldocRenderer::new(&config.renderer));
            let extractor = Extractor::new(renderer)?;

            let mut details = Vec::with_capacity(files.len());
            for file in files {
                let mut plugin = Plugin::from_path(&file);
                let graphs = find_example_graphs(plugin.path(), plugin.name());
                plugin.set_example_graphs(graphs);
                extractor
                    .extract(&mut plugin)
                    .await
                    .with_context(|| format!("Failed to inspect plugin {}", file.display()))?;
                tracing::info!(command = "inspect", plugin = %plugin, "Plugin inspected");
                details.extend(plugin.details());
            }
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
    }
}

fn print_summary(report: &PipelineReport, statistics: &CatalogStatistics) {
    if !report.failed_sources.is_empty() {
        println!("failed sources: {}", report.failed_sources.join(", "));
    }
    println!(
        "discovered: {}, extracted: {}, dropped: {}",
        report.discovered, report.extracted, report.dropped
    );
    print!("{statistics}");
}
