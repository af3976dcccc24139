//! Pipeline coordinator: sources → pending queue → extraction workers → results queue → sink.
//!
//! One producer task per source acquires its repository and feeds the bounded
//! pending queue while walking the plugin tree. A fixed pool of workers takes
//! plugins from that queue, extracts their metadata and forwards them to the
//! results queue, which a single task drains into the [`CatalogSink`].
//!
//! # States
//! `Idle → Sourcing → Draining → Done`. The run enters `Draining` once every
//! producer has finished and `Done` once every queued plugin has been
//! processed; after that no further plugin reaches the results queue.
//!
//! # Error Handling
//! A failing source is logged and contributes no plugins; a plugin whose
//! extraction fails is logged and dropped; a sink error is logged. None of them
//! aborts the run.

use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::contract::{CatalogSink, Transport};
use crate::discovery::discover;
use crate::error::{AcquisitionError, ConfigurationError};
use crate::extract::Extractor;
use crate::plugin::Plugin;
use crate::render::PerldocRenderer;
use crate::repository::{transport_for, Repository};
use crate::source::SourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Sourcing,
    Draining,
    Done,
}

/// Aggregate outcome of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub sources: usize,
    pub failed_sources: Vec<String>,
    pub discovered: usize,
    pub extracted: usize,
    pub dropped: usize,
    pub sink_errors: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl From<&RunConfig> for PipelineOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            workers: config.worker_count(),
            queue_capacity: config.queue_capacity,
        }
    }
}

#[derive(Debug, Error)]
enum ImportError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("plugin discovery aborted: {0}")]
    Discovery(#[from] tokio::task::JoinError),
}

#[derive(Default)]
struct Counters {
    discovered: AtomicUsize,
    extracted: AtomicUsize,
    dropped: AtomicUsize,
}

pub struct Pipeline {
    sources: Vec<(SourceDescriptor, Arc<dyn Transport>)>,
    extractor: Arc<Extractor>,
    options: PipelineOptions,
    state: watch::Sender<PipelineState>,
}

impl Pipeline {
    /// Pipeline with the built-in transports and the configured documentation renderer.
    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let renderer = Arc::new(PerldocRenderer::new(&config.renderer));
        let extractor = Arc::new(Extractor::new(renderer)?);
        let sources = config
            .sources
            .iter()
            .map(|source| (source.clone(), transport_for(source.transport)))
            .collect();
        Self::new(sources, extractor, PipelineOptions::from(config))
    }

    pub fn new(
        sources: Vec<(SourceDescriptor, Arc<dyn Transport>)>,
        extractor: Arc<Extractor>,
        options: PipelineOptions,
    ) -> Result<Self, ConfigurationError> {
        if options.workers == 0 || options.queue_capacity == 0 {
            return Err(ConfigurationError::Invalid(
                "pipeline needs at least one worker and a non-empty queue".into(),
            ));
        }
        let (state, _) = watch::channel(PipelineState::Idle);
        Ok(Self {
            sources,
            extractor,
            options,
            state,
        })
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    fn enter(&self, state: PipelineState) {
        info!(?state, "Pipeline state changed");
        self.state.send_replace(state);
    }

    /// Runs all sources to completion and hands every extracted plugin to `sink`.
    pub async fn run<S>(&self, sink: S) -> (PipelineReport, S)
    where
        S: CatalogSink + 'static,
    {
        let (pending_tx, pending_rx) = mpsc::channel::<Plugin>(self.options.queue_capacity);
        let pending_rx = Arc::new(Mutex::new(pending_rx));
        let (results_tx, results_rx) = mpsc::channel::<Plugin>(self.options.queue_capacity);
        let counters = Arc::new(Counters::default());

        self.enter(PipelineState::Sourcing);
        let sink_task = tokio::spawn(drain_results(sink, results_rx));

        let workers: Vec<_> = (0..self.options.workers)
            .map(|worker| {
                tokio::spawn(extraction_worker(
                    worker,
                    Arc::clone(&pending_rx),
                    results_tx.clone(),
                    Arc::clone(&self.extractor),
                    Arc::clone(&counters),
                ))
            })
            .collect();
        drop(results_tx);

        let producers: Vec<_> = self
            .sources
            .iter()
            .map(|(source, transport)| {
                let name = source.name.clone();
                let task = tokio::spawn(import_source(
                    source.clone(),
                    Arc::clone(transport),
                    pending_tx.clone(),
                    Arc::clone(&counters),
                ));
                (name, task)
            })
            .collect();
        drop(pending_tx);

        let mut failed_sources = Vec::new();
        let (names, tasks): (Vec<_>, Vec<_>) = producers.into_iter().unzip();
        for (name, outcome) in names.into_iter().zip(join_all(tasks).await) {
            match outcome {
                Ok(Ok(queued)) => info!(source = %name, plugins = queued, "Finished importing plugin source"),
                Ok(Err(e)) => {
                    error!(source = %name, error = %e, "Failed to import plugin source");
                    failed_sources.push(name);
                }
                Err(e) => {
                    error!(source = %name, error = %e, "Plugin source task aborted");
                    failed_sources.push(name);
                }
            }
        }

        self.enter(PipelineState::Draining);
        for outcome in join_all(workers).await {
            if let Err(e) = outcome {
                error!(error = %e, "Extraction worker aborted");
            }
        }
        self.enter(PipelineState::Done);

        let (sink, sink_errors) = match sink_task.await {
            Ok(drained) => drained,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let report = PipelineReport {
            sources: self.sources.len(),
            failed_sources,
            discovered: counters.discovered.load(Ordering::SeqCst),
            extracted: counters.extracted.load(Ordering::SeqCst),
            dropped: counters.dropped.load(Ordering::SeqCst),
            sink_errors,
        };
        info!(?report, "Pipeline finished");
        (report, sink)
    }
}

async fn import_source(
    source: SourceDescriptor,
    transport: Arc<dyn Transport>,
    pending: mpsc::Sender<Plugin>,
    counters: Arc<Counters>,
) -> Result<usize, ImportError> {
    let repository = Arc::new(Repository::with_transport(source, transport)?);
    repository.acquire().await?;
    let candidates = discover(Arc::clone(&repository))?;
    let name = repository.name().to_owned();

    // the walk is blocking file system work; blocking_send applies the queue's backpressure
    let queued = tokio::task::spawn_blocking(move || {
        let mut queued = 0;
        for plugin in candidates {
            debug!(source = %name, plugin = %plugin.name(), "Adding plugin");
            if pending.blocking_send(plugin).is_err() {
                warn!(source = %name, "Pending queue closed, stopping discovery");
                break;
            }
            counters.discovered.fetch_add(1, Ordering::SeqCst);
            queued += 1;
        }
        queued
    })
    .await?;
    Ok(queued)
}

async fn extraction_worker(
    worker: usize,
    pending: Arc<Mutex<mpsc::Receiver<Plugin>>>,
    results: mpsc::Sender<Plugin>,
    extractor: Arc<Extractor>,
    counters: Arc<Counters>,
) {
    loop {
        let next = pending.lock().await.recv().await;
        let Some(mut plugin) = next else {
            debug!(worker, "Pending queue drained, worker stopping");
            break;
        };
        match extractor.extract(&mut plugin).await {
            Ok(()) => {
                let done = counters.extracted.fetch_add(1, Ordering::SeqCst) + 1;
                let total = counters.discovered.load(Ordering::SeqCst);
                info!(worker, done, total, plugin = %plugin.name(), "Plugin finished");
                if let Some(details) = plugin.details() {
                    match serde_json::to_string(&details) {
                        Ok(json) => debug!(json = %json, plugin = %plugin.name(), "Extracted plugin details"),
                        Err(e) => debug!(error = %e, plugin = %plugin.name(), "Failed to serialise plugin details"),
                    }
                }
                if results.send(plugin).await.is_err() {
                    warn!(worker, "Results queue closed, dropping plugin");
                }
            }
            Err(e) => {
                counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!(worker, plugin = %plugin.name(), error = %e, "Failed to initialize plugin");
            }
        }
    }
}

async fn drain_results<S>(mut sink: S, mut results: mpsc::Receiver<Plugin>) -> (S, usize)
where
    S: CatalogSink,
{
    let mut errors = 0;
    while let Some(plugin) = results.recv().await {
        let name = plugin.name().to_owned();
        if let Err(e) = sink.add(plugin).await {
            errors += 1;
            error!(plugin = %name, error = %e, "Failed to add plugin to catalog sink");
        }
    }
    (sink, errors)
}
