//! The barrier-phased worker pool.
//!
//! ```text
//! ingest ─▶ barrier ─▶ cleanup (leader) ─▶ barrier ─▶ analyze ─▶ barrier
//!        ─▶ report tasks ─▶ barrier ─▶ summary (leader)
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ScopedJoinHandle};
use tracing::{error, info};

use crate::aggregate::{Aggregate, DuplicatePolicy};
use crate::analyze::Tokenizer;
use crate::article::Article;
use crate::barrier::PhaseBarrier;
use crate::error::PipelineError;
use crate::manifest::{self, RunConfig};
use crate::report::{Rankings, ReportTask, ReportWriter, SummaryReport};
use crate::stats::{PhaseClock, RunSummary};
use crate::sync::{AtomicCursor, LeaderFlag, WorkQueue};
use crate::worker::Worker;
use crate::Args;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub workers: usize,
    pub output_dir: PathBuf,
    pub policy: DuplicatePolicy,
}

impl PipelineOptions {
    pub fn from_args(args: &Args) -> Self {
        Self {
            workers: args.worker_count(),
            output_dir: args.output_dir.clone(),
            policy: if args.keep_first {
                DuplicatePolicy::KeepFirst
            } else {
                DuplicatePolicy::DropAll
            },
        }
    }
}

/// State shared by every worker for the length of one run.
pub struct PipelineContext {
    pub aggregate: Aggregate,
    pub files: WorkQueue<PathBuf>,
    pub tasks: WorkQueue<ReportTask>,
    pub barrier: PhaseBarrier,
    pub cleanup_leader: LeaderFlag,
    pub summary_leader: LeaderFlag,
    pub snapshot: OnceLock<Vec<Arc<Article>>>,
    pub cursor: AtomicCursor,
    pub rankings: Rankings,
    pub writer: ReportWriter,
    pub tokenizer: Tokenizer,
    pub clock: PhaseClock,
    pub summary: OnceLock<SummaryReport>,
}

impl PipelineContext {
    pub fn new(config: &RunConfig, options: &PipelineOptions) -> Result<Self> {
        Ok(Self {
            aggregate: Aggregate::new(config, options.policy),
            files: config.batches.iter().cloned().collect(),
            tasks: ReportTask::ALL.into_iter().collect(),
            barrier: PhaseBarrier::new(options.workers),
            cleanup_leader: LeaderFlag::new(),
            summary_leader: LeaderFlag::new(),
            snapshot: OnceLock::new(),
            cursor: AtomicCursor::new(),
            rankings: Rankings::default(),
            writer: ReportWriter::new(&options.output_dir),
            tokenizer: Tokenizer::new()?,
            clock: PhaseClock::start(),
            summary: OnceLock::new(),
        })
    }
}

/// Load both manifests and run the pool as configured on the command line.
pub fn run(args: &Args) -> Result<RunSummary> {
    let config = manifest::load_run_config(&args.articles, &args.inputs)?;
    execute(&config, &PipelineOptions::from_args(args))
}

/// Run every phase over an already loaded configuration.
pub fn execute(config: &RunConfig, options: &PipelineOptions) -> Result<RunSummary> {
    if options.workers == 0 {
        return Err(PipelineError::InvalidWorkerCount.into());
    }
    fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", options.output_dir))?;

    let ctx = PipelineContext::new(config, options)?;
    info!(
        action = "start",
        component = "pipeline",
        worker_count = options.workers,
        batch_count = config.batches.len(),
        output_dir = ?options.output_dir,
        "Starting aggregation"
    );

    thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(options.workers);
        for id in 0..options.workers {
            let worker = Worker::new(id, &ctx);
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn_scoped(scope, move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // The barrier expects every party; release whoever already started.
                    ctx.barrier.break_barrier();
                    let _ = join_workers(handles);
                    return Err(e).context("Failed to spawn worker thread");
                }
            }
        }
        join_workers(handles)
    })?;

    let report = ctx
        .summary
        .get()
        .cloned()
        .ok_or(PipelineError::MissingPhaseOutput("summary report"))?;
    let summary = RunSummary {
        workers: options.workers,
        batches: config.batches.len(),
        total_seen: ctx.aggregate.total_seen(),
        files_written: ctx.writer.files_written(),
        phase_durations: ctx.clock.durations(),
        total_time: ctx.clock.elapsed(),
        report,
    };
    info!(
        action = "complete",
        component = "pipeline",
        total_seen = summary.total_seen,
        unique_articles = summary.report.unique_articles,
        files_written = summary.files_written,
        duration_ms = summary.total_time.as_millis(),
        "Aggregation completed"
    );
    Ok(summary)
}

fn is_broken_barrier(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::BarrierBroken)
    )
}

// Join every worker. A worker's own failure is reported in preference to the
// broken-barrier errors it caused in its peers.
fn join_workers(handles: Vec<ScopedJoinHandle<'_, Result<()>>>) -> Result<()> {
    let mut failures = Vec::new();
    for (id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(e),
            Err(_) => failures.push(PipelineError::WorkerPanicked { worker: id }.into()),
        }
    }

    for failure in &failures {
        error!(action = "failed", component = "worker", error = ?failure, "Worker failed");
    }

    match failures.iter().position(|e| !is_broken_barrier(e)) {
        Some(root) => Err(failures.swap_remove(root)),
        None => failures.into_iter().next().map_or(Ok(()), Err),
    }
}
