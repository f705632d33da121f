use anyhow::{Context, Result};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

use crate::aggregate::Ingested;
use crate::article;
use crate::barrier::BarrierGuard;
use crate::error::PipelineError;
use crate::pipeline::PipelineContext;
use crate::report::{self, SummaryReport, SUMMARY_REPORT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Ingest,
    Cleanup,
    Analyze,
    Report,
    Summary,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Ingest,
        Phase::Cleanup,
        Phase::Analyze,
        Phase::Report,
        Phase::Summary,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Ingest => "ingest",
            Phase::Cleanup => "cleanup",
            Phase::Analyze => "analyze",
            Phase::Report => "report",
            Phase::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// One member of the pool. Every worker runs the same phase sequence; the
/// leader flags decide who performs the single-writer phases.
pub struct Worker<'a> {
    id: usize,
    ctx: &'a PipelineContext,
}

impl<'a> Worker<'a> {
    pub fn new(id: usize, ctx: &'a PipelineContext) -> Self {
        Self { id, ctx }
    }

    pub fn run(&self) -> Result<()> {
        // Any early return or panic below breaks the barrier for the peers.
        let guard = BarrierGuard::new(&self.ctx.barrier);

        self.ingest()?;
        self.rendezvous(Phase::Ingest)?;

        if self.ctx.cleanup_leader.try_claim() {
            self.cleanup();
        }
        self.rendezvous(Phase::Cleanup)?;

        self.analyze()?;
        self.rendezvous(Phase::Analyze)?;

        self.emit_reports();
        self.rendezvous(Phase::Report)?;

        if self.ctx.summary_leader.try_claim() {
            self.summarize()?;
            self.ctx.clock.mark(Phase::Summary);
        }

        guard.disarm();
        Ok(())
    }

    fn rendezvous(&self, phase: Phase) -> Result<()> {
        let last = self
            .ctx
            .barrier
            .wait()
            .with_context(|| format!("worker {} waiting after the {} phase", self.id, phase))?;
        if last {
            let elapsed = self.ctx.clock.mark(phase);
            info!(
                action = "complete",
                component = "phase",
                phase = %phase,
                elapsed_ms = elapsed.as_millis(),
                "All workers finished phase"
            );
        }
        Ok(())
    }

    fn ingest(&self) -> Result<()> {
        let mut files = 0usize;
        let mut articles = 0usize;
        let mut duplicate_ids = 0usize;
        let mut duplicate_titles = 0usize;
        while let Some(path) = self.ctx.files.pop() {
            let batch = article::read_batch(&path)?;
            articles += batch.len();
            files += 1;
            for article in batch {
                match self.ctx.aggregate.ingest(article) {
                    Ingested::Accepted => {}
                    Ingested::DuplicateId => duplicate_ids += 1,
                    Ingested::DuplicateTitle => duplicate_titles += 1,
                }
            }
        }
        debug!(
            action = "complete",
            component = "ingest",
            worker = self.id,
            files,
            articles,
            duplicate_ids,
            duplicate_titles,
            "Worker drained file queue"
        );
        Ok(())
    }

    fn cleanup(&self) {
        let start_time = Instant::now();
        let aggregate = &self.ctx.aggregate;

        let flagged = aggregate.pending_duplicates();
        let removed = aggregate.remove_duplicates();
        let snapshot = aggregate.snapshot();
        let surviving = snapshot.len();
        self.ctx.cursor.reset();
        aggregate.clear_duplicates();
        // Only the cleanup leader ever gets here, so the cell is still empty.
        let _ = self.ctx.snapshot.set(snapshot);

        info!(
            action = "complete",
            component = "cleanup",
            worker = self.id,
            flagged,
            removed,
            surviving,
            duration_ms = start_time.elapsed().as_millis(),
            "Removed duplicate articles"
        );
    }

    fn analyze(&self) -> Result<()> {
        let snapshot = self
            .ctx
            .snapshot
            .get()
            .ok_or(PipelineError::MissingPhaseOutput("article snapshot"))?;

        let mut analyzed = 0usize;
        while let Some(index) = self.ctx.cursor.claim(snapshot.len()) {
            self.ctx
                .aggregate
                .analyze(&snapshot[index], &self.ctx.tokenizer);
            analyzed += 1;
        }
        debug!(
            action = "complete",
            component = "analyze",
            worker = self.id,
            analyzed,
            "Worker finished analysis"
        );
        Ok(())
    }

    fn emit_reports(&self) {
        while let Some(task) = self.ctx.tasks.pop() {
            debug!(
                action = "claim",
                component = "report_task",
                worker = self.id,
                task = ?task,
                "Worker claimed report task"
            );
            report::run_task(task, &self.ctx.aggregate, &self.ctx.rankings, &self.ctx.writer);
        }
    }

    fn summarize(&self) -> Result<()> {
        let summary = SummaryReport::from_rankings(&self.ctx.aggregate, &self.ctx.rankings)?;
        self.ctx.writer.write_lines(SUMMARY_REPORT, summary.lines());
        info!(
            action = "complete",
            component = "summary",
            worker = self.id,
            "Summary report produced"
        );
        let _ = self.ctx.summary.set(summary);
        Ok(())
    }
}
