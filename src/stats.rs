use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::report::SummaryReport;
use crate::utils::format_number;
use crate::worker::Phase;

/// Records when each phase ended, measured from the start of the run.
#[derive(Debug)]
pub struct PhaseClock {
    started: Instant,
    ends: [OnceLock<Duration>; 5],
}

impl PhaseClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            ends: Default::default(),
        }
    }

    /// Stamp the end of `phase`; the first stamp wins. Returns the elapsed time.
    pub fn mark(&self, phase: Phase) -> Duration {
        *self.ends[phase.index()].get_or_init(|| self.started.elapsed())
    }

    /// Time spent in each completed phase.
    pub fn durations(&self) -> Vec<(Phase, Duration)> {
        let mut previous = Duration::ZERO;
        Phase::ALL
            .iter()
            .filter_map(|&phase| {
                let end = *self.ends[phase.index()].get()?;
                let spent = end.saturating_sub(previous);
                previous = end;
                Some((phase, spent))
            })
            .collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub workers: usize,
    pub batches: usize,
    pub total_seen: usize,
    pub files_written: usize,
    pub phase_durations: Vec<(Phase, Duration)>,
    pub total_time: Duration,
    pub report: SummaryReport,
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("\n--- Aggregation Summary ---");
    println!(
        "Workers: {}, batch files: {}",
        summary.workers,
        format_number(summary.batches)
    );
    println!("Articles read: {}", format_number(summary.total_seen));
    println!(
        "Unique articles: {}",
        format_number(summary.report.unique_articles)
    );
    println!(
        "Duplicates removed: {}",
        format_number(summary.report.duplicates_found)
    );
    println!("Report files written: {}", summary.files_written);

    println!("\nPhase timings:");
    for (phase, spent) in &summary.phase_durations {
        println!("- {}: {:.1}ms", phase, spent.as_secs_f64() * 1000.0);
    }
    println!(
        "Total: {:.1}ms",
        summary.total_time.as_secs_f64() * 1000.0
    );

    println!();
    for line in summary.report.lines() {
        println!("{line}");
    }
}
