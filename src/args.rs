use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "newsagg",
    about = "Aggregate news article batches into category, language, keyword and summary reports",
    version,
    long_about = None
)]
pub struct Args {
    /// Manifest listing article batch files (first line is a header)
    pub articles: PathBuf,

    /// Manifest listing the languages, categories and forbidden words files
    pub inputs: PathBuf,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Directory the report files are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Keep the first article of a repeated id or title instead of dropping every copy
    #[arg(long)]
    pub keep_first: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not print the run summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            let cpu_count = num_cpus::get();
            std::cmp::min(cpu_count, 8)
        })
    }
}
