use anyhow::Result;
use clap::Parser;
use newsagg::{print_run_summary, utils, Args};
use tracing::error;

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    match newsagg::run(&args) {
        Ok(summary) => {
            if !args.quiet {
                print_run_summary(&summary);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = ?e, "Aggregation failed");
            std::process::exit(1);
        }
    }
}
