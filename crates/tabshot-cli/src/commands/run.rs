//! Run command implementation.

use crate::cli::RunArgs;
use crate::commands::build_extractor;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use tabshot_extractor::TaskOutcome;
use tracing::info;

/// Execute the run command.
pub fn execute_run(args: RunArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    if !args.root.is_dir() {
        return Err(CliError::InvalidInput(format!(
            "{} is not a directory",
            args.root.display()
        )));
    }

    let extractor = build_extractor(config, args.limit)?;
    info!("Running tasks under {}", args.root.display());
    let summary = extractor.run_all(&args.root)?;

    println!("{}", formatter.format_summary(&summary)?);

    let failed = summary
        .outcomes
        .iter()
        .filter(|o| matches!(o, TaskOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        return Err(CliError::TasksFailed(failed));
    }

    if !formatter.is_quiet() {
        println!(
            "{}",
            formatter.success(&format!(
                "{} screenshot(s) processed, {} row(s) written",
                summary.total_processed(),
                summary.total_rows_written()
            ))
        );
    }
    Ok(())
}
