//! Task command implementation.

use crate::cli::TaskArgs;
use crate::commands::build_extractor;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;

/// Execute the task command.
pub fn execute_task(args: TaskArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(CliError::InvalidInput(format!(
            "{} is not a directory",
            args.dir.display()
        )));
    }

    let extractor = build_extractor(config, args.limit)?;
    let report = extractor.run_task(&args.dir)?;

    println!("{}", formatter.format_report(&report)?);
    Ok(())
}
