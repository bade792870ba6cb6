//! Status command implementation.

use crate::cli::StatusArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use tabshot_extractor::status_all;

/// Execute the status command.
pub fn execute_status(args: StatusArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let statuses = status_all(&args.root, &config.extractor)?;
    println!("{}", formatter.format_statuses(&statuses)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use std::path::PathBuf;

    #[test]
    fn test_status_on_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = StatusArgs {
            root: dir.path().join("missing"),
        };
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        assert!(execute_status(args, &Config::default(), &formatter).is_err());
    }

    #[test]
    fn test_status_on_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let args = StatusArgs {
            root: PathBuf::from(dir.path()),
        };
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        assert!(execute_status(args, &Config::default(), &formatter).is_ok());
    }
}
