//! Schema command implementation.

use crate::cli::SchemaArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use tabshot_extractor::load_schema_binding;

/// Execute the schema command.
pub fn execute_schema(args: SchemaArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let path = args.dir.join(&config.extractor.schema_file);
    let binding = load_schema_binding(&path)?;
    println!("{}", formatter.format_schema(&binding)?);
    Ok(())
}
