//! Command implementations.

pub mod run;
pub mod schema;
pub mod status;
pub mod task;

pub use self::run::execute_run;
pub use self::schema::execute_schema;
pub use self::status::execute_status;
pub use self::task::execute_task;

use crate::config::Config;
use crate::error::Result;
use tabshot_extractor::{Extractor, ExtractorConfig};
use tabshot_llm::OpenAiProvider;

/// Build an extractor from the configuration, applying a per-task cap
/// given on the command line.
pub(crate) fn build_extractor(
    config: &Config,
    limit: Option<usize>,
) -> Result<Extractor<OpenAiProvider>> {
    let provider = config.provider.build()?;
    Ok(Extractor::new(provider, extractor_config(config, limit)?))
}

fn extractor_config(config: &Config, limit: Option<usize>) -> Result<ExtractorConfig> {
    let mut extractor = config.extractor.clone();
    if limit.is_some() {
        extractor.max_screenshots_per_task = limit;
    }
    extractor.validate().map_err(crate::error::CliError::InvalidInput)?;
    Ok(extractor)
}
