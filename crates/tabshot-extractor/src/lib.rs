//! Tabshot Extractor
//!
//! Resumable screenshot to table extraction.
//!
//! # Overview
//!
//! Every task directory holds screenshots, a `schema.toml` describing the
//! records to pull out of them, an optional crawler `data.json`, and an
//! append-only `results.csv`. The output table doubles as the progress ledger:
//! a screenshot with rows in it is never sent to the backend again, so an
//! interrupted run can simply be started over.
//!
//! # Architecture
//!
//! ```text
//! root/ → Task Iterator → task/ → Extraction Driver → VisionProvider
//!                                        ↓
//!                    Metadata Index → Output Row → Output Table
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tabshot_extractor::{Extractor, ExtractorConfig};
//! use tabshot_llm::OpenAiProvider;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAiProvider::from_env("OPENAI_API_KEY", "gpt-5-mini")?;
//! let extractor = Extractor::new(provider, ExtractorConfig::default());
//!
//! let summary = extractor.run_all(Path::new("screenshots"))?;
//! println!("Rows written: {}", summary.total_rows_written());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod binding;
mod config;
mod error;
mod extractor;
mod ledger;
mod metadata;
mod table;
mod tasks;
mod types;

#[cfg(test)]
mod tests;

pub use binding::{load_schema_binding, parse_schema_binding};
pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::{list_screenshots, Extractor};
pub use ledger::{processed_filenames, ProgressLedger};
pub use metadata::{build_index, local_iso_time, MetadataIndex};
pub use table::{append_rows, expected_header, read_header, OutputTable, TableOptions};
pub use tasks::{discover_tasks, status_all, task_status};
pub use types::{RunSummary, ScreenshotFailure, TaskOutcome, TaskReport, TaskStatus};
