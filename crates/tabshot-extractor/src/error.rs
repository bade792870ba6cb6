//! Error types for the Extractor

use tabshot_domain::SchemaError;
use thiserror::Error;

/// Errors that can occur while running extraction tasks
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Task has no loadable schema binding
    #[error("Schema unavailable: {0}")]
    Schema(String),

    /// Screenshot could not be read
    #[error("Image error: {0}")]
    Image(String),

    /// Vision backend call failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Backend answered with a response that does not match the binding
    #[error("Non-conforming response: {0}")]
    NonConforming(String),

    /// Output table could not be opened or appended to
    #[error("Write error: {0}")]
    Write(String),

    /// Task or root directory could not be listed
    #[error("I/O error: {0}")]
    Io(String),

    /// Metadata document missing or unparsable
    #[error("Metadata unavailable: {0}")]
    Metadata(String),

    /// Existing output table could not be read
    #[error("Progress unreadable: {0}")]
    Progress(String),

    /// Task aborted after too many consecutive screenshot failures
    #[error("Task '{task}' aborted after {failures} consecutive failures")]
    TooManyFailures {
        /// Task name
        task: String,
        /// Consecutive failures observed
        failures: u32,
    },
}

impl ExtractorError {
    /// Whether the error is confined to a single screenshot. Such failures
    /// leave the screenshot unprocessed and the task continues.
    pub fn is_screenshot_failure(&self) -> bool {
        matches!(
            self,
            ExtractorError::Image(_) | ExtractorError::Provider(_) | ExtractorError::NonConforming(_)
        )
    }
}

impl From<SchemaError> for ExtractorError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::InvalidBinding(msg) => ExtractorError::Schema(msg),
            SchemaError::NonConforming(msg) => ExtractorError::NonConforming(msg),
        }
    }
}

impl From<csv::Error> for ExtractorError {
    fn from(e: csv::Error) -> Self {
        ExtractorError::Write(e.to_string())
    }
}
