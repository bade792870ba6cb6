//! Progress Ledger - which screenshots a task has already processed
//!
//! The output table is the ledger: a screenshot counts as processed once a
//! complete row carrying its filename has been appended. Nothing else is
//! persisted.

use crate::error::ExtractorError;
use crate::table::{complete_len, UTF8_BOM};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Filenames present in a task's output table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressLedger {
    processed: HashSet<String>,
}

impl ProgressLedger {
    /// Load the ledger from an output table.
    ///
    /// A missing table is an empty ledger. An unreadable table is also treated
    /// as empty, with a warning, so the task reprocesses from scratch.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(ledger) => {
                debug!(path = %path.display(), processed = ledger.len(), "Loaded progress ledger");
                ledger
            }
            Err(e) => {
                warn!(path = %path.display(), "{}; treating every screenshot as pending", e);
                Self::default()
            }
        }
    }

    /// Load the ledger, reporting why the table cannot be read.
    ///
    /// Rows cut short by an interrupted write do not count, nor do the rows
    /// of the screenshot they belong to.
    pub fn read(path: &Path) -> Result<Self, ExtractorError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ExtractorError::Progress(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let progress_err =
            |e: csv::Error| ExtractorError::Progress(format!("{}: {}", path.display(), e));

        let complete = &data[..complete_len(&data).map_err(progress_err)?];
        let body = complete.strip_prefix(UTF8_BOM).unwrap_or(complete);

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body);

        let mut processed = HashSet::new();
        for record in csv_reader.byte_records() {
            let record = record.map_err(progress_err)?;
            let Some(filename) = record.get(0) else {
                continue;
            };
            let filename = String::from_utf8_lossy(filename);
            if !filename.is_empty() {
                processed.insert(filename.into_owned());
            }
        }

        Ok(Self { processed })
    }

    /// Whether a screenshot already has rows in the table
    pub fn contains(&self, filename: &str) -> bool {
        self.processed.contains(filename)
    }

    /// Record a screenshot as processed
    pub fn insert(&mut self, filename: impl Into<String>) -> bool {
        self.processed.insert(filename.into())
    }

    /// Number of processed screenshots
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    /// Whether nothing has been processed yet
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Consume the ledger into its filename set
    pub fn into_set(self) -> HashSet<String> {
        self.processed
    }
}

/// Set of screenshot filenames already present in an output table
pub fn processed_filenames(path: &Path) -> HashSet<String> {
    ProgressLedger::load(path).into_set()
}
