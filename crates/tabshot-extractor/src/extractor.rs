//! Core Extractor implementation

use crate::binding::load_schema_binding;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::ledger::ProgressLedger;
use crate::metadata::MetadataIndex;
use crate::table::{OutputTable, TableOptions};
use crate::tasks::task_name;
use crate::types::{ScreenshotFailure, TaskReport};
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Instant;
use tabshot_domain::{
    ExtractedRecord, OutputRow, SchemaBinding, Screenshot, VisionProvider, VisionRequest,
    BASE_COLUMNS,
};
use tracing::{debug, info, warn};

/// The Extractor turns a task directory of screenshots into rows of its
/// output table, one vision backend call per pending screenshot.
pub struct Extractor<P>
where
    P: VisionProvider,
{
    provider: P,
    config: ExtractorConfig,
}

impl<P> Extractor<P>
where
    P: VisionProvider,
    P::Error: Display,
{
    /// Create a new Extractor
    pub fn new(provider: P, config: ExtractorConfig) -> Self {
        Self { provider, config }
    }

    /// The vision backend in use
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Run one task directory: load its schema binding, metadata index and
    /// progress ledger, then extract every pending screenshot.
    pub fn run_task(&self, task_dir: &Path) -> Result<TaskReport, ExtractorError> {
        let binding = load_schema_binding(&task_dir.join(&self.config.schema_file))?;
        let index = MetadataIndex::load(&task_dir.join(&self.config.metadata_file));
        let ledger = ProgressLedger::load(&task_dir.join(&self.config.output_file));

        self.run(task_dir, &binding, &index, &ledger)
    }

    /// Extract every screenshot of `task_dir` that `already_processed` does
    /// not hold, in filename order.
    ///
    /// Failures confined to one screenshot are logged and the screenshot is
    /// left for the next run. Failing to write the output table stops the task.
    pub fn run(
        &self,
        task_dir: &Path,
        binding: &SchemaBinding,
        index: &MetadataIndex,
        already_processed: &ProgressLedger,
    ) -> Result<TaskReport, ExtractorError> {
        let start_time = Instant::now();
        let task = task_name(task_dir);
        let mut report = TaskReport::new(&task, self.provider.model_name());

        let screenshots = list_screenshots(task_dir)?;
        report.discovered = screenshots.len();

        let mut pending: Vec<String> = screenshots
            .into_iter()
            .filter(|filename| !already_processed.contains(filename))
            .collect();
        report.already_processed = report.discovered - pending.len();

        info!(
            "Task '{}': {} screenshots, {} already processed, {} pending",
            task,
            report.discovered,
            report.already_processed,
            pending.len()
        );

        if pending.is_empty() {
            report.elapsed_ms = start_time.elapsed().as_millis() as u64;
            return Ok(report);
        }

        if let Some(max) = self.config.max_screenshots_per_task {
            if pending.len() > max {
                report.remaining = pending.len() - max;
                pending.truncate(max);
                info!("Task '{}': capped at {} screenshots this run", task, max);
            }
        }

        let field_names = binding.field_names();
        let mut table = OutputTable::open(
            &task_dir.join(&self.config.output_file),
            &BASE_COLUMNS,
            &field_names,
            TableOptions {
                write_bom: self.config.write_bom,
                fsync: self.config.fsync,
            },
        )?;

        let unmapped = table.unmapped_fields(&field_names);
        if !unmapped.is_empty() {
            info!(
                "Task '{}': existing table has no column for {:?}; those values are dropped",
                task, unmapped
            );
        }

        let sentinel_column = binding.sentinel_column();
        let mut consecutive_failures = 0u32;
        let total = pending.len();

        for (idx, filename) in pending.iter().enumerate() {
            debug!("Processing {}/{}: {}", idx + 1, total, filename);

            let records = match self.extract_records(task_dir, filename, binding) {
                Ok(records) => records,
                Err(e) if e.is_screenshot_failure() => {
                    warn!("Task '{}': {} failed: {}", task, filename, e);
                    report.failures.push(ScreenshotFailure {
                        filename: filename.clone(),
                        reason: e.to_string(),
                    });

                    consecutive_failures += 1;
                    let limit = self.config.max_consecutive_failures;
                    if limit > 0 && consecutive_failures >= limit {
                        return Err(ExtractorError::TooManyFailures {
                            task,
                            failures: consecutive_failures,
                        });
                    }

                    if idx + 1 < total {
                        self.cool_down();
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            consecutive_failures = 0;

            let metadata = index.get(filename);
            let rows: Vec<OutputRow> = if records.is_empty() {
                report.empty_results += 1;
                vec![OutputRow::no_data(filename.as_str(), metadata, sentinel_column)]
            } else {
                records
                    .into_iter()
                    .map(|record| OutputRow::new(filename.as_str(), metadata, record))
                    .collect()
            };

            let written = table.append(&rows)?;
            report.processed += 1;
            report.rows_written += written;
            info!("Task '{}': {} -> {} rows", task, filename, written);
        }

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Task '{}' complete: {} processed, {} rows, {} failed",
            task,
            report.processed,
            report.rows_written,
            report.failures.len()
        );

        Ok(report)
    }

    /// Read one screenshot and ask the backend for its records
    fn extract_records(
        &self,
        task_dir: &Path,
        filename: &str,
        binding: &SchemaBinding,
    ) -> Result<Vec<ExtractedRecord>, ExtractorError> {
        let bytes = fs::read(task_dir.join(filename))
            .map_err(|e| ExtractorError::Image(format!("{}: {}", filename, e)))?;
        let screenshot = Screenshot::new(filename, bytes);

        let response = self
            .provider
            .extract(&VisionRequest::new(binding, &screenshot))
            .map_err(|e| ExtractorError::Provider(e.to_string()))?;

        Ok(binding.records_from_response(&response)?)
    }

    fn cool_down(&self) {
        let cooldown = self.config.cooldown();
        if !cooldown.is_zero() {
            debug!("Cooling down for {:?}", cooldown);
            thread::sleep(cooldown);
        }
    }
}

/// Image files directly inside a directory, sorted by filename.
///
/// Names that are not valid UTF-8 are skipped since they cannot be keyed in
/// the output table.
pub fn list_screenshots(dir: &Path) -> Result<Vec<String>, ExtractorError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ExtractorError::Io(format!("failed to list {}: {}", dir.display(), e)))?;

    let mut screenshots = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| ExtractorError::Io(format!("failed to list {}: {}", dir.display(), e)))?;
        if !entry.path().is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            debug!("Skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        if Screenshot::is_image_name(&name) {
            screenshots.push(name);
        }
    }

    screenshots.sort();
    Ok(screenshots)
}
