//! Task Iterator - runs every task directory under a root

use crate::binding::load_schema_binding;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::extractor::{list_screenshots, Extractor};
use crate::ledger::ProgressLedger;
use crate::types::{RunSummary, TaskOutcome, TaskStatus};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tabshot_domain::VisionProvider;
use tracing::{debug, error, info, warn};

/// Display name of a task directory
pub(crate) fn task_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Immediate, non-hidden subdirectories of `root`, sorted by name
pub fn discover_tasks(root: &Path) -> Result<Vec<PathBuf>, ExtractorError> {
    let entries = fs::read_dir(root)
        .map_err(|e| ExtractorError::Io(format!("failed to list {}: {}", root.display(), e)))?;

    let mut tasks = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| ExtractorError::Io(format!("failed to list {}: {}", root.display(), e)))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            debug!("Skipping hidden directory {}", path.display());
            continue;
        }
        tasks.push(path);
    }

    tasks.sort();
    Ok(tasks)
}

/// Progress of one task directory, without calling the backend
pub fn task_status(dir: &Path, config: &ExtractorConfig) -> Result<TaskStatus, ExtractorError> {
    let has_schema = load_schema_binding(&dir.join(&config.schema_file)).is_ok();
    let screenshots = list_screenshots(dir)?;
    let ledger = ProgressLedger::load(&dir.join(&config.output_file));

    let processed = screenshots
        .iter()
        .filter(|filename| ledger.contains(filename))
        .count();

    Ok(TaskStatus {
        task: task_name(dir),
        has_schema,
        images: screenshots.len(),
        processed,
        pending: screenshots.len() - processed,
    })
}

/// Progress of every task directory under `root`
pub fn status_all(root: &Path, config: &ExtractorConfig) -> Result<Vec<TaskStatus>, ExtractorError> {
    discover_tasks(root)?
        .iter()
        .map(|dir| task_status(dir, config))
        .collect()
}

impl<P> Extractor<P>
where
    P: VisionProvider,
    P::Error: Display,
{
    /// Run every task directory under `root`.
    ///
    /// Directories without a schema file are ignored. A task whose binding
    /// cannot be loaded is skipped, and a task that stops early is recorded
    /// as failed; neither affects the remaining tasks.
    pub fn run_all(&self, root: &Path) -> Result<RunSummary, ExtractorError> {
        let tasks = discover_tasks(root)?;
        info!("Found {} task directories under {}", tasks.len(), root.display());

        let mut summary = RunSummary::default();
        for dir in tasks {
            let task = task_name(&dir);
            if !dir.join(&self.config().schema_file).is_file() {
                debug!("Skipping '{}': no {}", task, self.config().schema_file);
                continue;
            }

            let outcome = match self.run_task(&dir) {
                Ok(report) => TaskOutcome::Completed(report),
                Err(ExtractorError::Schema(reason)) => {
                    warn!("Skipping '{}': {}", task, reason);
                    TaskOutcome::Skipped { task, reason }
                }
                Err(e) => {
                    error!("Task '{}' stopped: {}", task, e);
                    TaskOutcome::Failed {
                        task,
                        error: e.to_string(),
                    }
                }
            };
            summary.outcomes.push(outcome);
        }

        info!(
            "Run complete: {} tasks, {} screenshots processed, {} rows written, {} failures",
            summary.outcomes.len(),
            summary.total_processed(),
            summary.total_rows_written(),
            summary.total_failures()
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_tasks_skips_hidden_and_files() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("b_task")).unwrap();
        fs::create_dir(root.path().join("a_task")).unwrap();
        fs::create_dir(root.path().join(".cache")).unwrap();
        fs::write(root.path().join("readme.txt"), "x").unwrap();

        let names: Vec<String> = discover_tasks(root.path())
            .unwrap()
            .iter()
            .map(|p| task_name(p))
            .collect();
        assert_eq!(names, vec!["a_task", "b_task"]);
    }

    #[test]
    fn test_discover_tasks_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_tasks(&root.path().join("nope")),
            Err(ExtractorError::Io(_))
        ));
    }

    #[test]
    fn test_task_status_counts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1_a.jpg", "2_b.jpg", "3_c.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::write(dir.path().join("results.csv"), "filename,title\n1_a.jpg,x\n").unwrap();

        let status = task_status(dir.path(), &ExtractorConfig::default()).unwrap();
        assert!(!status.has_schema);
        assert_eq!(status.images, 3);
        assert_eq!(status.processed, 1);
        assert_eq!(status.pending, 2);
    }
}
