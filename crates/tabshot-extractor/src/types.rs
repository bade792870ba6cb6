//! Report types for extraction runs

use serde::{Deserialize, Serialize};

/// A screenshot that could not be processed this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotFailure {
    /// Screenshot filename
    pub filename: String,

    /// Reason for failure
    pub reason: String,
}

/// Outcome of running one task directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Task directory name
    pub task: String,

    /// Name of the vision model used
    pub model_name: String,

    /// Image files found in the directory
    pub discovered: usize,

    /// Images skipped because the output table already holds them
    pub already_processed: usize,

    /// Images whose rows were written this run
    pub processed: usize,

    /// Processed images for which the backend found no records
    pub empty_results: usize,

    /// Rows appended to the output table
    pub rows_written: usize,

    /// Images that failed and will be retried on the next run
    pub failures: Vec<ScreenshotFailure>,

    /// Pending images left untouched because of the per-task cap
    pub remaining: usize,

    /// Processing time in milliseconds
    pub elapsed_ms: u64,
}

impl TaskReport {
    /// Create an empty report for a task
    pub fn new(task: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Images still pending after this run (failures plus capped leftovers)
    pub fn pending(&self) -> usize {
        self.failures.len() + self.remaining
    }

    /// Whether every discovered image is now in the output table
    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }
}

/// Result of one task within a run over a root directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task ran to the end of its screenshot list
    Completed(TaskReport),

    /// The task stopped early
    Failed {
        /// Task directory name
        task: String,
        /// Why the task stopped
        error: String,
    },

    /// The task was not attempted
    Skipped {
        /// Task directory name
        task: String,
        /// Why it was skipped
        reason: String,
    },
}

impl TaskOutcome {
    /// Task directory name
    pub fn task(&self) -> &str {
        match self {
            TaskOutcome::Completed(report) => &report.task,
            TaskOutcome::Failed { task, .. } | TaskOutcome::Skipped { task, .. } => task,
        }
    }

    /// Report for a completed task
    pub fn report(&self) -> Option<&TaskReport> {
        match self {
            TaskOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Outcomes of every task under a root directory, in task order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// One entry per task directory considered
    pub outcomes: Vec<TaskOutcome>,
}

impl RunSummary {
    /// Completed task reports
    pub fn reports(&self) -> impl Iterator<Item = &TaskReport> {
        self.outcomes.iter().filter_map(TaskOutcome::report)
    }

    /// Rows appended across all tasks
    pub fn total_rows_written(&self) -> usize {
        self.reports().map(|r| r.rows_written).sum()
    }

    /// Screenshots processed across all tasks
    pub fn total_processed(&self) -> usize {
        self.reports().map(|r| r.processed).sum()
    }

    /// Screenshot failures across all tasks
    pub fn total_failures(&self) -> usize {
        self.reports().map(|r| r.failures.len()).sum()
    }

    /// Whether any task stopped early
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, TaskOutcome::Failed { .. }))
    }
}

/// Progress of a task directory, computed without calling the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task directory name
    pub task: String,

    /// Whether a loadable schema binding is present
    pub has_schema: bool,

    /// Image files found in the directory
    pub images: usize,

    /// Images already in the output table
    pub processed: usize,

    /// Images still to process
    pub pending: usize,
}
