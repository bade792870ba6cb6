//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};
use tabshot_domain::SchemaBinding;
use tabshot_extractor::{RunSummary, TaskOutcome, TaskReport, TaskStatus};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the outcome of a run over a root directory.
    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
            OutputFormat::Table => Ok(self.format_outcomes_table(&summary.outcomes)),
            OutputFormat::Quiet => Ok(format!(
                "{} {} {}",
                summary.total_processed(),
                summary.total_rows_written(),
                summary.total_failures()
            )),
        }
    }

    /// Format the report of a single task.
    pub fn format_report(&self, report: &TaskReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Table => {
                let mut output =
                    self.format_outcomes_table(&[TaskOutcome::Completed(report.clone())]);
                for failure in &report.failures {
                    output.push('\n');
                    output.push_str(
                        &self.warning(&format!("{}: {}", failure.filename, failure.reason)),
                    );
                }
                Ok(output)
            }
            OutputFormat::Quiet => Ok(format!(
                "{} {} {}",
                report.processed,
                report.rows_written,
                report.failures.len()
            )),
        }
    }

    /// Format task progress.
    pub fn format_statuses(&self, statuses: &[TaskStatus]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(statuses)?),
            OutputFormat::Table => {
                if statuses.is_empty() {
                    return Ok(self.colorize("No task directories found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Task", "Schema", "Images", "Processed", "Pending"]);
                for status in statuses {
                    builder.push_record([
                        status.task.clone(),
                        if status.has_schema { "ok" } else { "missing" }.to_string(),
                        status.images.to_string(),
                        status.processed.to_string(),
                        status.pending.to_string(),
                    ]);
                }
                Ok(self.render(builder))
            }
            OutputFormat::Quiet => Ok(statuses
                .iter()
                .filter(|s| s.has_schema && s.pending > 0)
                .map(|s| format!("{}\t{}", s.task, s.pending))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    /// Format a schema binding.
    pub fn format_schema(&self, binding: &SchemaBinding) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(
                &binding.response_json_schema(),
            )?),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Type", "Optional", "Description"]);
                for field in &binding.fields {
                    builder.push_record([
                        field.name.clone(),
                        field.field_type.json_type().to_string(),
                        if field.optional { "yes" } else { "no" }.to_string(),
                        field.description.clone().unwrap_or_default(),
                    ]);
                }

                let shape = if binding.single_item {
                    "single record"
                } else {
                    "list of records"
                };
                Ok(format!(
                    "{}\n{}",
                    self.render(builder),
                    self.info(&format!(
                        "'{}' holds a {}; empty screenshots are marked in '{}'",
                        binding.list_field,
                        shape,
                        binding.sentinel_column()
                    ))
                ))
            }
            OutputFormat::Quiet => Ok(binding.field_names().join(",")),
        }
    }

    fn format_outcomes_table(&self, outcomes: &[TaskOutcome]) -> String {
        if outcomes.is_empty() {
            return self.colorize("No tasks found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record([
            "Task", "Status", "Images", "Skipped", "Processed", "Rows", "Empty", "Failed", "Pending",
        ]);

        let mut notes = Vec::new();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(report) => {
                    builder.push_record([
                        report.task.clone(),
                        "completed".to_string(),
                        report.discovered.to_string(),
                        report.already_processed.to_string(),
                        report.processed.to_string(),
                        report.rows_written.to_string(),
                        report.empty_results.to_string(),
                        report.failures.len().to_string(),
                        report.pending().to_string(),
                    ]);
                }
                TaskOutcome::Failed { task, error } => {
                    builder.push_record(status_only_row(task, "failed"));
                    notes.push(self.error(&format!("{}: {}", task, error)));
                }
                TaskOutcome::Skipped { task, reason } => {
                    builder.push_record(status_only_row(task, "skipped"));
                    notes.push(self.warning(&format!("{}: {}", task, reason)));
                }
            }
        }

        let mut output = self.render(builder);
        for note in notes {
            output.push('\n');
            output.push_str(&note);
        }
        output
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Whether plain status lines should be printed.
    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn status_only_row(task: &str, status: &str) -> [String; 9] {
    let mut row: [String; 9] = Default::default();
    row[0] = task.to_string();
    row[1] = status.to_string();
    for cell in row.iter_mut().skip(2) {
        *cell = "-".to_string();
    }
    row
}
