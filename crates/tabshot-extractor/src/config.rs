//! Configuration for the Extractor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Schema binding file inside each task directory
    pub schema_file: String,

    /// Crawler metadata document inside each task directory
    pub metadata_file: String,

    /// Output table inside each task directory
    pub output_file: String,

    /// Pause after a failed screenshot (milliseconds)
    pub cooldown_ms: u64,

    /// Abort a task after this many failures in a row (0 = never)
    pub max_consecutive_failures: u32,

    /// Cap on backend calls per task per run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_screenshots_per_task: Option<usize>,

    /// Prefix newly created output tables with a UTF-8 BOM
    pub write_bom: bool,

    /// `fsync` the output table after each screenshot's rows
    pub fsync: bool,
}

impl ExtractorConfig {
    /// Get the failure cooldown as a Duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("schema_file", &self.schema_file),
            ("metadata_file", &self.metadata_file),
            ("output_file", &self.output_file),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }
        if self.schema_file == self.output_file || self.metadata_file == self.output_file {
            return Err("output_file must differ from schema_file and metadata_file".to_string());
        }
        if self.max_screenshots_per_task == Some(0) {
            return Err("max_screenshots_per_task must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration: 1 second cooldown, abort after 10 failures in a row
    fn default() -> Self {
        Self {
            schema_file: "schema.toml".to_string(),
            metadata_file: "data.json".to_string(),
            output_file: "results.csv".to_string(),
            cooldown_ms: 1_000,
            max_consecutive_failures: 10,
            max_screenshots_per_task: None,
            write_bom: true,
            fsync: false,
        }
    }
}

impl ExtractorConfig {
    /// Strict preset: give up on a task quickly and sync every write
    pub fn strict() -> Self {
        Self {
            max_consecutive_failures: 3,
            fsync: true,
            ..Self::default()
        }
    }

    /// Patient preset: longer cooldown, never abort a task
    pub fn patient() -> Self {
        Self {
            cooldown_ms: 5_000,
            max_consecutive_failures: 0,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
