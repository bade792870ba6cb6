//! Metadata Index - screenshot filename to side-channel attributes
//!
//! Built fresh on every run from the crawler's aggregated `data.json`:
//!
//! ```json
//! { "content": [ { "timestamp": 1700000000000, "id": "42",
//!                  "participant": { "id": "p1", "device_model": "Pixel" } } ] }
//! ```

use crate::error::ExtractorError;
use chrono::{Local, TimeZone};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tabshot_domain::{MetadataRecord, INVALID_TIMESTAMP};
use tracing::{debug, info, warn};

/// Lookup from screenshot filename to its metadata
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    records: HashMap<String, MetadataRecord>,
}

impl MetadataIndex {
    /// Load the index from a metadata document.
    ///
    /// Never fails: a missing or unparsable document yields an empty index
    /// and a warning.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(index) => {
                info!(
                    path = %path.display(),
                    records = index.len(),
                    "Loaded metadata index"
                );
                index
            }
            Err(e) => {
                warn!(path = %path.display(), "{}; continuing without metadata", e);
                Self::default()
            }
        }
    }

    /// Load the index, reporting why the document is unavailable
    pub fn read(path: &Path) -> Result<Self, ExtractorError> {
        if !path.exists() {
            return Err(ExtractorError::Metadata(format!(
                "{} not found",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            ExtractorError::Metadata(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse the index from document text
    pub fn from_json_str(contents: &str) -> Result<Self, ExtractorError> {
        let document: Value = serde_json::from_str(contents)
            .map_err(|e| ExtractorError::Metadata(format!("invalid JSON: {}", e)))?;
        Ok(build_index(&document))
    }

    /// Metadata for a screenshot, if the crawler recorded it
    pub fn get(&self, filename: &str) -> Option<&MetadataRecord> {
        self.records.get(filename)
    }

    /// Number of indexed screenshots
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Build the index from a parsed metadata document.
///
/// Elements without a `timestamp` or `id` are skipped since no filename can
/// be derived for them.
pub fn build_index(document: &Value) -> MetadataIndex {
    let Some(content) = document.get("content").and_then(Value::as_array) else {
        warn!("Metadata document has no 'content' list");
        return MetadataIndex::default();
    };

    let mut records = HashMap::with_capacity(content.len());
    for (idx, item) in content.iter().enumerate() {
        if !item.is_object() {
            debug!("Skipping metadata entry {}: not an object", idx);
            continue;
        }
        let (Some(timestamp), Some(id)) = (non_null(item, "timestamp"), non_null(item, "id"))
        else {
            debug!("Skipping metadata entry {}: missing timestamp or id", idx);
            continue;
        };

        let filename = format!("{}_{}.jpg", plain_text(timestamp), plain_text(id));
        let participant = item.get("participant").filter(|p| p.is_object());
        let attribute = |key: &str| {
            participant
                .and_then(|p| p.get(key))
                .and_then(plain_text_opt)
        };

        let time = local_iso_time(timestamp).unwrap_or_else(|| {
            warn!("Invalid timestamp {} for {}", timestamp, filename);
            INVALID_TIMESTAMP.to_string()
        });

        records.insert(
            filename,
            MetadataRecord {
                time: Some(time),
                participant_id: attribute("id"),
                device_model: attribute("device_model"),
                android_version: attribute("android_version"),
                screen_width: attribute("screen_width"),
                screen_height: attribute("screen_height"),
            },
        );
    }

    MetadataIndex { records }
}

/// Convert a millisecond epoch timestamp into local ISO-8601 text.
///
/// Fractional seconds are only printed when non-zero.
pub fn local_iso_time(timestamp: &Value) -> Option<String> {
    let millis = match timestamp {
        Value::Number(n) => match n.as_i64() {
            Some(ms) => ms,
            None => float_millis(n.as_f64()?)?,
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(ms) => ms,
                Err(_) => float_millis(s.parse::<f64>().ok()?)?,
            }
        }
        _ => return None,
    };

    let local = Local.timestamp_millis_opt(millis).single()?;
    Some(local.naive_local().format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn float_millis(value: f64) -> Option<i64> {
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(value.round() as i64)
}

fn non_null<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    item.get(key).filter(|v| !v.is_null())
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn plain_text_opt(value: &Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(plain_text(value))
    }
}
