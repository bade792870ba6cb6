//! Record module - extracted values, screenshot metadata and output rows

use std::fmt;

/// Column holding the screenshot filename. Always the first base column.
pub const FILENAME_COLUMN: &str = "filename";

/// Base columns every new output table starts with, in this order.
pub const BASE_COLUMNS: [&str; 7] = [
    FILENAME_COLUMN,
    "time",
    "participant_id",
    "device_model",
    "android_version",
    "screen_width",
    "screen_height",
];

/// Written into the sentinel column when a screenshot yielded no records.
pub const NO_DATA_SENTINEL: &str = "NO_DATA_FOUND";

/// Written into `time` when a metadata timestamp cannot be converted.
pub const INVALID_TIMESTAMP: &str = "INVALID_TIMESTAMP";

/// A single typed value extracted from a screenshot
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent or explicitly null
    Null,
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Free text
    Text(String),
    /// True/false flag
    Boolean(bool),
}

impl FieldValue {
    /// Whether this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Cell text for this value; `None` for null
    pub fn to_cell(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// One structured record returned by the vision backend for a screenshot.
///
/// Fields keep the declaration order of the schema binding that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecord {
    fields: Vec<(String, FieldValue)>,
}

impl ExtractedRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate over `(name, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Side-channel attributes of one screenshot, keyed by its filename in the
/// metadata index. Every attribute may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Local ISO-8601 capture time, or [`INVALID_TIMESTAMP`]
    pub time: Option<String>,
    /// Participant identifier
    pub participant_id: Option<String>,
    /// Device model
    pub device_model: Option<String>,
    /// Android OS version
    pub android_version: Option<String>,
    /// Screen width in pixels
    pub screen_width: Option<String>,
    /// Screen height in pixels
    pub screen_height: Option<String>,
}

impl MetadataRecord {
    /// Value of a base metadata column (everything in [`BASE_COLUMNS`] except
    /// the filename). Unknown columns yield `None`.
    pub fn column(&self, name: &str) -> Option<&str> {
        let value = match name {
            "time" => &self.time,
            "participant_id" => &self.participant_id,
            "device_model" => &self.device_model,
            "android_version" => &self.android_version,
            "screen_width" => &self.screen_width,
            "screen_height" => &self.screen_height,
            _ => return None,
        };
        value.as_deref()
    }
}

/// The join of one extracted record with its screenshot's filename and
/// metadata. Rendered positionally against an output table header.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    /// Screenshot filename, always the ledger key
    pub filename: String,
    /// Metadata looked up for the filename (all `None` when unknown)
    pub metadata: MetadataRecord,
    /// Extracted fields
    pub record: ExtractedRecord,
}

impl OutputRow {
    /// Join a record with its screenshot's metadata
    pub fn new(
        filename: impl Into<String>,
        metadata: Option<&MetadataRecord>,
        record: ExtractedRecord,
    ) -> Self {
        Self {
            filename: filename.into(),
            metadata: metadata.cloned().unwrap_or_default(),
            record,
        }
    }

    /// Metadata-only row marking a screenshot that yielded no records
    pub fn no_data(
        filename: impl Into<String>,
        metadata: Option<&MetadataRecord>,
        sentinel_column: &str,
    ) -> Self {
        let record = ExtractedRecord::new()
            .with(sentinel_column, FieldValue::Text(NO_DATA_SENTINEL.to_string()));
        Self::new(filename, metadata, record)
    }

    /// Cell text for a column. Extracted fields win over metadata columns of
    /// the same name; the filename column is never overridden.
    pub fn value(&self, column: &str) -> Option<String> {
        if column == FILENAME_COLUMN {
            return Some(self.filename.clone());
        }
        if let Some(value) = self.record.get(column) {
            return value.to_cell();
        }
        self.metadata.column(column).map(str::to_string)
    }

    /// Render the row against a header: one cell per header column, empty
    /// where the row has no value. Record fields outside the header are dropped.
    pub fn cells<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        header
            .iter()
            .map(|column| self.value(column.as_ref()).unwrap_or_default())
            .collect()
    }

    /// Record fields that the given header cannot hold
    pub fn dropped_fields<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        self.record
            .iter()
            .filter(|(name, _)| !header.iter().any(|c| c.as_ref() == *name))
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> MetadataRecord {
        MetadataRecord {
            time: Some("2023-11-14T22:13:20".to_string()),
            participant_id: Some("p1".to_string()),
            device_model: Some("Pixel".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_field_value_cells() {
        assert_eq!(FieldValue::Null.to_cell(), None);
        assert_eq!(FieldValue::Integer(3).to_cell().unwrap(), "3");
        assert_eq!(FieldValue::Float(8.5).to_cell().unwrap(), "8.5");
        assert_eq!(FieldValue::Boolean(true).to_cell().unwrap(), "true");
        assert_eq!(FieldValue::Text("Hotel".into()).to_cell().unwrap(), "Hotel");
    }

    #[test]
    fn test_record_insert_replaces() {
        let mut record = ExtractedRecord::new().with("price", FieldValue::Float(1.0));
        record.insert("price", FieldValue::Float(2.0));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("price"), Some(&FieldValue::Float(2.0)));
    }

    #[test]
    fn test_row_renders_against_header() {
        let record = ExtractedRecord::new()
            .with("price", FieldValue::Float(19.99))
            .with("rating", FieldValue::Float(4.5));
        let row = OutputRow::new("1_a.jpg", Some(&metadata()), record);

        let header = ["filename", "time", "price"];
        assert_eq!(row.cells(&header), vec!["1_a.jpg", "2023-11-14T22:13:20", "19.99"]);
        assert_eq!(row.dropped_fields(&header), vec!["rating".to_string()]);
    }

    #[test]
    fn test_row_missing_columns_are_empty() {
        let row = OutputRow::new("1_a.jpg", None, ExtractedRecord::new());
        let header = ["filename", "device_model", "price"];
        assert_eq!(row.cells(&header), vec!["1_a.jpg", "", ""]);
    }

    #[test]
    fn test_no_data_row() {
        let row = OutputRow::no_data("1_a.jpg", Some(&metadata()), "hotel_name");
        assert_eq!(row.value("hotel_name").unwrap(), NO_DATA_SENTINEL);
        assert_eq!(row.value("participant_id").unwrap(), "p1");
        assert_eq!(row.value("price"), None);
    }

    #[test]
    fn test_filename_cannot_be_overridden() {
        let record = ExtractedRecord::new().with("filename", FieldValue::Text("other".into()));
        let row = OutputRow::new("1_a.jpg", None, record);
        assert_eq!(row.value("filename").unwrap(), "1_a.jpg");
    }
}
