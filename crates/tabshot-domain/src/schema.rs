//! Schema Binding - the declarative per-task extraction descriptor
//!
//! A binding names the fields to extract from every screenshot of a task,
//! carries the instructions sent to the vision backend, and knows how to
//! unpack the backend's structured answer into [`ExtractedRecord`]s.
//!
//! # Examples
//!
//! ```
//! use tabshot_domain::{FieldDescriptor, FieldType, SchemaBinding};
//!
//! let binding = SchemaBinding::new(
//!     "hotels",
//!     "Extract hotel cards from the screenshot.",
//!     "List every hotel.",
//!     vec![
//!         FieldDescriptor::new("hotel_name", FieldType::String).optional(),
//!         FieldDescriptor::new("price", FieldType::Float).optional(),
//!     ],
//! );
//! assert!(binding.validate().is_ok());
//! assert_eq!(binding.field_names(), vec!["hotel_name", "price"]);
//! assert_eq!(binding.sentinel_column(), "hotel_name");
//! ```

use crate::record::{ExtractedRecord, FieldValue, BASE_COLUMNS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while validating a binding or unpacking a response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The binding itself is malformed
    #[error("Invalid schema binding: {0}")]
    InvalidBinding(String),

    /// The backend response does not match the binding
    #[error("Response does not conform to schema: {0}")]
    NonConforming(String),
}

/// Scalar type of an extracted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Whole number
    Integer,
    /// Floating point number
    Float,
    /// Free text
    String,
    /// True/false flag
    Boolean,
}

impl FieldType {
    /// JSON schema type name
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
        }
    }
}

/// One declared field of the record shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name
    pub name: String,

    /// Scalar type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether the backend may answer null
    #[serde(default)]
    pub optional: bool,

    /// Hint forwarded to the backend in the response schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    /// Create a required field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: false,
            description: None,
        }
    }

    /// Mark the field optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn json_schema(&self) -> Value {
        let json_type = self.field_type.json_type();
        let mut schema = if self.optional {
            json!({ "type": [json_type, "null"] })
        } else {
            json!({ "type": json_type })
        };
        if let Some(description) = &self.description {
            schema["description"] = Value::String(description.clone());
        }
        schema
    }

    /// Coerce one response value into this field's type
    fn coerce(&self, value: Option<&Value>) -> Result<FieldValue, SchemaError> {
        let value = match value {
            None | Some(Value::Null) if self.optional => return Ok(FieldValue::Null),
            None | Some(Value::Null) => {
                return Err(SchemaError::NonConforming(format!(
                    "required field '{}' is missing",
                    self.name
                )))
            }
            Some(v) => v,
        };

        let coerced = match (self.field_type, value) {
            (FieldType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(FieldValue::Integer),
            (FieldType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(FieldValue::Integer)
            }
            (FieldType::Float, Value::Number(n)) => n.as_f64().map(FieldValue::Float),
            (FieldType::Float, Value::String(s)) => {
                s.trim().parse::<f64>().ok().map(FieldValue::Float)
            }
            (FieldType::String, Value::String(s)) => Some(FieldValue::Text(s.clone())),
            (FieldType::String, Value::Number(n)) => Some(FieldValue::Text(n.to_string())),
            (FieldType::Boolean, Value::Bool(b)) => Some(FieldValue::Boolean(*b)),
            _ => None,
        };

        coerced.ok_or_else(|| {
            SchemaError::NonConforming(format!(
                "field '{}' expected {}, got {}",
                self.name,
                self.field_type.json_type(),
                value
            ))
        })
    }
}

fn default_list_field() -> String {
    "items".to_string()
}

/// Whole-valued float that fits in an `i64`; `i64::MAX as f64` rounds up to 2^63
fn integral_f64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

/// Per-task extraction descriptor, loaded from the task's `schema.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBinding {
    /// Response field holding the records
    #[serde(default = "default_list_field")]
    pub list_field: String,

    /// The response field holds a single record rather than a list
    #[serde(default)]
    pub single_item: bool,

    /// Column receiving the no-data sentinel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel_field: Option<String>,

    /// System instructions sent to the backend
    pub system_prompt: String,

    /// User instructions sent alongside the image
    pub user_prompt: String,

    /// Record shape, in column order
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaBinding {
    /// Create a list-valued binding
    pub fn new(
        list_field: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            list_field: list_field.into(),
            single_item: false,
            sentinel_field: None,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            fields,
        }
    }

    /// Expect a single record in the list field
    pub fn single_item(mut self) -> Self {
        self.single_item = true;
        self
    }

    /// Choose the sentinel column explicitly
    pub fn with_sentinel_field(mut self, field: impl Into<String>) -> Self {
        self.sentinel_field = Some(field.into());
        self
    }

    /// Check the binding against the fixed descriptor rules
    pub fn validate(&self) -> Result<(), SchemaError> {
        let invalid = |msg: String| Err(SchemaError::InvalidBinding(msg));

        if self.list_field.trim().is_empty() {
            return invalid("list_field must not be empty".to_string());
        }
        if self.system_prompt.trim().is_empty() {
            return invalid("system_prompt must not be empty".to_string());
        }
        if self.user_prompt.trim().is_empty() {
            return invalid("user_prompt must not be empty".to_string());
        }
        if self.fields.is_empty() {
            return invalid("at least one field must be declared".to_string());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return invalid("field names must not be empty".to_string());
            }
            if BASE_COLUMNS.contains(&field.name.as_str()) {
                return invalid(format!(
                    "field '{}' collides with a metadata column",
                    field.name
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return invalid(format!("field '{}' is declared twice", field.name));
            }
        }

        if let Some(sentinel) = &self.sentinel_field {
            if !seen.contains(sentinel.as_str()) {
                return invalid(format!(
                    "sentinel_field '{}' is not a declared field",
                    sentinel
                ));
            }
        }

        Ok(())
    }

    /// Declared field names in column order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Column that receives the no-data sentinel: the configured one, else
    /// the first text field, else the first field.
    pub fn sentinel_column(&self) -> &str {
        if let Some(sentinel) = &self.sentinel_field {
            return sentinel;
        }
        self.fields
            .iter()
            .find(|f| f.field_type == FieldType::String)
            .or_else(|| self.fields.first())
            .map(|f| f.name.as_str())
            .unwrap_or(self.list_field.as_str())
    }

    /// Strict JSON schema describing the expected response
    pub fn response_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.json_schema());
        }
        let required: Vec<Value> = self
            .fields
            .iter()
            .map(|f| Value::String(f.name.clone()))
            .collect();

        let item = json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });

        let container = if self.single_item {
            item
        } else {
            json!({ "type": "array", "items": item })
        };

        let mut root_properties = Map::new();
        root_properties.insert(self.list_field.clone(), container);

        json!({
            "type": "object",
            "properties": root_properties,
            "required": [self.list_field.clone()],
            "additionalProperties": false,
        })
    }

    /// Unpack a backend response into records.
    ///
    /// An empty list (or a null single item) yields no records. Any shape or
    /// type violation rejects the whole response.
    pub fn records_from_response(
        &self,
        response: &Value,
    ) -> Result<Vec<ExtractedRecord>, SchemaError> {
        let object = response.as_object().ok_or_else(|| {
            SchemaError::NonConforming("response is not a JSON object".to_string())
        })?;

        let container = object.get(&self.list_field).ok_or_else(|| {
            SchemaError::NonConforming(format!("missing list field '{}'", self.list_field))
        })?;

        let items: Vec<&Value> = match (self.single_item, container) {
            (true, Value::Null) => Vec::new(),
            (true, item @ Value::Object(_)) => vec![item],
            (false, Value::Array(items)) => items.iter().collect(),
            (true, other) => {
                return Err(SchemaError::NonConforming(format!(
                    "'{}' should hold a single record, got {}",
                    self.list_field, other
                )))
            }
            (false, other) => {
                return Err(SchemaError::NonConforming(format!(
                    "'{}' should hold a list of records, got {}",
                    self.list_field, other
                )))
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                self.record_from_item(item).map_err(|e| match e {
                    SchemaError::NonConforming(msg) => {
                        SchemaError::NonConforming(format!("record {}: {}", idx, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }

    fn record_from_item(&self, item: &Value) -> Result<ExtractedRecord, SchemaError> {
        let object = item.as_object().ok_or_else(|| {
            SchemaError::NonConforming(format!("expected an object, got {}", item))
        })?;

        let mut record = ExtractedRecord::new();
        for field in &self.fields {
            record.insert(field.name.clone(), field.coerce(object.get(&field.name))?);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel_binding() -> SchemaBinding {
        SchemaBinding::new(
            "hotels",
            "You extract hotel listings.",
            "Extract every hotel in this screenshot.",
            vec![
                FieldDescriptor::new("position", FieldType::Integer),
                FieldDescriptor::new("hotel_name", FieldType::String).optional(),
                FieldDescriptor::new("price", FieldType::Float).optional(),
                FieldDescriptor::new("is_ad", FieldType::Boolean),
            ],
        )
    }

    #[test]
    fn test_valid_binding() {
        assert!(hotel_binding().validate().is_ok());
    }

    #[test]
    fn test_rejects_base_column_collision() {
        let mut binding = hotel_binding();
        binding.fields.push(FieldDescriptor::new("filename", FieldType::String));
        assert!(matches!(
            binding.validate(),
            Err(SchemaError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let mut binding = hotel_binding();
        binding.fields.push(FieldDescriptor::new("price", FieldType::Float));
        assert!(binding.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_sentinel() {
        let binding = hotel_binding().with_sentinel_field("stars");
        assert!(binding.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_fields() {
        let mut binding = hotel_binding();
        binding.fields.clear();
        assert!(binding.validate().is_err());
    }

    #[test]
    fn test_sentinel_defaults_to_first_text_field() {
        assert_eq!(hotel_binding().sentinel_column(), "hotel_name");

        let numeric = SchemaBinding::new(
            "items",
            "s",
            "u",
            vec![FieldDescriptor::new("rank", FieldType::Integer)],
        );
        assert_eq!(numeric.sentinel_column(), "rank");

        let explicit = hotel_binding().with_sentinel_field("price");
        assert_eq!(explicit.sentinel_column(), "price");
    }

    #[test]
    fn test_response_json_schema_is_strict() {
        let schema = hotel_binding().response_json_schema();
        let item = &schema["properties"]["hotels"]["items"];

        assert_eq!(schema["required"], json!(["hotels"]));
        assert_eq!(item["additionalProperties"], json!(false));
        assert_eq!(
            item["required"],
            json!(["position", "hotel_name", "price", "is_ad"])
        );
        assert_eq!(item["properties"]["price"]["type"], json!(["number", "null"]));
        assert_eq!(item["properties"]["position"]["type"], json!("integer"));
    }

    #[test]
    fn test_single_item_schema_has_no_array() {
        let schema = hotel_binding().single_item().response_json_schema();
        assert_eq!(schema["properties"]["hotels"]["type"], json!("object"));
    }

    #[test]
    fn test_records_from_list_response() {
        let response = json!({
            "hotels": [
                { "position": 1, "hotel_name": "Azur", "price": 120, "is_ad": false },
                { "position": 2.0, "hotel_name": null, "price": "99.5", "is_ad": true, "extra": 1 }
            ]
        });
        let records = hotel_binding().records_from_response(&response).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("price"), Some(&FieldValue::Float(120.0)));
        assert_eq!(records[1].get("position"), Some(&FieldValue::Integer(2)));
        assert_eq!(records[1].get("hotel_name"), Some(&FieldValue::Null));
        assert_eq!(records[1].get("price"), Some(&FieldValue::Float(99.5)));
        assert_eq!(records[1].get("extra"), None);
    }

    #[test]
    fn test_records_from_empty_list() {
        let records = hotel_binding()
            .records_from_response(&json!({ "hotels": [] }))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_single_item_response() {
        let binding = hotel_binding().single_item();
        let response = json!({
            "hotels": { "position": 1, "hotel_name": "Azur", "price": null, "is_ad": false }
        });
        let records = binding.records_from_response(&response).unwrap();
        assert_eq!(records.len(), 1);

        let empty = binding.records_from_response(&json!({ "hotels": null })).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_non_conforming() {
        let response = json!({ "hotels": [ { "hotel_name": "Azur", "is_ad": false } ] });
        let result = hotel_binding().records_from_response(&response);
        assert!(matches!(result, Err(SchemaError::NonConforming(_))));
    }

    #[test]
    fn test_out_of_range_integer_is_non_conforming() {
        for position in [json!(1e300), json!(-1e300), json!(u64::MAX), json!(3.5)] {
            let response = json!({ "hotels": [ { "position": position, "is_ad": false } ] });
            let result = hotel_binding().records_from_response(&response);
            assert!(
                matches!(result, Err(SchemaError::NonConforming(_))),
                "accepted {}",
                position
            );
        }

        let response = json!({ "hotels": [ { "position": -4.0e3, "is_ad": false } ] });
        let records = hotel_binding().records_from_response(&response).unwrap();
        assert_eq!(records[0].get("position"), Some(&FieldValue::Integer(-4000)));
    }

    #[test]
    fn test_wrong_container_is_non_conforming() {
        assert!(hotel_binding()
            .records_from_response(&json!({ "items": [] }))
            .is_err());
        assert!(hotel_binding()
            .records_from_response(&json!({ "hotels": {} }))
            .is_err());
        assert!(hotel_binding().records_from_response(&json!([])).is_err());
    }

    #[test]
    fn test_mistyped_value_is_non_conforming() {
        let response = json!({ "hotels": [ { "position": "first", "is_ad": false } ] });
        assert!(hotel_binding().records_from_response(&response).is_err());
    }

    #[test]
    fn test_binding_from_toml() {
        let toml_str = r#"
            list_field = "items"
            system_prompt = "Extract products."
            user_prompt = "List every product."

            [[fields]]
            name = "rank"
            type = "integer"

            [[fields]]
            name = "product_name"
            type = "string"
            optional = true
            description = "null when truncated"
        "#;
        let binding: SchemaBinding = toml::from_str(toml_str).unwrap();

        assert!(binding.validate().is_ok());
        assert!(!binding.single_item);
        assert_eq!(binding.field_names(), vec!["rank", "product_name"]);
        assert_eq!(binding.fields[1].field_type, FieldType::String);
        assert!(binding.fields[1].optional);
    }
}
