//! Loading a task's schema binding from its `schema.toml`

use crate::error::ExtractorError;
use std::fs;
use std::path::Path;
use tabshot_domain::SchemaBinding;

/// Parse and validate a schema binding from TOML text
pub fn parse_schema_binding(toml_str: &str) -> Result<SchemaBinding, ExtractorError> {
    let binding: SchemaBinding = toml::from_str(toml_str)
        .map_err(|e| ExtractorError::Schema(format!("Failed to parse TOML: {}", e)))?;
    binding.validate()?;
    Ok(binding)
}

/// Read, parse and validate a schema binding file
pub fn load_schema_binding(path: &Path) -> Result<SchemaBinding, ExtractorError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ExtractorError::Schema(format!("{}: {}", path.display(), e)))?;
    parse_schema_binding(&contents)
        .map_err(|e| match e {
            ExtractorError::Schema(msg) => {
                ExtractorError::Schema(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabshot_domain::FieldType;

    const HOTELS: &str = r#"
list_field = "hotels"
system_prompt = "You extract hotel listings."
user_prompt = "Extract every hotel."

[[fields]]
name = "hotel_name"
type = "string"

[[fields]]
name = "price"
type = "float"
optional = true
"#;

    #[test]
    fn test_parse_valid_binding() {
        let binding = parse_schema_binding(HOTELS).unwrap();
        assert_eq!(binding.list_field, "hotels");
        assert_eq!(binding.field_names(), vec!["hotel_name", "price"]);
        assert_eq!(binding.fields[1].field_type, FieldType::Float);
        assert!(binding.fields[1].optional);
    }

    #[test]
    fn test_parse_rejects_invalid_toml() {
        assert!(matches!(
            parse_schema_binding("list_field = "),
            Err(ExtractorError::Schema(_))
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_binding() {
        let toml_str = r#"
system_prompt = "s"
user_prompt = "u"
fields = []
"#;
        assert!(matches!(
            parse_schema_binding(toml_str),
            Err(ExtractorError::Schema(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_schema_binding(&dir.path().join("schema.toml")).unwrap_err();
        assert!(err.to_string().contains("schema.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        fs::write(&path, HOTELS).unwrap();
        assert_eq!(load_schema_binding(&path).unwrap().fields.len(), 2);
    }
}
