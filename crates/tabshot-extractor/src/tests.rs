//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{Extractor, ExtractorConfig, ExtractorError};
    use chrono::{Local, TimeZone};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tabshot_domain::NO_DATA_SENTINEL;
    use tabshot_llm::MockProvider;

    const SCHEMA: &str = r#"
list_field = "listings"
system_prompt = "You read travel search results."
user_prompt = "Extract every listing shown."

[[fields]]
name = "hotel_name"
type = "string"

[[fields]]
name = "price"
type = "float"
optional = true
"#;

    const METADATA: &str = r#"{
        "content": [
            {
                "timestamp": 1700000000000,
                "id": "42",
                "participant": { "id": "p1", "device_model": "Pixel" }
            }
        ]
    }"#;

    fn config() -> ExtractorConfig {
        ExtractorConfig {
            cooldown_ms: 0,
            ..ExtractorConfig::default()
        }
    }

    fn task_dir(screenshots: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("schema.toml"), SCHEMA).unwrap();
        for name in screenshots {
            fs::write(dir.path().join(name), [0xFF, 0xD8, 0xFF]).unwrap();
        }
        dir
    }

    /// All rows of the output table, header included
    fn table_rows(dir: &Path) -> Vec<Vec<String>> {
        let text = fs::read_to_string(dir.join("results.csv")).unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.trim_start_matches('\u{feff}').as_bytes());
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    fn column(rows: &[Vec<String>], name: &str) -> usize {
        rows[0].iter().position(|c| c == name).unwrap()
    }

    #[test]
    fn test_full_extraction_flow() {
        let dir = task_dir(&["1_a.jpg", "2_b.jpg"]);
        let mut provider = MockProvider::new(json!({ "listings": [] }));
        provider.add_response(
            "1_a.jpg",
            json!({ "listings": [
                { "hotel_name": "Azur", "price": 120.5 },
                { "hotel_name": "Bleu", "price": null }
            ] }),
        );
        provider.add_response(
            "2_b.jpg",
            json!({ "listings": [ { "hotel_name": "Cote", "price": 99 } ] }),
        );

        let extractor = Extractor::new(provider, config());
        let report = extractor.run_task(dir.path()).unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(report.processed, 2);
        assert_eq!(report.rows_written, 3);
        assert!(report.failures.is_empty());

        let rows = table_rows(dir.path());
        assert_eq!(
            rows[0],
            vec![
                "filename",
                "time",
                "participant_id",
                "device_model",
                "android_version",
                "screen_width",
                "screen_height",
                "hotel_name",
                "price"
            ]
        );
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1][0], "1_a.jpg");
        assert_eq!(rows[1][7], "Azur");
        assert_eq!(rows[1][8], "120.5");
        assert_eq!(rows[2][8], "");
        assert_eq!(rows[3][0], "2_b.jpg");
        assert_eq!(rows[3][8], "99");
    }

    #[test]
    fn test_empty_result_writes_sentinel_row() {
        let dir = task_dir(&["1_a.jpg"]);
        let extractor = Extractor::new(MockProvider::new(json!({ "listings": [] })), config());

        let report = extractor.run_task(dir.path()).unwrap();
        assert_eq!(report.empty_results, 1);
        assert_eq!(report.rows_written, 1);

        let rows = table_rows(dir.path());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][column(&rows, "hotel_name")], NO_DATA_SENTINEL);
        assert_eq!(rows[1][column(&rows, "price")], "");

        // Marked processed: the second run never calls the backend
        extractor.provider().reset_call_count();
        let report = extractor.run_task(dir.path()).unwrap();
        assert_eq!(report.already_processed, 1);
        assert_eq!(extractor.provider().call_count(), 0);
    }

    #[test]
    fn test_metadata_join() {
        let dir = task_dir(&["1700000000000_42.jpg"]);
        fs::write(dir.path().join("data.json"), METADATA).unwrap();
        let provider = MockProvider::new(json!({ "listings": [ { "hotel_name": "Azur", "price": 1 } ] }));

        Extractor::new(provider, config()).run_task(dir.path()).unwrap();

        let rows = table_rows(dir.path());
        let expected_time = Local
            .timestamp_opt(1_700_000_000, 0)
            .unwrap()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        assert_eq!(rows[1][column(&rows, "participant_id")], "p1");
        assert_eq!(rows[1][column(&rows, "device_model")], "Pixel");
        assert_eq!(rows[1][column(&rows, "time")], expected_time);
        assert_eq!(rows[1][column(&rows, "android_version")], "");
    }

    #[test]
    fn test_missing_metadata_still_writes_row() {
        let dir = task_dir(&["9_unknown.jpg"]);
        fs::write(dir.path().join("data.json"), METADATA).unwrap();
        let provider = MockProvider::new(json!({ "listings": [ { "hotel_name": "Azur", "price": 1 } ] }));

        let report = Extractor::new(provider, config()).run_task(dir.path()).unwrap();
        assert_eq!(report.rows_written, 1);

        let rows = table_rows(dir.path());
        assert_eq!(rows[1][0], "9_unknown.jpg");
        for name in ["time", "participant_id", "device_model"] {
            assert_eq!(rows[1][column(&rows, name)], "");
        }
    }

    #[test]
    fn test_partial_failure_isolation() {
        let dir = task_dir(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut provider = MockProvider::new(json!({ "listings": [ { "hotel_name": "ok", "price": 1 } ] }));
        provider.add_error("b.jpg");

        let extractor = Extractor::new(provider, config());
        let report = extractor.run_task(dir.path()).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "b.jpg");

        let rows = table_rows(dir.path());
        let filenames: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
        assert_eq!(filenames, vec!["a.jpg", "c.jpg"]);

        // b.jpg is retried on the next run, and only b.jpg
        extractor.provider().reset_call_count();
        let report = extractor.run_task(dir.path()).unwrap();
        assert_eq!(extractor.provider().calls(), vec!["b.jpg"]);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_too_many_consecutive_failures_aborts_task() {
        let dir = task_dir(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let mut provider = MockProvider::new(json!({ "listings": [] }));
        provider.add_error("a.jpg");
        provider.add_error("b.jpg");
        let config = ExtractorConfig {
            max_consecutive_failures: 2,
            ..config()
        };

        let extractor = Extractor::new(provider, config);
        let result = extractor.run_task(dir.path());

        assert!(matches!(
            result,
            Err(ExtractorError::TooManyFailures { failures: 2, .. })
        ));
        assert_eq!(extractor.provider().call_count(), 2);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let dir = task_dir(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut provider = MockProvider::new(json!({ "listings": [] }));
        provider.add_error("a.jpg");
        provider.add_error("c.jpg");
        let config = ExtractorConfig {
            max_consecutive_failures: 2,
            ..config()
        };

        let report = Extractor::new(provider, config).run_task(dir.path()).unwrap();
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.processed, 1);
    }

    #[test]
    fn test_unclosed_quote_row_is_reprocessed() {
        let dir = task_dir(&["a.jpg"]);
        fs::write(dir.path().join("results.csv"), b"filename\n\"a.jpg\nbroken").unwrap();

        let provider = MockProvider::new(json!({ "listings": [] }));
        let extractor = Extractor::new(provider, config());
        extractor.run_task(dir.path()).unwrap();

        assert_eq!(extractor.provider().call_count(), 1);
        assert_eq!(
            table_rows(dir.path()),
            vec![vec!["filename".to_string()], vec!["a.jpg".to_string()]]
        );
    }

    #[test]
    fn test_missing_schema_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(MockProvider::default(), config());
        assert!(matches!(
            extractor.run_task(dir.path()),
            Err(ExtractorError::Schema(_))
        ));
    }
}
