use super::*;
use crate::schema::{QA_PROFILE, TABLE_PROFILE};
use std::io::Write;
use tempfile::TempDir;

fn resolve_headers(names: &[&str], profile: &'static SchemaProfile) -> (Vec<String>, ResolvedSchema) {
    let headers: Vec<String> = names.iter().map(|n| (*n).to_string()).collect();
    let schema = resolve(&headers, profile).expect("should resolve test headers");
    (headers, schema)
}

fn row(fields: &[&str]) -> csv::StringRecord {
    csv::StringRecord::from(fields.to_vec())
}

fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("should create csv file");
    file.write_all(content.as_bytes())
        .expect("should write csv content");
    path
}

#[test]
fn qa_projection_prefers_answer_text() {
    let (headers, schema) = resolve_headers(&["id", "question", "answer"], &QA_PROFILE);

    let record = project(&row(&["7", "What is Rust?", "A systems language"]), &headers, &schema, 0)
        .expect("row should project");

    assert_eq!(record.id, "7");
    assert_eq!(record.text, "A systems language");
}

#[test]
fn qa_projection_falls_back_to_question_when_answer_blank() {
    let (headers, schema) = resolve_headers(&["id", "question", "answer"], &QA_PROFILE);

    let record = project(&row(&["7", "What is Rust?", "   "]), &headers, &schema, 0)
        .expect("row should project");

    assert_eq!(record.text, "What is Rust?");
}

#[test]
fn qa_metadata_excludes_primary_column_and_carries_id() {
    let (headers, schema) = resolve_headers(&["id", "question", "answer"], &QA_PROFILE);

    let record = project(
        &row(&["7", "What is Rust?", "A systems language"]),
        &headers,
        &schema,
        0,
    )
    .expect("row should project");

    assert!(!record.metadata.contains_key("answer"));
    assert_eq!(record.metadata.get("question"), Some(&"What is Rust?".to_string()));
    assert_eq!(record.metadata.get("id"), Some(&"7".to_string()));
    assert_eq!(record.metadata.get(SOURCE_ID_KEY), Some(&"7".to_string()));
}

#[test]
fn table_projection_joins_labeled_fields_in_role_order() {
    let (headers, schema) =
        resolve_headers(&["Program", "Name", "Skill"], &TABLE_PROFILE);

    let record = project(&row(&["CS", "Alice", "Python"]), &headers, &schema, 0)
        .expect("row should project");

    // Declared role order (title, skills, program), not CSV column order.
    assert_eq!(record.text, "Title: Alice\nSkills: Python\nProgram: CS");
    // LabeledJoin keeps every column in metadata.
    assert_eq!(record.metadata.get("Name"), Some(&"Alice".to_string()));
    assert_eq!(record.metadata.get("Skill"), Some(&"Python".to_string()));
}

#[test]
fn table_projection_skips_blank_fields_in_text() {
    let (headers, schema) = resolve_headers(&["Name", "Skill"], &TABLE_PROFILE);

    let record = project(&row(&["Bob", "  "]), &headers, &schema, 0).expect("row should project");

    assert_eq!(record.text, "Title: Bob");
}

#[test]
fn blank_rows_are_dropped_even_with_an_id() {
    let (headers, schema) = resolve_headers(&["id", "question", "answer"], &QA_PROFILE);

    assert!(project(&row(&["42", "   ", ""]), &headers, &schema, 0).is_none());
}

#[test]
fn fallback_ids_count_accepted_records_only() {
    let (headers, schema) = resolve_headers(&["Name", "Skill"], &TABLE_PROFILE);

    // The blank middle row is dropped and id numbering does not advance
    // past it.
    let rows = [
        row(&["Alice", "Python"]),
        row(&["", ""]),
        row(&["Bob", "Go"]),
    ];

    let mut records = Vec::new();
    for raw in &rows {
        if let Some(record) = project(raw, &headers, &schema, records.len()) {
            records.push(record);
        }
    }

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "row_0");
    assert_eq!(records[1].id, "row_1");
}

#[test]
fn explicit_id_is_trimmed_and_preferred_over_fallback() {
    let (headers, schema) = resolve_headers(&["uid", "name"], &TABLE_PROFILE);

    let record =
        project(&row(&["  p-9  ", "Alice"]), &headers, &schema, 3).expect("row should project");
    assert_eq!(record.id, "p-9");

    let record = project(&row(&["", "Bob"]), &headers, &schema, 3).expect("row should project");
    assert_eq!(record.id, "row_3");
}

#[test]
fn short_rows_project_missing_cells_as_blank() {
    let (headers, schema) = resolve_headers(&["Name", "Skill"], &TABLE_PROFILE);

    // Flexible CSV parsing can hand us fewer cells than headers.
    let record = project(&row(&["Alice"]), &headers, &schema, 0).expect("row should project");
    assert_eq!(record.text, "Title: Alice");
    assert_eq!(record.metadata.get("Skill"), Some(&String::new()));
}

#[test]
fn load_records_missing_file_fails_before_any_store_work() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("nope.csv");

    let err = load_records(&missing, &QA_PROFILE).expect_err("missing file should fail");
    assert!(matches!(err, CsvSearchError::CsvNotFound(_)));
}

#[test]
fn load_records_applies_drop_rule_and_counts_skips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_csv(
        &temp_dir,
        "data.csv",
        "Name,Skill\nAlice,Python\n,\nBob,Go\n",
    );

    let (_schema, records, skipped) =
        load_records(&path, &TABLE_PROFILE).expect("should load records");

    assert_eq!(records.len(), 2);
    assert_eq!(skipped, 1);
    assert_eq!(records[0].id, "row_0");
    assert_eq!(records[1].id, "row_1");
}

#[test]
fn load_records_empty_dataset_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_csv(&temp_dir, "blank.csv", "Name,Skill\n,\n  ,  \n");

    let err = load_records(&path, &TABLE_PROFILE).expect_err("all-blank file should fail");
    assert!(matches!(err, CsvSearchError::EmptyDataset(_)));
}

#[test]
fn load_records_schema_failure_names_missing_role() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_csv(&temp_dir, "odd.csv", "foo,bar\n1,2\n");

    let err = load_records(&path, &QA_PROFILE).expect_err("unmatched headers should fail");
    assert!(matches!(err, CsvSearchError::Schema { ref role, .. } if role == "question"));
}

#[test]
fn partition_covers_all_records_in_order() {
    let records: Vec<u32> = (0..12).collect();

    let batches = partition_batches(&records, 5);

    assert_eq!(batches.len(), 3); // ceil(12 / 5)
    assert!(batches.iter().all(|b| b.len() <= 5));
    let flattened: Vec<u32> = batches.iter().flat_map(|b| b.iter().copied()).collect();
    assert_eq!(flattened, records);
}

#[test]
fn partition_exact_multiple_has_no_trailing_batch() {
    let records: Vec<u32> = (0..10).collect();

    let batches = partition_batches(&records, 5);

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 5);
    assert_eq!(batches[1].len(), 5);
}
