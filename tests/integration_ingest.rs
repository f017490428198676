#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests for the full ingest -> search pipeline, using a
// deterministic fake embedder so no Ollama server is needed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;

use csv_semsearch::CsvSearchError;
use csv_semsearch::config::{Config, IngestConfig, OllamaConfig};
use csv_semsearch::database::lancedb::vector_store::VectorStore;
use csv_semsearch::embeddings::Embedder;
use csv_semsearch::ingest::{IngestOptions, run_ingestion};
use csv_semsearch::schema::{QA_PROFILE, SchemaProfile, TABLE_PROFILE};
use csv_semsearch::search::SearchService;

const DIM: usize = 16;

/// Deterministic bag-of-words embedder standing in for the real model.
struct HashEmbedder;

impl HashEmbedder {
    fn embed_one(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[String]) -> csv_semsearch::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

fn test_config(temp_dir: &TempDir, upsert_batch_size: usize) -> Config {
    Config {
        ollama: OllamaConfig {
            embedding_dimension: DIM as u32,
            ..OllamaConfig::default()
        },
        ingest: IngestConfig {
            upsert_batch_size,
            ..IngestConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
    }
}

fn write_csv(temp_dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("should create csv file");
    file.write_all(content.as_bytes())
        .expect("should write csv content");
    path
}

fn options(csv_path: PathBuf, profile: &'static SchemaProfile) -> IngestOptions {
    IngestOptions {
        csv_path,
        collection: "records".to_string(),
        profile,
        source: "people".to_string(),
    }
}

#[tokio::test]
async fn full_pipeline_ingests_and_answers_queries() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 100);
    let csv_path = write_csv(
        &temp_dir,
        "people.csv",
        "Name,Skill\n\
         Alice,cooking italian pasta dishes\n\
         ,\n\
         Bob,distributed systems programming\n",
    );

    let report = run_ingestion(&config, &options(csv_path, &TABLE_PROFILE), &HashEmbedder)
        .await
        .expect("ingestion should succeed");

    // The blank row is dropped and ids number accepted records only.
    assert_eq!(report.records_upserted, 2);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.batches, 1);
    assert!(report.schema_summary.contains("title -> \"Name\""));

    let store = VectorStore::new(&config, "records")
        .await
        .expect("should open store");
    assert_eq!(store.count_records().await.expect("should count"), 2);

    let service = SearchService::new(store, HashEmbedder);
    let hits = service
        .search("who cooks pasta dishes", 2, None)
        .await
        .expect("search should succeed");

    assert_eq!(hits.len(), 2);
    assert!(
        hits[0].document.contains("cooking"),
        "record sharing query words must rank first, got: {}",
        hits[0].document
    );
    assert_eq!(hits[0].metadata.get("source_id"), Some(&"row_0".to_string()));
    assert_eq!(hits[0].source, "people");
}

#[tokio::test]
async fn reingesting_unchanged_csv_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 100);
    let csv_path = write_csv(
        &temp_dir,
        "qa.csv",
        "id,question,answer\n\
         1,What is Rust?,A systems programming language\n\
         2,What is LanceDB?,An embedded vector database\n",
    );

    let first = run_ingestion(
        &config,
        &options(csv_path.clone(), &QA_PROFILE),
        &HashEmbedder,
    )
    .await
    .expect("first ingestion should succeed");
    assert_eq!(first.records_upserted, 2);

    let second = run_ingestion(&config, &options(csv_path, &QA_PROFILE), &HashEmbedder)
        .await
        .expect("second ingestion should succeed");
    assert_eq!(second.records_upserted, 2);

    let store = VectorStore::new(&config, "records")
        .await
        .expect("should open store");
    assert_eq!(
        store.count_records().await.expect("should count"),
        2,
        "re-running over an unchanged file must not grow the collection"
    );
}

#[tokio::test]
async fn small_batch_size_splits_the_upserts() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 2);
    let csv_path = write_csv(
        &temp_dir,
        "five.csv",
        "Name,Skill\na,s1\nb,s2\nc,s3\nd,s4\ne,s5\n",
    );

    let report = run_ingestion(&config, &options(csv_path, &TABLE_PROFILE), &HashEmbedder)
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.records_upserted, 5);
    assert_eq!(report.batches, 3); // ceil(5 / 2)

    let store = VectorStore::new(&config, "records")
        .await
        .expect("should open store");
    assert_eq!(store.count_records().await.expect("should count"), 5);
}

#[tokio::test]
async fn missing_csv_fails_without_touching_the_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 100);
    let missing = temp_dir.path().join("missing.csv");

    let err = run_ingestion(&config, &options(missing, &QA_PROFILE), &HashEmbedder)
        .await
        .expect_err("missing file should fail");
    assert!(matches!(err, CsvSearchError::CsvNotFound(_)));

    // Nothing was created on disk for the store.
    assert!(
        VectorStore::list_collections(&config)
            .await
            .expect("should list collections")
            .is_empty()
    );
}

#[tokio::test]
async fn unresolvable_schema_reports_the_missing_role() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 100);
    let csv_path = write_csv(&temp_dir, "odd.csv", "foo,bar\n1,2\n");

    let err = run_ingestion(&config, &options(csv_path, &QA_PROFILE), &HashEmbedder)
        .await
        .expect_err("unmatched headers should fail");

    match err {
        CsvSearchError::Schema { role, expected } => {
            assert_eq!(role, "question");
            assert!(expected.contains("question"));
            assert!(expected.contains("name"));
        }
        other => panic!("expected Schema error, got {other:?}"),
    }
}

#[tokio::test]
async fn all_blank_rows_fail_as_empty_dataset() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 100);
    let csv_path = write_csv(&temp_dir, "blank.csv", "Name,Skill\n,\n , \n");

    let err = run_ingestion(&config, &options(csv_path, &TABLE_PROFILE), &HashEmbedder)
        .await
        .expect_err("blank-only file should fail");
    assert!(matches!(err, CsvSearchError::EmptyDataset(_)));
}

#[tokio::test]
async fn source_filter_spans_multiple_ingestions() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir, 100);

    let people = write_csv(&temp_dir, "people.csv", "Name,Skill\nAlice,cooking pasta\n");
    let teams = write_csv(&temp_dir, "teams.csv", "Name,Skill\nKitchen,cooking pasta\n");

    let mut people_options = options(people, &TABLE_PROFILE);
    people_options.source = "people".to_string();
    // Distinct ids per file keep both rows alive in one collection.
    run_ingestion(&config, &people_options, &HashEmbedder)
        .await
        .expect("people ingestion should succeed");

    let mut teams_options = options(teams, &TABLE_PROFILE);
    teams_options.source = "teams".to_string();
    let store = VectorStore::new(&config, "records")
        .await
        .expect("should open store");
    assert_eq!(store.count_records().await.expect("should count"), 1);
    drop(store);

    // Both files produce id row_0; the second ingestion overwrites it.
    run_ingestion(&config, &teams_options, &HashEmbedder)
        .await
        .expect("teams ingestion should succeed");

    let store = VectorStore::new(&config, "records")
        .await
        .expect("should open store");
    assert_eq!(
        store.count_records().await.expect("should count"),
        1,
        "identical generated ids overwrite across runs"
    );

    let service = SearchService::new(store, HashEmbedder);
    let hits = service
        .search("cooking pasta", 5, Some("people"))
        .await
        .expect("search should succeed");
    assert!(
        hits.is_empty(),
        "the people row was overwritten by the teams row with the same id"
    );

    let hits = service
        .search("cooking pasta", 5, Some("teams"))
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
}
