// Ingestion pipeline module
// CSV rows -> schema resolution -> projected records -> embedded batch upserts

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::lancedb::vector_store::VectorStore;
use crate::database::lancedb::{EmbeddedRecord, SOURCE_ID_KEY};
use crate::embeddings::Embedder;
use crate::schema::{ResolvedSchema, SchemaProfile, TextPolicy, resolve, role_label};
use crate::{CsvSearchError, Result};

/// One projected CSV row, not yet embedded. Created once per accepted row
/// and immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// Per-run ingestion parameters supplied by the CLI.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub csv_path: PathBuf,
    pub collection: String,
    pub profile: &'static SchemaProfile,
    /// Source tag stored on every record; enables query-time filtering.
    pub source: String,
}

/// Counts and diagnostics from one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub collection: String,
    pub source: String,
    pub records_upserted: usize,
    pub rows_skipped: usize,
    pub batches: usize,
    /// Which CSV column each role resolved to, for the summary print.
    pub schema_summary: String,
}

/// Project one CSV row into a [`Record`], or `None` when every resolved
/// text field is blank after trimming.
///
/// `accepted_count` is the number of records already accepted this run; it
/// numbers the `row_<n>` fallback ids so they stay unique and in CSV order.
#[inline]
pub fn project(
    row: &csv::StringRecord,
    headers: &[String],
    schema: &ResolvedSchema,
    accepted_count: usize,
) -> Option<Record> {
    let field = |role: &str| -> &str {
        schema
            .column(role)
            .and_then(|col| row.get(col.index))
            .unwrap_or("")
            .trim()
    };

    // Drop rule: the id field alone never saves a row; every text-bearing
    // role must be blank for the row to be dropped.
    let all_blank = schema
        .resolved_roles()
        .filter(|(spec, _)| spec.role != "id")
        .all(|(spec, _)| field(spec.role).is_empty());
    if all_blank {
        return None;
    }

    let text = match schema.profile.text_policy {
        TextPolicy::PrimaryWithFallback { primary, fallback } => {
            let primary_value = field(primary);
            if primary_value.is_empty() {
                field(fallback).to_string()
            } else {
                primary_value.to_string()
            }
        }
        TextPolicy::LabeledJoin => schema
            .resolved_roles()
            .filter(|(spec, _)| spec.role != "id")
            .filter_map(|(spec, _)| {
                let value = field(spec.role);
                if value.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", role_label(spec.role), value))
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let raw_id = field("id");
    let id = if raw_id.is_empty() {
        format!("row_{accepted_count}")
    } else {
        raw_id.to_string()
    };

    // Metadata carries every CSV column, not just the resolved roles, so
    // query-time display keeps whatever context the file had. The primary
    // text column is excluded where the policy designates one, since its
    // value is already the stored document.
    let excluded_index = match schema.profile.text_policy {
        TextPolicy::PrimaryWithFallback { primary, .. } => {
            schema.column(primary).map(|col| col.index)
        }
        TextPolicy::LabeledJoin => None,
    };

    let mut metadata: BTreeMap<String, String> = headers
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != excluded_index)
        .map(|(index, header)| {
            let value = row.get(index).unwrap_or("").trim().to_string();
            (header.clone(), value)
        })
        .collect();
    metadata.insert(SOURCE_ID_KEY.to_string(), id.clone());

    Some(Record { id, text, metadata })
}

/// Read and project every usable row of a CSV file.
///
/// Fails before touching any store state: a missing file, an unresolvable
/// required role, or a file with zero usable rows each abort with their own
/// error. Individual malformed rows are logged and skipped, never fatal.
#[inline]
pub fn load_records(
    csv_path: &Path,
    profile: &'static SchemaProfile,
) -> Result<(ResolvedSchema, Vec<Record>, usize)> {
    if !csv_path.exists() {
        return Err(CsvSearchError::CsvNotFound(csv_path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true) // tolerate rows with varying column counts
        .has_headers(true)
        .from_path(csv_path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let schema = resolve(&headers, profile)?;
    debug!("Resolved schema: {}", schema.describe());

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (row_index, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping malformed row {}: {}", row_index, e);
                skipped += 1;
                continue;
            }
        };

        match project(&row, &headers, &schema, records.len()) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if records.is_empty() {
        return Err(CsvSearchError::EmptyDataset(csv_path.to_path_buf()));
    }

    info!(
        "Loaded {} records from {} ({} rows skipped)",
        records.len(),
        csv_path.display(),
        skipped
    );

    Ok((schema, records, skipped))
}

/// Split records into contiguous batches of at most `batch_size`, preserving
/// order. `N` records always yield `ceil(N / batch_size)` batches.
#[inline]
pub fn partition_batches<T>(records: &[T], batch_size: usize) -> Vec<&[T]> {
    records.chunks(batch_size).collect()
}

/// Run the full ingestion pipeline: load the CSV, embed each batch, and
/// upsert it into the configured vector store.
///
/// Upserts are keyed by record id, so re-running over an unchanged file is
/// idempotent. A failing batch aborts the run naming the batch; batches
/// already upserted are not rolled back.
#[inline]
pub async fn run_ingestion<E: Embedder + Sync>(
    config: &Config,
    options: &IngestOptions,
    embedder: &E,
) -> Result<IngestReport> {
    let (schema, records, skipped) = load_records(&options.csv_path, options.profile)?;

    let mut store = VectorStore::new(config, &options.collection).await?;

    let batches = partition_batches(&records, config.ingest.upsert_batch_size);
    let batch_total = batches.len();

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(batch_total as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Upserting {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let ingested_at = Utc::now().to_rfc3339();

    for (batch_index, batch) in batches.iter().enumerate() {
        bar.set_message(format!("batch {} ({} records)", batch_index, batch.len()));

        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = embedder.embed(&texts).map_err(|e| {
            CsvSearchError::Embedding(format!(
                "Embedding batch {batch_index}/{batch_total} failed: {e}"
            ))
        })?;

        let embedded: Vec<EmbeddedRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(record, vector)| EmbeddedRecord {
                id: record.id.clone(),
                vector,
                document: record.text.clone(),
                source: options.source.clone(),
                metadata: record.metadata.clone(),
                ingested_at: ingested_at.clone(),
            })
            .collect();

        store.upsert_batch(&embedded).await.map_err(|e| {
            CsvSearchError::Database(format!(
                "Upsert batch {batch_index}/{batch_total} into '{}' failed: {e}",
                options.collection
            ))
        })?;

        bar.inc(1);
    }

    bar.finish_and_clear();

    // One post-ingest compaction pass, not one per batch.
    store.optimize().await?;

    info!(
        "Ingested {} records into '{}' in {} batches",
        records.len(),
        options.collection,
        batch_total
    );

    Ok(IngestReport {
        collection: options.collection.clone(),
        source: options.source.clone(),
        records_upserted: records.len(),
        rows_skipped: skipped,
        batches: batch_total,
        schema_summary: schema.describe(),
    })
}
