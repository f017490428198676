
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use super::{EmbeddedRecord, SearchHit};
use crate::{CsvSearchError, config::Config};

/// Vector database store using LanceDB for similarity search. One instance
/// wraps one collection (table); upserts are keyed by the record id.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl VectorStore {
    /// Open (or create) the collection `collection` under the configured
    /// vector database path.
    #[inline]
    pub async fn new(config: &Config, collection: &str) -> Result<Self, CsvSearchError> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CsvSearchError::Database(format!(
                    "Failed to create vector database directory: {}",
                    e
                ))
            })?;
        }

        let connection = Self::connect(&db_path).await?;

        let mut store = Self {
            connection,
            table_name: collection.to_string(),
            vector_dimension: None,
        };

        store
            .initialize_table(config.ollama.embedding_dimension as usize)
            .await?;

        info!("Vector store initialized for collection '{}'", collection);
        Ok(store)
    }

    /// List every collection present under the configured vector database
    /// path. Used by the status report.
    #[inline]
    pub async fn list_collections(config: &Config) -> Result<Vec<String>, CsvSearchError> {
        let db_path = config.vector_database_path();
        if !db_path.exists() {
            return Ok(Vec::new());
        }

        let connection = Self::connect(&db_path).await?;
        connection
            .table_names()
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to list collections: {}", e)))
    }

    async fn connect(db_path: &Path) -> Result<Connection, CsvSearchError> {
        let uri = format!("file://{}", db_path.display());
        lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to connect to LanceDB: {}", e)))
    }

    /// Create the table if it does not exist; otherwise detect the vector
    /// dimension of the existing data.
    async fn initialize_table(&mut self, default_dimension: usize) -> Result<(), CsvSearchError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let dim = self.detect_existing_vector_dimension().await?;
            debug!("Collection exists with vector dimension {}", dim);
            self.vector_dimension = Some(dim);
            return Ok(());
        }

        let schema = Self::create_schema(default_dimension);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to create table: {}", e)))?;

        self.vector_dimension = Some(default_dimension);
        info!(
            "Created collection '{}' with {} dimensions",
            self.table_name, default_dimension
        );
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize, CsvSearchError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(CsvSearchError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("document", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new("ingested_at", DataType::Utf8, false),
        ]))
    }

    /// Insert-or-replace a batch of records, keyed by id. Ids already
    /// present in the collection have their document, metadata, and vector
    /// replaced; re-running an identical ingestion leaves the collection
    /// unchanged.
    #[inline]
    pub async fn upsert_batch(&mut self, records: &[EmbeddedRecord]) -> Result<(), CsvSearchError> {
        if records.is_empty() {
            debug!("No records to upsert");
            return Ok(());
        }

        debug!("Upserting batch of {} records", records.len());

        // Detect the vector dimension from the first record and recreate the
        // table when it changes (first real insert after an empty create, or
        // a model swap).
        let vector_dim = records[0].vector.len();
        if self.vector_dimension != Some(vector_dim) {
            info!(
                "Vector dimension changed from {:?} to {}, recreating collection",
                self.vector_dimension, vector_dim
            );
            self.recreate_table_with_dimension(vector_dim).await?;
            self.vector_dimension = Some(vector_dim);
        }

        let table = self.open_table().await?;

        // Upsert = delete any rows with these ids, then append the batch.
        let id_list = records
            .iter()
            .map(|r| format!("'{}'", escape_literal(&r.id)))
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!("id IN ({})", id_list))
            .await
            .map_err(|e| {
                CsvSearchError::Database(format!("Failed to delete existing ids: {}", e))
            })?;

        let record_batch = self.create_record_batch(records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to insert records: {}", e)))?;

        info!("Upserted {} records", records.len());
        Ok(())
    }

    async fn recreate_table_with_dimension(
        &self,
        vector_dim: usize,
    ) -> Result<(), CsvSearchError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| CsvSearchError::Database(format!("Failed to drop table: {}", e)))?;
        }

        let schema = Self::create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                CsvSearchError::Database(format!(
                    "Failed to create table with new dimensions: {}",
                    e
                ))
            })?;

        Ok(())
    }

    fn create_record_batch(
        &self,
        records: &[EmbeddedRecord],
    ) -> Result<RecordBatch, CsvSearchError> {
        let len = records.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| CsvSearchError::Database("Vector dimension not set".to_string()))?;

        let mut ids = Vec::with_capacity(len);
        let mut documents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut metadatas = Vec::with_capacity(len);
        let mut ingested_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            if record.vector.len() != vector_dim {
                return Err(CsvSearchError::Database(format!(
                    "Record '{}' has vector dimension {} but the collection expects {}",
                    record.id,
                    record.vector.len(),
                    vector_dim
                )));
            }

            ids.push(record.id.as_str());
            documents.push(record.document.as_str());
            sources.push(record.source.as_str());
            metadatas.push(serde_json::to_string(&record.metadata).map_err(|e| {
                CsvSearchError::Database(format!("Failed to serialize metadata: {}", e))
            })?);
            ingested_ats.push(record.ingested_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let schema = Self::create_schema(vector_dim);

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    CsvSearchError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(documents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(metadatas)),
            Arc::new(StringArray::from(ingested_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| CsvSearchError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Nearest-neighbor search for the top `limit` records, optionally
    /// restricted to one ingestion source. Results are ranked ascending by
    /// store-native distance; ties fall in store order, which is not
    /// guaranteed stable. An empty store yields an empty vec.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>, CsvSearchError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self.open_table().await?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| {
                CsvSearchError::Database(format!("Failed to create vector search: {}", e))
            })?
            .column("vector")
            .limit(limit);

        if let Some(source) = source_filter {
            query = query.only_if(format!("source = '{}'", escape_literal(source)));
        }

        let mut results = query
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results.try_next().await.map_err(|e| {
            CsvSearchError::Database(format!("Failed to read result stream: {}", e))
        })? {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search hits", hits.len());
        Ok(hits)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>, CsvSearchError> {
        let documents = string_column(batch, "document")?;
        let sources = string_column(batch, "source")?;
        let metadatas = string_column(batch, "metadata")?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut hits = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let metadata: BTreeMap<String, String> = serde_json::from_str(metadatas.value(row))
                .map_err(|e| {
                    CsvSearchError::Database(format!("Failed to parse stored metadata: {}", e))
                })?;

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            hits.push(SearchHit {
                document: documents.value(row).to_string(),
                source: sources.value(row).to_string(),
                metadata,
                distance,
                score: 1.0 - distance,
            });
        }

        Ok(hits)
    }

    /// Number of records currently persisted in the collection.
    #[inline]
    pub async fn count_records(&self) -> Result<u64, CsvSearchError> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Compact and reorganize the collection after a bulk ingestion.
    #[inline]
    pub async fn optimize(&mut self) -> Result<(), CsvSearchError> {
        debug!("Optimizing vector database");

        let table = self.open_table().await?;

        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }

    async fn open_table(&self) -> Result<lancedb::Table, CsvSearchError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CsvSearchError::Database(format!("Failed to open table: {}", e)))
    }
}

/// Escape a string for inclusion in a single-quoted SQL-style literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a StringArray, CsvSearchError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| CsvSearchError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| CsvSearchError::Database(format!("Invalid {} column type", name)))
}
