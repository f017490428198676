// LanceDB vector database module
// Handles vector storage and similarity search for ingested CSV records

pub mod vector_store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key that always carries the record's final document id.
pub const SOURCE_ID_KEY: &str = "source_id";

/// One CSV-derived record, embedded and ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedRecord {
    /// Unique identifier within the collection; upserts are keyed on it.
    pub id: String,
    /// The embedding of `document`.
    pub vector: Vec<f32>,
    /// The text that was embedded.
    pub document: String,
    /// Ingestion source tag, used for equality filtering at query time.
    pub source: String,
    /// Original field values plus the id under [`SOURCE_ID_KEY`].
    pub metadata: BTreeMap<String, String>,
    /// RFC 3339 timestamp of the upsert that produced this row.
    pub ingested_at: String,
}

/// One ranked answer from a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: String,
    pub source: String,
    pub metadata: BTreeMap<String, String>,
    /// Store-native distance; smaller is more similar.
    pub distance: f32,
    /// `1.0 - distance`, for display.
    pub score: f32,
}
