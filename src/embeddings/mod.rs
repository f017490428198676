// Embeddings module
// This module handles Ollama integration behind a narrow embedding seam

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Text-to-vector seam between the pipeline and the actual embedding model.
/// Implementations must be deterministic for a fixed model version and must
/// return one vector per input, in input order, all with the same
/// dimensionality. Ingestion and query time must use the same implementation;
/// mixing embedding spaces is a configuration error this crate does not
/// defend against.
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
