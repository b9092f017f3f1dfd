//! Sentence embeddings for movie overviews.
//!
//! [`Embedder`] is the seam the request handler talks to. [`OnnxEmbedder`]
//! runs all-MiniLM-L6-v2 through ONNX Runtime and produces L2-normalized
//! vectors, so a dot product between two of them is their cosine similarity.

mod onnx;

pub use onnx::OnnxEmbedder;

use async_trait::async_trait;

/// Checkpoint the stored overview vectors were built with.
pub const MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;

    /// Embed already normalized text into a unit-length vector.
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Failed to encode text: {0}")]
    Encoding(String),
}

pub type EmbedResult<T> = Result<T, EmbedError>;
