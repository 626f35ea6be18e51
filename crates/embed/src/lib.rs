//! Embedding clients: the remote Ollama HTTP client used in production and a
//! deterministic local fallback that needs no network.

mod error;
mod local;
mod ollama;

pub use error::{EmbedError, Result};
pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;

use std::future::Future;

/// The seam between the indexing/query pipeline and the embedding service.
///
/// Implementations are stateless apart from dimension discovery and safe for
/// concurrent calls; callers own retries.
pub trait Embedder: Send + Sync {
    /// Embed one text into a finite f32 vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Lightweight liveness probe.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// The embedding dimension, known after the first successful embed.
    fn dimension(&self) -> Option<usize>;

    /// Model identifier recorded in the index metadata.
    fn model_name(&self) -> &str;
}
