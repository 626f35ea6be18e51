//! The query side of the index: embed the query, recall candidates from the
//! ANN, batch-fetch their chunks, and rerank exactly with category weights.

mod engine;
mod rerank;

pub use engine::{QueryEngine, SearchHit, Timing, DEFAULT_CANDIDATE_K, DEFAULT_TOP_N};
pub use rerank::rerank_by_weighted_cosine;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("embedding error: {0}")]
    Embed(#[from] notedex_embed::EmbedError),

    #[error("index error: {0}")]
    Ann(#[from] notedex_ann::AnnError),

    #[error("store error: {0}")]
    Store(#[from] notedex_store::StoreError),
}
