//! In-memory nearest-neighbour index under cosine distance.
//!
//! The index holds `(chunk id, vector)` pairs and answers top-k queries by
//! ascending distance `1 − cos(a, b)`. It is an exact scan: at personal-vault
//! scale (well under 100k vectors) a tight linear kernel beats graph
//! structures on both latency and memory, and behaves identically at the
//! contract level. The index is rebuilt from the durable store at startup,
//! so it never persists itself.

mod index;

pub use index::{cosine_similarity, VectorIndex};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnnError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
