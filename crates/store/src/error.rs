use crate::codec::CorruptVector;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunk {chunk_id}: {source}")]
    CorruptChunkVector {
        chunk_id: u64,
        #[source]
        source: CorruptVector,
    },

    #[error(transparent)]
    CorruptVector(#[from] CorruptVector),

    #[error("invalid database value: {0}")]
    InvalidDbValue(String),
}
