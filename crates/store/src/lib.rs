//! Durable storage for the note index.
//!
//! SQLite is the authoritative store: chunks and their embeddings live here,
//! and the in-memory vector index is always rebuildable from this crate's
//! streaming reads. Chunk deletion is logical (`active = 0`) so chunk IDs are
//! stable for the lifetime of the database.

mod codec;
mod error;
mod store;
mod types;

pub use codec::{decode_vector, encode_vector, CorruptVector};
pub use error::{Result, StoreError};
pub use store::{IndexTx, Store};
pub use types::{ChunkWithVector, FileRecord, NewChunk};

/// Index-metadata key for the embedding dimension.
pub const META_DIM: &str = "dim";
/// Index-metadata key for the embedding model name.
pub const META_MODEL: &str = "embedding_model_name";
/// Index-metadata key for the unix time of the last index build.
pub const META_BUILT_AT: &str = "built_at_unix";
/// Index-metadata key for the active chunk count at the last build.
pub const META_ACTIVE_COUNT: &str = "active_chunk_count_at_build";
