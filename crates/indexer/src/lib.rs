//! # notedex indexer
//!
//! Incremental indexing of a Markdown vault.
//!
//! ## Pipeline
//!
//! ```text
//! Vault directory
//!     │
//!     ├──> Walk / watch (.md files, debounced)
//!     │      └─> changed files (SHA-256 gate)
//!     │
//!     ├──> Front-matter + heading chunker
//!     │      └─> weighted note chunks
//!     │
//!     └──> Embed → store transaction → ANN update
//! ```
//!
//! The store transaction commits before any ANN mutation, so a rolled-back
//! transaction leaves the ANN untouched and a failed ANN add after commit is
//! repaired by the next startup rebuild.

mod error;
mod indexer;
mod reconcile;
mod stats;
pub mod watcher;

pub use error::{IndexerError, Result};
pub use indexer::{IndexOutcome, Indexer};
pub use reconcile::{
    rebuild_and_stamp, reconcile_at_startup, replay_active_embeddings, RebuildReport,
};
pub use stats::IndexStats;
