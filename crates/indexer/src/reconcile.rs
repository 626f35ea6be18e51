use crate::error::Result;
use crate::indexer::lock;
use notedex_ann::{AnnError, VectorIndex};
use notedex_store::{Store, META_ACTIVE_COUNT, META_BUILT_AT, META_DIM, META_MODEL};
use std::sync::{Arc, Mutex, RwLock};

/// What startup reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    /// True when stored `dim`/model disagreed with the embedder and the
    /// metadata was re-stamped.
    pub rebuilt: bool,
    /// Vectors loaded into the ANN.
    pub vectors: u64,
}

/// Compare the stored index metadata against the embedder's current
/// dimension and model. On mismatch, rebuild the ANN from the store and
/// atomically stamp the new metadata; otherwise just replay the active
/// embeddings into the fresh index.
pub fn reconcile_at_startup(
    store: &Arc<Mutex<Store>>,
    ann: &Arc<RwLock<VectorIndex>>,
    dim: usize,
    model: &str,
) -> Result<RebuildReport> {
    let (stored_dim, stored_model) = {
        let store = lock(store);
        (
            store.index_meta_usize(META_DIM)?,
            store.index_meta(META_MODEL)?,
        )
    };

    let mut mismatch = false;
    if stored_dim != Some(dim) {
        log::info!(
            "embedding dimension changed: {:?} -> {dim}, rebuilding index",
            stored_dim
        );
        mismatch = true;
    }
    if stored_model.as_deref() != Some(model) {
        log::info!(
            "embedding model changed: {:?} -> {model}, rebuilding index",
            stored_model
        );
        mismatch = true;
    }

    if mismatch {
        let vectors = rebuild_and_stamp(store, ann, dim, model)?;
        return Ok(RebuildReport {
            rebuilt: true,
            vectors,
        });
    }

    let vectors = load_active_embeddings(store, ann, LoadMode::Strict)?;
    log::info!("loaded {vectors} vectors into the index");
    Ok(RebuildReport {
        rebuilt: false,
        vectors,
    })
}

/// Rebuild the ANN from every active embedding, then atomically set all four
/// index-metadata keys. Returns the number of vectors loaded.
pub fn rebuild_and_stamp(
    store: &Arc<Mutex<Store>>,
    ann: &Arc<RwLock<VectorIndex>>,
    dim: usize,
    model: &str,
) -> Result<u64> {
    {
        let mut ann = ann.write().unwrap_or_else(|e| e.into_inner());
        ann.clear();
    }
    // Lenient load: after a dimension or model change the stored vectors may
    // no longer fit the index. They are skipped (a recall gap, closed as
    // files are re-embedded), not fatal.
    let vectors = load_active_embeddings(store, ann, LoadMode::SkipMismatched)?;

    let active = {
        let store = lock(store);
        store.active_chunk_count()?
    };
    {
        let mut store = lock(store);
        store.set_index_meta(&[
            (META_DIM, dim.to_string()),
            (META_MODEL, model.to_string()),
            (META_BUILT_AT, now_unix().to_string()),
            (META_ACTIVE_COUNT, active.to_string()),
        ])?;
    }

    log::info!("index rebuild complete: {vectors} vectors, {active} active chunks");
    Ok(vectors)
}

/// Replay every active embedding into a fresh ANN without touching the index
/// metadata. This is the read-only startup path used by the search server.
pub fn replay_active_embeddings(
    store: &Arc<Mutex<Store>>,
    ann: &Arc<RwLock<VectorIndex>>,
) -> Result<u64> {
    load_active_embeddings(store, ann, LoadMode::Strict)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    /// Any dimension mismatch is an invariant violation.
    Strict,
    /// Mismatched vectors are logged and dropped.
    SkipMismatched,
}

fn load_active_embeddings(
    store: &Arc<Mutex<Store>>,
    ann: &Arc<RwLock<VectorIndex>>,
    mode: LoadMode,
) -> Result<u64> {
    let store = lock(store);
    let mut ann = ann.write().unwrap_or_else(|e| e.into_inner());

    let mut loaded = 0u64;
    let mut skipped = 0u64;
    let mut first_failure: Option<(u64, AnnError)> = None;
    store.for_each_active_embedding(|id, vec| {
        if first_failure.is_some() {
            return;
        }
        match ann.add(id, &vec) {
            Ok(()) => loaded += 1,
            Err(e) if mode == LoadMode::SkipMismatched => {
                skipped += 1;
                log::debug!("skipping chunk {id}: {e}");
            }
            Err(e) => first_failure = Some((id, e)),
        }
    })?;

    if let Some((id, e)) = first_failure {
        log::error!("loading chunk {id} into the index failed: {e}");
        return Err(e.into());
    }
    if skipped > 0 {
        log::warn!("skipped {skipped} stored vectors that no longer match the index dimension");
    }
    Ok(loaded)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
