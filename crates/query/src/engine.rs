use crate::rerank::{rerank_by_weighted_cosine, Scored};
use crate::Result;
use notedex_ann::VectorIndex;
use notedex_embed::Embedder;
use notedex_store::Store;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

pub const DEFAULT_TOP_N: usize = 12;
pub const DEFAULT_CANDIDATE_K: usize = 200;

pub type SearchHit = Scored;

/// Per-phase wall-clock timings for one search, in milliseconds.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct Timing {
    pub embed_ms: u64,
    pub search_ms: u64,
    pub fetch_ms: u64,
    pub rerank_ms: u64,
    pub total_ms: u64,
}

/// Two-stage search over the shared store and ANN index.
///
/// The embedding call happens before any lock is taken; the ANN read lock and
/// the store lock are each held only for their synchronous phase.
pub struct QueryEngine<E> {
    store: Arc<Mutex<Store>>,
    ann: Arc<RwLock<VectorIndex>>,
    embedder: Arc<E>,
}

impl<E: Embedder> QueryEngine<E> {
    pub fn new(store: Arc<Mutex<Store>>, ann: Arc<RwLock<VectorIndex>>, embedder: Arc<E>) -> Self {
        Self {
            store,
            ann,
            embedder,
        }
    }

    #[must_use]
    pub fn index_size(&self) -> usize {
        self.ann.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn active_chunk_count(&self) -> Result<u64> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        Ok(store.active_chunk_count()?)
    }

    /// Embed → ANN recall → batch fetch → weighted rerank.
    ///
    /// `top_n` and `candidate_k` fall back to the defaults when zero, and
    /// `candidate_k` is clamped to at least `top_n`. An empty index yields an
    /// empty result set.
    pub async fn search(
        &self,
        query: &str,
        top_n: usize,
        candidate_k: usize,
    ) -> Result<(Vec<SearchHit>, Timing)> {
        let start = Instant::now();
        let mut timing = Timing::default();

        let top_n = if top_n == 0 { DEFAULT_TOP_N } else { top_n };
        let candidate_k = if candidate_k == 0 {
            DEFAULT_CANDIDATE_K
        } else {
            candidate_k
        }
        .max(top_n);

        let embed_start = Instant::now();
        let query_vec = self.embedder.embed(query).await?;
        timing.embed_ms = elapsed_ms(embed_start);

        let search_start = Instant::now();
        let candidate_ids = {
            let ann = self.ann.read().unwrap_or_else(|e| e.into_inner());
            if ann.is_empty() {
                Vec::new()
            } else {
                ann.search(&query_vec, candidate_k)?
            }
        };
        timing.search_ms = elapsed_ms(search_start);

        if candidate_ids.is_empty() {
            timing.total_ms = elapsed_ms(start);
            return Ok((Vec::new(), timing));
        }

        // The store snapshot may be newer than the ANN membership; IDs that
        // were deactivated in between simply drop out here.
        let fetch_start = Instant::now();
        let chunks = {
            let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.chunks_by_ids(&candidate_ids)?
        };
        timing.fetch_ms = elapsed_ms(fetch_start);

        let rerank_start = Instant::now();
        let hits = rerank_by_weighted_cosine(&query_vec, chunks, top_n);
        timing.rerank_ms = elapsed_ms(rerank_start);

        timing.total_ms = elapsed_ms(start);
        log::debug!(
            "search: {} candidates -> {} hits in {}ms",
            candidate_ids.len(),
            hits.len(),
            timing.total_ms
        );
        Ok((hits, timing))
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notedex_embed::EmbedError;
    use notedex_store::NewChunk;

    /// Embedder that returns one fixed vector for every text.
    struct FixedEmbedder(Vec<f32>);

    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> notedex_embed::Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        async fn ping(&self) -> notedex_embed::Result<()> {
            Ok(())
        }

        fn dimension(&self) -> Option<usize> {
            Some(self.0.len())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    /// Embedder that always fails, for error propagation tests.
    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> notedex_embed::Result<Vec<f32>> {
            Err(EmbedError::Unavailable("offline".to_string()))
        }

        async fn ping(&self) -> notedex_embed::Result<()> {
            Err(EmbedError::Unavailable("offline".to_string()))
        }

        fn dimension(&self) -> Option<usize> {
            None
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn seed_chunk(store: &mut Store, ann: &mut VectorIndex, vector: &[f32], weight: f32) -> u64 {
        let tx = store.begin_index().unwrap();
        let id = tx
            .insert_chunk(&NewChunk {
                path: "note.md".to_string(),
                heading_path: "H".to_string(),
                chunk_index: 0,
                content: "content".to_string(),
                content_sha256: "sha".to_string(),
                start_line: 1,
                end_line: 2,
                status: "active".to_string(),
                scope: String::new(),
                note_type: String::new(),
                category_weight: weight,
                tags: Vec::new(),
            })
            .unwrap();
        tx.insert_embedding(id, vector.len(), vector).unwrap();
        tx.commit().unwrap();
        ann.add(id, vector).unwrap();
        id
    }

    fn engine_with<E: Embedder>(
        store: Store,
        ann: VectorIndex,
        embedder: E,
    ) -> QueryEngine<E> {
        QueryEngine::new(
            Arc::new(Mutex::new(store)),
            Arc::new(RwLock::new(ann)),
            Arc::new(embedder),
        )
    }

    #[tokio::test]
    async fn weighted_rerank_prefers_heavier_chunk() {
        let mut store = Store::open_in_memory(2).unwrap();
        let mut ann = VectorIndex::new(2);
        let light = seed_chunk(&mut store, &mut ann, &[1.0, 0.0], 1.0);
        let heavy = seed_chunk(&mut store, &mut ann, &[1.0, 0.0], 1.2);

        let engine = engine_with(store, ann, FixedEmbedder(vec![1.0, 0.0]));
        let (hits, timing) = engine.search("anything", 2, 10).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, heavy);
        assert_eq!(hits[1].chunk.id, light);
        assert!(hits[0].score > hits[1].score);
        assert!(timing.total_ms >= timing.embed_ms);
    }

    #[tokio::test]
    async fn empty_index_returns_empty_results() {
        let store = Store::open_in_memory(2).unwrap();
        let ann = VectorIndex::new(2);
        let engine = engine_with(store, ann, FixedEmbedder(vec![1.0, 0.0]));

        let (hits, _) = engine.search("anything", 0, 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn zero_parameters_fall_back_to_defaults() {
        let mut store = Store::open_in_memory(2).unwrap();
        let mut ann = VectorIndex::new(2);
        for _ in 0..20 {
            seed_chunk(&mut store, &mut ann, &[1.0, 0.0], 1.0);
        }

        let engine = engine_with(store, ann, FixedEmbedder(vec![1.0, 0.0]));
        let (hits, _) = engine.search("anything", 0, 0).await.unwrap();
        assert_eq!(hits.len(), DEFAULT_TOP_N);
    }

    #[tokio::test]
    async fn candidate_k_is_clamped_to_top_n() {
        let mut store = Store::open_in_memory(2).unwrap();
        let mut ann = VectorIndex::new(2);
        for _ in 0..5 {
            seed_chunk(&mut store, &mut ann, &[1.0, 0.0], 1.0);
        }

        let engine = engine_with(store, ann, FixedEmbedder(vec![1.0, 0.0]));
        // candidate_k below top_n must not starve the rerank stage.
        let (hits, _) = engine.search("anything", 5, 1).await.unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn stale_ann_ids_are_dropped() {
        let mut store = Store::open_in_memory(2).unwrap();
        let mut ann = VectorIndex::new(2);
        let old_a = seed_chunk(&mut store, &mut ann, &[1.0, 0.0], 1.0);
        let old_b = seed_chunk(&mut store, &mut ann, &[1.0, 0.1], 1.0);

        // Deactivate both chunks behind the ANN's back, then index a fresh
        // one; the ANN still remembers the stale IDs.
        {
            let tx = store.begin_index().unwrap();
            tx.mark_chunks_inactive("note.md").unwrap();
            tx.commit().unwrap();
        }
        let fresh = seed_chunk(&mut store, &mut ann, &[1.0, 0.0], 1.0);

        let engine = engine_with(store, ann, FixedEmbedder(vec![1.0, 0.0]));
        let (hits, _) = engine.search("anything", 10, 10).await.unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.chunk.id).collect();
        assert_eq!(ids, vec![fresh]);
        assert!(!ids.contains(&old_a) && !ids.contains(&old_b));
    }

    #[tokio::test]
    async fn embed_failure_propagates() {
        let store = Store::open_in_memory(2).unwrap();
        let ann = VectorIndex::new(2);
        let engine = engine_with(store, ann, BrokenEmbedder);

        let err = engine.search("anything", 5, 10).await.unwrap_err();
        assert!(matches!(err, crate::QueryError::Embed(_)));
    }
}
