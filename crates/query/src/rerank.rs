use notedex_ann::cosine_similarity;
use notedex_store::ChunkWithVector;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A reranked chunk with its final weighted score.
#[derive(Debug, Clone)]
pub struct Scored {
    pub score: f32,
    pub chunk: ChunkWithVector,
}

/// Heap key ordered so that "greater" means "better": higher score first,
/// then lower chunk ID.
#[derive(PartialEq)]
struct Rank {
    score: f32,
    id: u64,
}

impl Eq for Rank {}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Exact rerank: `score = cos(query, chunk) × category_weight`, top `top_n`
/// by descending score, ties by ascending chunk ID. Selection goes through a
/// size-bounded min-heap so the full candidate set is never sorted.
#[must_use]
pub fn rerank_by_weighted_cosine(
    query: &[f32],
    chunks: Vec<ChunkWithVector>,
    top_n: usize,
) -> Vec<Scored> {
    if top_n == 0 || chunks.is_empty() {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<(Rank, usize)>> = BinaryHeap::with_capacity(top_n + 1);
    let mut scores: Vec<f32> = Vec::with_capacity(chunks.len());

    for (idx, chunk) in chunks.iter().enumerate() {
        let score = cosine_similarity(query, &chunk.vector) * chunk.category_weight;
        scores.push(score);
        let rank = Rank {
            score,
            id: chunk.id,
        };
        if heap.len() < top_n {
            heap.push(Reverse((rank, idx)));
        } else if let Some(Reverse((worst, _))) = heap.peek() {
            if rank.cmp(worst) == Ordering::Greater {
                heap.pop();
                heap.push(Reverse((rank, idx)));
            }
        }
    }

    let mut picked: Vec<usize> = Vec::with_capacity(heap.len());
    while let Some(Reverse((_, idx))) = heap.pop() {
        picked.push(idx);
    }
    picked.reverse();

    let mut taken: Vec<Option<ChunkWithVector>> = chunks.into_iter().map(Some).collect();
    picked
        .into_iter()
        .map(|idx| Scored {
            score: scores[idx],
            chunk: taken[idx].take().expect("each index picked once"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u64, vector: Vec<f32>, weight: f32) -> ChunkWithVector {
        ChunkWithVector {
            id,
            path: format!("note-{id}.md"),
            heading_path: String::new(),
            chunk_index: 0,
            content: String::new(),
            content_sha256: String::new(),
            start_line: 1,
            end_line: 1,
            created_at_unix: 0,
            status: "active".to_string(),
            scope: String::new(),
            note_type: String::new(),
            category_weight: weight,
            tags: Vec::new(),
            vector,
        }
    }

    #[test]
    fn weight_breaks_equal_cosine() {
        let query = [1.0, 0.0];
        let chunks = vec![
            chunk(1, vec![1.0, 0.0], 1.0),
            chunk(2, vec![1.0, 0.0], 1.2),
        ];
        let ranked = rerank_by_weighted_cosine(&query, chunks, 2);
        assert_eq!(ranked[0].chunk.id, 2);
        assert!((ranked[0].score - 1.2).abs() < 1e-6);
        assert_eq!(ranked[1].chunk.id, 1);
    }

    #[test]
    fn equal_scores_order_by_ascending_id() {
        let query = [1.0, 0.0];
        let chunks = vec![
            chunk(9, vec![1.0, 0.0], 1.0),
            chunk(3, vec![1.0, 0.0], 1.0),
            chunk(6, vec![1.0, 0.0], 1.0),
        ];
        let ranked = rerank_by_weighted_cosine(&query, chunks, 3);
        let ids: Vec<u64> = ranked.iter().map(|s| s.chunk.id).collect();
        assert_eq!(ids, vec![3, 6, 9]);
    }

    #[test]
    fn top_n_bounds_the_result() {
        let query = [1.0, 0.0];
        let chunks = (1..=10)
            .map(|id| chunk(id, vec![1.0, id as f32 * 0.01], 1.0))
            .collect();
        let ranked = rerank_by_weighted_cosine(&query, chunks, 3);
        assert_eq!(ranked.len(), 3);
        // Smallest angular offset wins.
        assert_eq!(ranked[0].chunk.id, 1);
    }

    #[test]
    fn results_are_sorted_descending() {
        let query = [1.0, 0.0];
        let chunks = vec![
            chunk(1, vec![0.0, 1.0], 1.0),
            chunk(2, vec![1.0, 0.0], 1.0),
            chunk(3, vec![1.0, 1.0], 1.0),
        ];
        let ranked = rerank_by_weighted_cosine(&query, chunks, 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(ranked[0].chunk.id, 2);
    }

    #[test]
    fn empty_inputs_yield_empty() {
        assert!(rerank_by_weighted_cosine(&[1.0], Vec::new(), 5).is_empty());
        assert!(rerank_by_weighted_cosine(&[1.0], vec![chunk(1, vec![1.0], 1.0)], 0).is_empty());
    }
}
