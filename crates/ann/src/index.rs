use crate::{AnnError, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Cosine similarity over f32 slices. Returns 0.0 when either vector has zero
/// norm. This is the hot inner loop of both recall and reranking, so the
/// accumulation is four-way unrolled to keep the dependency chains short.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut dot = [0.0f32; 4];
    let mut norm_a = [0.0f32; 4];
    let mut norm_b = [0.0f32; 4];

    let mut chunks_a = a.chunks_exact(4);
    let mut chunks_b = b.chunks_exact(4);
    for (ca, cb) in chunks_a.by_ref().zip(chunks_b.by_ref()) {
        for i in 0..4 {
            dot[i] += ca[i] * cb[i];
            norm_a[i] += ca[i] * ca[i];
            norm_b[i] += cb[i] * cb[i];
        }
    }
    for (&x, &y) in chunks_a.remainder().iter().zip(chunks_b.remainder()) {
        dot[0] += x * y;
        norm_a[0] += x * x;
        norm_b[0] += y * y;
    }

    let dot: f32 = dot.iter().sum();
    let norm_a: f32 = norm_a.iter().sum();
    let norm_b: f32 = norm_b.iter().sum();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A search candidate ordered so that the heap's top is the worst survivor:
/// largest distance first, then largest ID (ties resolve to ascending IDs in
/// the final result).
#[derive(PartialEq)]
struct Candidate {
    distance: f32,
    id: u64,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Exact k-NN index over `(u64 id, vector)` pairs with cosine distance.
///
/// Duplicate IDs are not rejected; the store guarantees ID uniqueness.
pub struct VectorIndex {
    dim: usize,
    points: Vec<(u64, Vec<f32>)>,
}

impl VectorIndex {
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self {
            dim,
            points: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Insert a point. Fails when the vector length differs from the index
    /// dimension.
    pub fn add(&mut self, id: u64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(AnnError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.points.push((id, vector.to_vec()));
        Ok(())
    }

    /// Return up to `k` IDs by ascending distance `1 − cos`, ties by
    /// ascending ID. An empty index yields an empty vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<u64>> {
        if query.len() != self.dim {
            return Err(AnnError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k == 0 || self.points.is_empty() {
            return Ok(Vec::new());
        }

        // Bounded max-heap: keep the k best seen so far, evicting the worst.
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (id, vector) in &self.points {
            let candidate = Candidate {
                distance: 1.0 - cosine_similarity(query, vector),
                id: *id,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate.cmp(worst) == Ordering::Less {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        let mut ids: Vec<u64> = Vec::with_capacity(heap.len());
        while let Some(candidate) = heap.pop() {
            ids.push(candidate.id);
        }
        ids.reverse();
        Ok(ids)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Drop all points, releasing their memory.
    pub fn clear(&mut self) {
        self.points.clear();
        self.points.shrink_to_fit();
    }
}
