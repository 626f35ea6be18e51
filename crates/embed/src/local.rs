use crate::error::Result;
use crate::Embedder;

/// Deterministic offline embedder: term frequencies hashed into a fixed
/// number of dimensions, L2-normalized. Far weaker than a neural model but
/// needs no network, which makes it the offline fallback and the standard
/// test stub across the workspace.
pub struct LocalEmbedder {
    dimension: usize,
}

impl LocalEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vec;
        }

        for token in tokenize(text) {
            // Spread each token across three dimensions to reduce collisions.
            let h = fnv1a32(token);
            for i in 0..3u32 {
                let idx = (h.wrapping_add(i) as usize) % self.dimension;
                vec[idx] += 1.0;
            }
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn model_name(&self) -> &str {
        "local-hash"
    }
}

/// Lowercase alphanumeric tokens longer than two characters.
fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 2)
}

fn fnv1a32(s: &str) -> u32 {
    let mut h = 2_166_136_261u32;
    for b in s.to_ascii_lowercase().bytes() {
        h ^= u32::from(b);
        h = h.wrapping_mul(16_777_619);
    }
    h
}
