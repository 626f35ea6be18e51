use serde::Serialize;

/// Summary of one vault indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    /// Markdown files encountered.
    pub files: usize,
    /// Files that were (re)indexed.
    pub indexed: usize,
    /// Files skipped because their content hash was unchanged.
    pub unchanged: usize,
    /// Files that produced no embeddable chunks.
    pub empty: usize,
    /// Files that failed; the store was left untouched for each.
    pub failed: usize,
    /// Chunks written across all indexed files.
    pub chunks: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub time_ms: u64,
}

impl IndexStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files ({} indexed, {} unchanged, {} empty, {} failed), {} chunks in {}ms",
            self.files,
            self.indexed,
            self.unchanged,
            self.empty,
            self.failed,
            self.chunks,
            self.time_ms
        )
    }
}
