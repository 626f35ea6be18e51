/// Tracking record for an indexed file, one per path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub sha256: String,
    pub mtime_unix: i64,
    pub indexed_at_unix: i64,
}

/// Payload for inserting a chunk. The store assigns the ID, the active flag
/// and the creation timestamp.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub path: String,
    pub heading_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub content_sha256: String,
    pub start_line: u32,
    pub end_line: u32,
    pub status: String,
    pub scope: String,
    pub note_type: String,
    pub category_weight: f32,
    pub tags: Vec<String>,
}

/// An active chunk joined with its decoded embedding, as returned by batch
/// fetches during query reranking.
#[derive(Debug, Clone)]
pub struct ChunkWithVector {
    pub id: u64,
    pub path: String,
    pub heading_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub content_sha256: String,
    pub start_line: u32,
    pub end_line: u32,
    pub created_at_unix: i64,
    pub status: String,
    pub scope: String,
    pub note_type: String,
    pub category_weight: f32,
    pub tags: Vec<String>,
    pub vector: Vec<f32>,
}
