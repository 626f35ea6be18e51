//! The chunk/metadata pipeline: YAML-ish front-matter extraction, recursive
//! by-heading Markdown chunking, and the tag/status weighting rules applied
//! at rerank time.

mod chunker;
mod front_matter;
mod weights;

pub use chunker::{chunk_markdown, content_hash, Chunk, MIN_CHUNK_CHARS, SOFT_CHUNK_BYTES};
pub use front_matter::{normalize_status, parse_front_matter, NoteMetadata};
pub use weights::{ConfigError, StatusWeight, TagWeight, WeightConfig};

/// Run the full pipeline on one note: extract front-matter, then chunk the
/// body with line numbers relative to the whole file. A note that is only a
/// front-matter block produces no chunks.
#[must_use]
pub fn analyze_note(content: &str) -> (NoteMetadata, Vec<Chunk>) {
    let (metadata, consumed_lines) = parse_front_matter(content);
    let body = skip_lines(content, consumed_lines);
    let chunks = chunker::chunk_lines(body.lines(), consumed_lines as u32 + 1);
    (metadata, chunks)
}

fn skip_lines(content: &str, count: usize) -> &str {
    if count == 0 {
        return content;
    }
    let mut remaining = content;
    for _ in 0..count {
        match remaining.find('\n') {
            Some(idx) => remaining = &remaining[idx + 1..],
            None => return "",
        }
    }
    remaining
}
