use sha2::{Digest, Sha256};

/// Soft byte cap: the buffer is flushed once it grows past this.
pub const SOFT_CHUNK_BYTES: usize = 1000;

/// Chunks whose trimmed content is shorter than this are not worth embedding.
pub const MIN_CHUNK_CHARS: usize = 10;

/// A contiguous slice of a note produced by the heading splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Breadcrumb of nested heading titles, e.g. `A > B > C`.
    pub heading_path: String,
    /// Trimmed chunk text, heading line included.
    pub content: String,
    /// Position of this chunk within its file.
    pub chunk_index: u32,
    /// 1-based inclusive.
    pub start_line: u32,
    /// 1-based inclusive.
    pub end_line: u32,
}

/// Split markdown into chunks by headings, flushing early when the buffer
/// passes [`SOFT_CHUNK_BYTES`].
#[must_use]
pub fn chunk_markdown(markdown: &str) -> Vec<Chunk> {
    chunk_lines(markdown.lines(), 1)
}

/// Core splitter over a line iterator. `first_line` is the 1-based file line
/// number of the iterator's first element, which lets callers chunk a note
/// body while keeping whole-file line numbers.
pub(crate) fn chunk_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
    first_line: u32,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut heading_path: Vec<String> = Vec::new();
    let mut chunk_index = 0u32;
    let mut chunk_start = first_line;
    let mut line_num = first_line.saturating_sub(1);

    let mut flush = |buffer: &mut String,
                     heading_path: &[String],
                     chunk_index: &mut u32,
                     chunk_start: &mut u32,
                     end_line: u32| {
        if buffer.is_empty() {
            return;
        }
        chunks.push(Chunk {
            heading_path: heading_path.join(" > "),
            content: buffer.trim().to_string(),
            chunk_index: *chunk_index,
            start_line: *chunk_start,
            end_line,
        });
        buffer.clear();
        *chunk_index += 1;
        *chunk_start = end_line + 1;
    };

    for line in lines {
        line_num += 1;

        if line.starts_with('#') {
            flush(
                &mut buffer,
                &heading_path,
                &mut chunk_index,
                &mut chunk_start,
                line_num - 1,
            );

            let level = line.bytes().take_while(|&b| b == b'#').count();
            let heading_text = line[level..].trim().to_string();
            heading_path.truncate(level - 1);
            heading_path.push(heading_text);

            buffer.push_str(line);
            buffer.push('\n');
            continue;
        }

        buffer.push_str(line);
        buffer.push('\n');

        if buffer.len() > SOFT_CHUNK_BYTES {
            flush(
                &mut buffer,
                &heading_path,
                &mut chunk_index,
                &mut chunk_start,
                line_num,
            );
        }
    }

    flush(
        &mut buffer,
        &heading_path,
        &mut chunk_index,
        &mut chunk_start,
        line_num,
    );

    chunks
}

/// SHA-256 of the content, lowercase hex.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
