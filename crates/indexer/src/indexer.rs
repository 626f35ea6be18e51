use crate::error::{IndexerError, Result};
use crate::stats::IndexStats;
use ignore::WalkBuilder;
use notedex_ann::VectorIndex;
use notedex_chunk::{analyze_note, content_hash, WeightConfig, MIN_CHUNK_CHARS};
use notedex_embed::Embedder;
use notedex_store::{FileRecord, NewChunk, Store};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// Result of indexing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The file was (re)indexed with this many chunks.
    Indexed { chunks: usize },
    /// Content hash matched the stored record; nothing was written.
    Unchanged,
    /// No chunk survived the length filter or embedding; the store was left
    /// untouched so a transient embedding outage cannot wipe a note.
    Empty,
}

/// Stateless orchestrator over the store, the embedder and the ANN index.
pub struct Indexer<E> {
    store: Arc<Mutex<Store>>,
    ann: Arc<RwLock<VectorIndex>>,
    embedder: Arc<E>,
    weights: WeightConfig,
}

impl<E: Embedder> Indexer<E> {
    pub fn new(
        store: Arc<Mutex<Store>>,
        ann: Arc<RwLock<VectorIndex>>,
        embedder: Arc<E>,
        weights: WeightConfig,
    ) -> Self {
        Self {
            store,
            ann,
            embedder,
            weights,
        }
    }

    /// Index one file: hash gate, chunk, embed, transactional upsert, then
    /// ANN adds after the commit.
    pub async fn index_file(&self, path: &Path) -> Result<IndexOutcome> {
        let path_key = path.to_string_lossy().to_string();

        let bytes = tokio::fs::read(path).await?;
        let mtime_unix = file_mtime_unix(path)?;
        let file_hash = sha256_hex(&bytes);

        {
            let store = lock(&self.store);
            if let Some(record) = store.file_record(&path_key)? {
                if record.sha256 == file_hash {
                    return Ok(IndexOutcome::Unchanged);
                }
            }
        }

        let content = String::from_utf8_lossy(&bytes);
        let (meta, chunks) = analyze_note(&content);
        let weight = self.weights.calculate(&meta.tags, &meta.status);

        // Embed outside any lock; a chunk that fails to embed is logged and
        // skipped rather than aborting the file.
        let mut embedded: Vec<(notedex_chunk::Chunk, Vec<f32>)> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.content.len() < MIN_CHUNK_CHARS {
                continue;
            }
            match self.embedder.embed(&chunk.content).await {
                Ok(vec) if vec.is_empty() => {
                    log::warn!(
                        "{path_key}: empty embedding for chunk {}, skipping",
                        chunk.chunk_index
                    );
                }
                Ok(vec) => embedded.push((chunk, vec)),
                Err(e) => {
                    log::warn!(
                        "{path_key}: embedding chunk {} failed: {e}, skipping",
                        chunk.chunk_index
                    );
                }
            }
        }

        if embedded.is_empty() {
            return Ok(IndexOutcome::Empty);
        }

        let chunk_count = embedded.len();
        let mut ann_adds: Vec<(u64, Vec<f32>)> = Vec::with_capacity(chunk_count);
        {
            let mut store = lock(&self.store);
            let dim = store.dim();
            let tx = store.begin_index()?;
            tx.mark_chunks_inactive(&path_key)?;

            for (chunk, vec) in embedded {
                let id = tx.insert_chunk(&NewChunk {
                    path: path_key.clone(),
                    heading_path: chunk.heading_path,
                    chunk_index: chunk.chunk_index,
                    content_sha256: content_hash(&chunk.content),
                    content: chunk.content,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    status: meta.status.clone(),
                    scope: meta.scope.clone(),
                    note_type: meta.note_type.clone(),
                    category_weight: weight,
                    tags: meta.tags.clone(),
                })?;
                tx.insert_embedding(id, dim, &vec)?;
                ann_adds.push((id, vec));
            }

            tx.upsert_file(&FileRecord {
                path: path_key.clone(),
                sha256: file_hash,
                mtime_unix,
                indexed_at_unix: now_unix(),
            })?;
            tx.commit()?;
        }

        // Committed; the ANN is advisory from here on. A failed add leaves a
        // recall gap until the next startup rebuild, never a wrong result.
        {
            let mut ann = self.ann.write().unwrap_or_else(|e| e.into_inner());
            for (id, vec) in ann_adds {
                if let Err(e) = ann.add(id, &vec) {
                    log::error!("{path_key}: ANN add for chunk {id} failed: {e}");
                }
            }
        }

        Ok(IndexOutcome::Indexed {
            chunks: chunk_count,
        })
    }

    /// Walk the vault and index every Markdown file, skipping hidden
    /// directories. Per-file failures are logged and counted; only a failed
    /// walk of the root itself aborts the run.
    pub async fn index_vault(&self, root: &Path) -> Result<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats::new();

        let mut files = Vec::new();
        // Hidden directories are pruned; hidden files pass through and are
        // filtered by extension alone.
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_some_and(|ft| ft.is_dir())
                    || !entry.file_name().to_string_lossy().starts_with('.')
            })
            .build();
        for entry in walker {
            let entry = entry.map_err(|e| IndexerError::Walk(e.to_string()))?;
            let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
            if is_file && entry.path().extension().is_some_and(|ext| ext == "md") {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();

        for file in files {
            stats.files += 1;
            match self.index_file(&file).await {
                Ok(IndexOutcome::Indexed { chunks }) => {
                    stats.indexed += 1;
                    stats.chunks += chunks;
                }
                Ok(IndexOutcome::Unchanged) => stats.unchanged += 1,
                Ok(IndexOutcome::Empty) => stats.empty += 1,
                Err(e) => {
                    stats.failed += 1;
                    log::warn!("indexing {} failed: {e}", file.display());
                }
            }
        }

        stats.time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!("vault index complete: {stats}");
        Ok(stats)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn file_mtime_unix(path: &Path) -> Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
