use crate::codec::{decode_vector, encode_vector};
use crate::error::{Result, StoreError};
use crate::types::{ChunkWithVector, FileRecord, NewChunk};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    sha256 TEXT NOT NULL,
    mtime_unix INTEGER NOT NULL,
    indexed_at_unix INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    heading_path TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    content_sha256 TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at_unix INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT '',
    scope TEXT NOT NULL DEFAULT '',
    note_type TEXT NOT NULL DEFAULT '',
    category_weight REAL NOT NULL DEFAULT 1.0,
    tags TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);
CREATE INDEX IF NOT EXISTS idx_chunks_active_id ON chunks(active, id);

CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id INTEGER PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
    dim INTEGER NOT NULL,
    vec BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Authoritative store for files, chunks, embeddings and index metadata.
///
/// One connection per instance; write transactions take an immediate lock so
/// concurrent writers serialize at BEGIN rather than deadlocking at COMMIT.
pub struct Store {
    conn: Connection,
    dim: usize,
}

impl Store {
    /// Open or create the database at `path`. `dim` is the embedding
    /// dimension new embeddings must match (0 for read-only consumers that
    /// discover it from `index_meta`).
    pub fn open(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?, dim)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory(dim: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, dim)
    }

    fn init(conn: Connection, dim: usize) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, dim })
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    pub fn file_record(&self, path: &str) -> Result<Option<FileRecord>> {
        self.conn
            .query_row(
                "SELECT path, sha256, mtime_unix, indexed_at_unix FROM files WHERE path = ?1",
                params![path],
                |row| {
                    Ok(FileRecord {
                        path: row.get(0)?,
                        sha256: row.get(1)?,
                        mtime_unix: row.get(2)?,
                        indexed_at_unix: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Begin an immediate write transaction for re-indexing a file.
    pub fn begin_index(&mut self) -> Result<IndexTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(IndexTx { tx, dim: self.dim })
    }

    /// Fetch active chunks with embeddings by ID. Missing or inactive IDs are
    /// silently omitted; order is unspecified.
    pub fn chunks_by_ids(&self, ids: &[u64]) -> Result<Vec<ChunkWithVector>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT c.id, c.path, c.heading_path, c.chunk_index, c.content,
                    c.content_sha256, c.start_line, c.end_line, c.created_at_unix,
                    c.status, c.scope, c.note_type, c.category_weight, c.tags, e.vec
             FROM chunks c
             JOIN embeddings e ON e.chunk_id = c.id
             WHERE c.active = 1 AND c.id IN ({placeholders})"
        );

        let args: Vec<i64> = ids
            .iter()
            .map(|&id| u64_to_i64(id, "chunk id"))
            .collect::<Result<_>>()?;

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
            let id: i64 = row.get(0)?;
            let tags_json: String = row.get(13)?;
            let blob: Vec<u8> = row.get(14)?;
            Ok((
                id,
                ChunkWithVector {
                    id: 0,
                    path: row.get(1)?,
                    heading_path: row.get(2)?,
                    chunk_index: row.get(3)?,
                    content: row.get(4)?,
                    content_sha256: row.get(5)?,
                    start_line: row.get(6)?,
                    end_line: row.get(7)?,
                    created_at_unix: row.get(8)?,
                    status: row.get(9)?,
                    scope: row.get(10)?,
                    note_type: row.get(11)?,
                    category_weight: row.get(12)?,
                    tags: Vec::new(),
                    vector: Vec::new(),
                },
                tags_json,
                blob,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, mut chunk, tags_json, blob) = row?;
            chunk.id = i64_to_u64(id, "chunk id")?;
            chunk.tags = decode_tags(&tags_json)?;
            chunk.vector = decode_vector(&blob).map_err(|source| {
                StoreError::CorruptChunkVector {
                    chunk_id: chunk.id,
                    source,
                }
            })?;
            out.push(chunk);
        }
        Ok(out)
    }

    /// Stream every active embedding in ascending chunk-ID order. Returns the
    /// number of rows visited.
    pub fn for_each_active_embedding(&self, mut f: impl FnMut(u64, Vec<f32>)) -> Result<u64> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, e.vec
             FROM chunks c
             JOIN embeddings e ON e.chunk_id = c.id
             WHERE c.active = 1
             ORDER BY c.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut count = 0u64;
        for row in rows {
            let (id, blob) = row?;
            let id = i64_to_u64(id, "chunk id")?;
            let vec = decode_vector(&blob)
                .map_err(|source| StoreError::CorruptChunkVector { chunk_id: id, source })?;
            f(id, vec);
            count += 1;
        }
        Ok(count)
    }

    pub fn active_chunk_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks WHERE active = 1", [], |row| {
                row.get(0)
            })?;
        i64_to_u64(count, "active chunk count")
    }

    pub fn index_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Read an integer metadata value; absent or unparsable values come back
    /// as `None`.
    pub fn index_meta_usize(&self, key: &str) -> Result<Option<usize>> {
        Ok(self.index_meta(key)?.and_then(|v| v.parse().ok()))
    }

    /// Set metadata entries atomically across keys.
    pub fn set_index_meta(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Maintenance vacuum: physically delete soft-deleted chunks created
    /// before `cutoff_unix`, along with their embeddings. Returns the number
    /// of chunks removed.
    pub fn delete_inactive_chunks_older_than(&mut self, cutoff_unix: i64) -> Result<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN
               (SELECT id FROM chunks WHERE active = 0 AND created_at_unix < ?1)",
            params![cutoff_unix],
        )?;
        let deleted = tx.execute(
            "DELETE FROM chunks WHERE active = 0 AND created_at_unix < ?1",
            params![cutoff_unix],
        )?;
        tx.commit()?;
        Ok(deleted)
    }
}

/// An open write transaction covering one file's re-index. Dropping the
/// transaction without [`IndexTx::commit`] rolls everything back.
pub struct IndexTx<'conn> {
    tx: rusqlite::Transaction<'conn>,
    dim: usize,
}

impl IndexTx<'_> {
    /// Soft-delete every chunk belonging to `path`. Returns the number of
    /// chunks deactivated.
    pub fn mark_chunks_inactive(&self, path: &str) -> Result<usize> {
        Ok(self.tx.execute(
            "UPDATE chunks SET active = 0 WHERE path = ?1",
            params![path],
        )?)
    }

    /// Insert a chunk with a fresh ID, `active = true` and creation time now.
    pub fn insert_chunk(&self, chunk: &NewChunk) -> Result<u64> {
        let tags_json = encode_tags(&chunk.tags)?;
        self.tx.execute(
            "INSERT INTO chunks (path, heading_path, chunk_index, content, content_sha256,
                                 start_line, end_line, active, created_at_unix,
                                 status, scope, note_type, category_weight, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                chunk.path,
                chunk.heading_path,
                chunk.chunk_index,
                chunk.content,
                chunk.content_sha256,
                chunk.start_line,
                chunk.end_line,
                now_unix(),
                chunk.status,
                chunk.scope,
                chunk.note_type,
                chunk.category_weight,
                tags_json,
            ],
        )?;
        i64_to_u64(self.tx.last_insert_rowid(), "chunk id")
    }

    /// Insert the embedding for a chunk. `dim` must equal the store's
    /// configured dimension and the vector length.
    pub fn insert_embedding(&self, chunk_id: u64, dim: usize, vec: &[f32]) -> Result<()> {
        if dim != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: dim,
            });
        }
        if vec.len() != dim {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                actual: vec.len(),
            });
        }
        self.tx.execute(
            "INSERT INTO embeddings (chunk_id, dim, vec) VALUES (?1, ?2, ?3)",
            params![
                u64_to_i64(chunk_id, "chunk id")?,
                u64_to_i64(dim as u64, "dim")?,
                encode_vector(vec),
            ],
        )?;
        Ok(())
    }

    /// Insert or update the file tracking record.
    pub fn upsert_file(&self, record: &FileRecord) -> Result<()> {
        self.tx.execute(
            "INSERT INTO files (path, sha256, mtime_unix, indexed_at_unix)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
               sha256 = excluded.sha256,
               mtime_unix = excluded.mtime_unix,
               indexed_at_unix = excluded.indexed_at_unix",
            params![
                record.path,
                record.sha256,
                record.mtime_unix,
                record.indexed_at_unix
            ],
        )?;
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).map_err(|e| StoreError::InvalidDbValue(e.to_string()))
}

fn decode_tags(json: &str) -> Result<Vec<String>> {
    serde_json::from_str(json)
        .map_err(|e| StoreError::InvalidDbValue(format!("tags column: {e}")))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn u64_to_i64(value: u64, field: &'static str) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidDbValue(format!("{field} overflows i64")))
}

fn i64_to_u64(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::InvalidDbValue(format!("{field} is negative")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chunk(path: &str, index: u32, content: &str) -> NewChunk {
        NewChunk {
            path: path.to_string(),
            heading_path: "A > B".to_string(),
            chunk_index: index,
            content: content.to_string(),
            content_sha256: format!("hash-{index}"),
            start_line: 1,
            end_line: 3,
            status: "active".to_string(),
            scope: "personal".to_string(),
            note_type: "note".to_string(),
            category_weight: 1.0,
            tags: vec!["reference".to_string()],
        }
    }

    fn insert_with_embedding(store: &mut Store, path: &str, index: u32) -> u64 {
        let dim = store.dim();
        let tx = store.begin_index().unwrap();
        let id = tx.insert_chunk(&test_chunk(path, index, "hello world")).unwrap();
        let vec = vec![index as f32; dim];
        tx.insert_embedding(id, dim, &vec).unwrap();
        tx.commit().unwrap();
        id
    }

    #[test]
    fn file_record_round_trip() {
        let mut store = Store::open_in_memory(3).unwrap();
        assert!(store.file_record("a.md").unwrap().is_none());

        let record = FileRecord {
            path: "a.md".to_string(),
            sha256: "abc".to_string(),
            mtime_unix: 100,
            indexed_at_unix: 200,
        };
        let tx = store.begin_index().unwrap();
        tx.upsert_file(&record).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.file_record("a.md").unwrap(), Some(record.clone()));

        let updated = FileRecord {
            sha256: "def".to_string(),
            ..record
        };
        let tx = store.begin_index().unwrap();
        tx.upsert_file(&updated).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.file_record("a.md").unwrap(), Some(updated));
    }

    #[test]
    fn chunk_ids_are_monotonic_and_never_reused() {
        let mut store = Store::open_in_memory(3).unwrap();
        let first = insert_with_embedding(&mut store, "a.md", 0);
        let second = insert_with_embedding(&mut store, "a.md", 1);
        assert!(second > first);

        // Physically remove the newest row; AUTOINCREMENT must not hand its
        // ID back out.
        {
            let tx = store.begin_index().unwrap();
            tx.mark_chunks_inactive("a.md").unwrap();
            tx.commit().unwrap();
        }
        store.delete_inactive_chunks_older_than(i64::MAX).unwrap();
        let third = insert_with_embedding(&mut store, "a.md", 2);
        assert!(third > second);
    }

    #[test]
    fn mark_inactive_hides_chunks_from_reads() {
        let mut store = Store::open_in_memory(3).unwrap();
        let id = insert_with_embedding(&mut store, "a.md", 0);
        assert_eq!(store.active_chunk_count().unwrap(), 1);

        let tx = store.begin_index().unwrap();
        assert_eq!(tx.mark_chunks_inactive("a.md").unwrap(), 1);
        tx.commit().unwrap();

        assert_eq!(store.active_chunk_count().unwrap(), 0);
        assert!(store.chunks_by_ids(&[id]).unwrap().is_empty());
        let mut seen = 0;
        store.for_each_active_embedding(|_, _| seen += 1).unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn chunks_by_ids_omits_missing_and_decodes_fields() {
        let mut store = Store::open_in_memory(2).unwrap();
        let tx = store.begin_index().unwrap();
        let id = tx.insert_chunk(&test_chunk("b.md", 0, "content")).unwrap();
        tx.insert_embedding(id, 2, &[0.5, -0.5]).unwrap();
        tx.commit().unwrap();

        let chunks = store.chunks_by_ids(&[id, id + 1000]).unwrap();
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.id, id);
        assert_eq!(chunk.heading_path, "A > B");
        assert_eq!(chunk.tags, vec!["reference".to_string()]);
        assert_eq!(chunk.vector, vec![0.5, -0.5]);
    }

    #[test]
    fn streaming_is_ordered_by_ascending_id() {
        let mut store = Store::open_in_memory(1).unwrap();
        for i in 0..5 {
            insert_with_embedding(&mut store, "a.md", i);
        }
        let mut ids = Vec::new();
        let count = store.for_each_active_embedding(|id, _| ids.push(id)).unwrap();
        assert_eq!(count, 5);
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn insert_embedding_rejects_dimension_mismatch() {
        let mut store = Store::open_in_memory(4).unwrap();
        let tx = store.begin_index().unwrap();
        let id = tx.insert_chunk(&test_chunk("a.md", 0, "content")).unwrap();

        let err = tx.insert_embedding(id, 3, &[0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch { expected: 4, actual: 3 }
        ));

        let err = tx.insert_embedding(id, 4, &[0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch { expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut store = Store::open_in_memory(1).unwrap();
        {
            let tx = store.begin_index().unwrap();
            let id = tx.insert_chunk(&test_chunk("a.md", 0, "content")).unwrap();
            tx.insert_embedding(id, 1, &[1.0]).unwrap();
            // no commit
        }
        assert_eq!(store.active_chunk_count().unwrap(), 0);
    }

    #[test]
    fn corrupt_vector_surfaces_chunk_id() {
        let mut store = Store::open_in_memory(1).unwrap();
        let id = insert_with_embedding(&mut store, "a.md", 0);
        store
            .conn
            .execute(
                "UPDATE embeddings SET vec = X'0000FF' WHERE chunk_id = ?1",
                params![id as i64],
            )
            .unwrap();

        let err = store.chunks_by_ids(&[id]).unwrap_err();
        match err {
            StoreError::CorruptChunkVector { chunk_id, source } => {
                assert_eq!(chunk_id, id);
                assert_eq!(source.len, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn index_meta_set_is_atomic_across_keys() {
        let mut store = Store::open_in_memory(1).unwrap();
        assert!(store.index_meta("dim").unwrap().is_none());
        store
            .set_index_meta(&[
                ("dim", "768".to_string()),
                ("embedding_model_name", "nomic-embed-text".to_string()),
            ])
            .unwrap();
        assert_eq!(store.index_meta_usize("dim").unwrap(), Some(768));
        assert_eq!(
            store.index_meta("embedding_model_name").unwrap().as_deref(),
            Some("nomic-embed-text")
        );

        store.set_index_meta(&[("dim", "384".to_string())]).unwrap();
        assert_eq!(store.index_meta_usize("dim").unwrap(), Some(384));
    }

    #[test]
    fn vacuum_removes_only_old_inactive_chunks() {
        let mut store = Store::open_in_memory(1).unwrap();
        let inactive = insert_with_embedding(&mut store, "old.md", 0);
        let active = insert_with_embedding(&mut store, "new.md", 1);
        {
            let tx = store.begin_index().unwrap();
            tx.mark_chunks_inactive("old.md").unwrap();
            tx.commit().unwrap();
        }

        // Cutoff in the past removes nothing.
        assert_eq!(store.delete_inactive_chunks_older_than(0).unwrap(), 0);
        // Cutoff in the future removes the inactive chunk only.
        assert_eq!(store.delete_inactive_chunks_older_than(i64::MAX).unwrap(), 1);
        assert!(store.chunks_by_ids(&[inactive]).unwrap().is_empty());
        assert_eq!(store.chunks_by_ids(&[active]).unwrap().len(), 1);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/idx/notes.db");
        let store = Store::open(&path, 3).unwrap();
        assert_eq!(store.dim(), 3);
        assert!(path.exists());
    }
}
