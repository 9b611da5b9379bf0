//! Persistent storage: relational chunk/file metadata, per-codebase FTS5
//! text indices, and a global sqlite-vec vector index, all in one SQLite
//! file opened through `rusqlite`.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use zerocopy::AsBytes;

use crate::error::CodeloomError;
use crate::error::Result;
use crate::types::Chunk;
use crate::types::Codebase;
use crate::types::IndexedFile;
use crate::types::SearchResult;

const SCHEMA_VERSION: i64 = 1;

/// One file's worth of freshly-chunked content, staged for a single
/// transactional upsert.
pub struct FileChunks {
    pub file_path: String,
    pub file_hash: String,
    pub chunks: Vec<Chunk>,
}

/// A chunk whose embedding is missing or stale, returned by
/// `get_stale_embeddings` for the orchestrator to re-embed.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleEmbedding {
    pub chunk_key: String,
    pub name: String,
    pub signature: String,
    pub file_path: String,
    pub kind: String,
    pub snippet: String,
}

/// A freshly computed embedding to persist, keyed by chunk.
pub struct EmbeddingUpdate {
    pub chunk_key: String,
    pub embedding: Vec<f32>,
    pub model_name: String,
}

/// Summary used by the orchestrator's startup health check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthReport {
    pub db_size_bytes: u64,
    pub total_chunks: i64,
}

/// Quantize an embedding to 8-bit signed integers for `vec0` storage.
/// Values are clamped to `[-1.0, 1.0]` before scaling, matching a
/// cosine-normalized embedding's expected range.
fn quantize(embedding: &[f32]) -> Vec<i8> {
    embedding
        .iter()
        .map(|v| (v.clamp(-1.0, 1.0) * 127.0).round() as i8)
        .collect()
}

/// Owns the single SQLite connection backing a `codeloom` database.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    embedding_dimension: usize,
}

impl Store {
    /// Open (creating if absent) the database at `path` with vectors
    /// quantized to `embedding_dimension` components.
    pub fn open(path: &Path, embedding_dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // SAFETY: `sqlite3_vec_init` is the extension entry point exported by
        // the sqlite-vec crate; `sqlite3_auto_extension` requires exactly
        // this function-pointer cast, per the crate's documented usage.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }

        let conn = Connection::open(path).map_err(|e| CodeloomError::sqlite(path, e))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| CodeloomError::sqlite(path, e))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
            embedding_dimension,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Run `f` against the live connection, recovering from mutex poisoning
    /// rather than propagating it: a panic mid-operation leaves the SQLite
    /// connection itself intact, so the lock is still safe to reuse.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("store mutex was poisoned; recovering connection");
            poisoned.into_inner()
        });
        f(&guard)
    }

    fn init_schema(&self) -> Result<()> {
        let dimension = self.embedding_dimension;
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS codebases (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    root_path TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    indexed_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    codebase_id INTEGER NOT NULL REFERENCES codebases(id),
                    file_path TEXT NOT NULL,
                    chunk_key TEXT NOT NULL UNIQUE,
                    language TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    name TEXT NOT NULL,
                    signature TEXT NOT NULL,
                    snippet TEXT NOT NULL,
                    start_line INTEGER NOT NULL,
                    end_line INTEGER NOT NULL,
                    file_hash TEXT NOT NULL,
                    indexed_at INTEGER NOT NULL,
                    embedding_model TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_chunks_codebase_file
                    ON chunks(codebase_id, file_path);

                CREATE TABLE IF NOT EXISTS indexed_files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    codebase_id INTEGER NOT NULL REFERENCES codebases(id),
                    file_path TEXT NOT NULL,
                    file_hash TEXT NOT NULL,
                    chunk_count INTEGER NOT NULL,
                    indexed_at INTEGER NOT NULL,
                    UNIQUE(codebase_id, file_path)
                );

                CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
            )
            .map_err(|e| CodeloomError::storage("init_schema", e))?;

            let version: Option<i64> = conn
                .query_row("SELECT version FROM schema_version LIMIT 1", [], |r| r.get(0))
                .optional()
                .map_err(|e| CodeloomError::storage("read schema_version", e))?;
            match version {
                None => {
                    conn.execute("INSERT INTO schema_version(version) VALUES (?1)", params![SCHEMA_VERSION])
                        .map_err(|e| CodeloomError::storage("seed schema_version", e))?;
                }
                Some(v) if v != SCHEMA_VERSION => {
                    return Err(CodeloomError::Storage {
                        operation: "schema_version check".to_string(),
                        cause: format!("database schema version {v} is incompatible with {SCHEMA_VERSION}"),
                    });
                }
                Some(_) => {}
            }

            let vec_sql = format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
                    chunk_id INTEGER PRIMARY KEY,
                    embedding int8[{dimension}]
                )"
            );
            conn.execute_batch(&vec_sql)
                .map_err(|e| CodeloomError::storage("init vec_chunks", e))?;

            Ok(())
        })
    }

    pub fn get_or_create_codebase(&self, root_path: &str, name: &str, now: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM codebases WHERE root_path = ?1",
                    params![root_path],
                    |r| r.get(0),
                )
                .optional()
                .map_err(|e| CodeloomError::storage("get_or_create_codebase", e))?;
            if let Some(id) = existing {
                return Ok(id);
            }
            conn.execute(
                "INSERT INTO codebases(root_path, name, indexed_at) VALUES (?1, ?2, ?3)",
                params![root_path, name, now],
            )
            .map_err(|e| CodeloomError::storage("get_or_create_codebase", e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_file_hash(&self, codebase_id: i64, file_path: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT file_hash FROM indexed_files WHERE codebase_id = ?1 AND file_path = ?2",
                params![codebase_id, file_path],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| CodeloomError::storage("get_file_hash", e))
        })
    }

    /// One transaction: replace every file's chunks and refresh its
    /// `indexed_files` row. Conflict on `chunk_key` updates the chunk body
    /// and clears any embedding for it, since its content has changed.
    pub fn batch_upsert_all_file_chunks(
        &self,
        codebase_id: i64,
        files: &[FileChunks],
        now: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| CodeloomError::storage("batch_upsert_all_file_chunks/begin", e))?;

            for file in files {
                tx.execute(
                    "DELETE FROM chunks WHERE codebase_id = ?1 AND file_path = ?2",
                    params![codebase_id, file.file_path],
                )
                .map_err(|e| CodeloomError::storage("batch_upsert_all_file_chunks/delete", e))?;

                {
                    let mut insert = tx
                        .prepare_cached(
                            "INSERT INTO chunks
                                (codebase_id, file_path, chunk_key, language, kind, name,
                                 signature, snippet, start_line, end_line, file_hash, indexed_at, embedding_model)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL)
                             ON CONFLICT(chunk_key) DO UPDATE SET
                                file_path = excluded.file_path,
                                language = excluded.language,
                                kind = excluded.kind,
                                name = excluded.name,
                                signature = excluded.signature,
                                snippet = excluded.snippet,
                                start_line = excluded.start_line,
                                end_line = excluded.end_line,
                                file_hash = excluded.file_hash,
                                indexed_at = excluded.indexed_at,
                                embedding_model = NULL",
                        )
                        .map_err(|e| CodeloomError::storage("batch_upsert_all_file_chunks/prepare", e))?;

                    for chunk in &file.chunks {
                        let chunk_key = chunk.chunk_key();
                        insert
                            .execute(params![
                                codebase_id,
                                chunk.file_path,
                                chunk_key,
                                chunk.language,
                                chunk.kind.as_str(),
                                chunk.name,
                                chunk.signature,
                                chunk.snippet,
                                chunk.start_line,
                                chunk.end_line,
                                chunk.file_hash,
                                now,
                            ])
                            .map_err(|e| CodeloomError::storage("batch_upsert_all_file_chunks/insert", e))?;
                    }
                }

                tx.execute(
                    "INSERT INTO indexed_files(codebase_id, file_path, file_hash, chunk_count, indexed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(codebase_id, file_path) DO UPDATE SET
                        file_hash = excluded.file_hash,
                        chunk_count = excluded.chunk_count,
                        indexed_at = excluded.indexed_at",
                    params![codebase_id, file.file_path, file.file_hash, file.chunks.len() as i64, now],
                )
                .map_err(|e| CodeloomError::storage("batch_upsert_all_file_chunks/indexed_files", e))?;
            }

            tx.commit().map_err(|e| CodeloomError::storage("batch_upsert_all_file_chunks/commit", e))?;
            Ok(())
        })
    }

    /// Delete chunks and `indexed_files` rows for paths no longer present
    /// on disk. Returns the number of files removed.
    pub fn remove_stale_files(&self, codebase_id: i64, active_files: &HashSet<String>) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| CodeloomError::storage("remove_stale_files/begin", e))?;

            let stored_paths: Vec<String> = {
                let mut stmt = tx
                    .prepare("SELECT file_path FROM indexed_files WHERE codebase_id = ?1")
                    .map_err(|e| CodeloomError::storage("remove_stale_files/select", e))?;
                let rows = stmt
                    .query_map(params![codebase_id], |r| r.get::<_, String>(0))
                    .map_err(|e| CodeloomError::storage("remove_stale_files/select", e))?;
                let mut paths = Vec::new();
                for row in rows {
                    paths.push(row.map_err(|e| CodeloomError::storage("remove_stale_files/select", e))?);
                }
                paths
            };

            let stale: Vec<&String> = stored_paths.iter().filter(|p| !active_files.contains(p.as_str())).collect();

            for path in &stale {
                tx.execute(
                    "DELETE FROM chunks WHERE codebase_id = ?1 AND file_path = ?2",
                    params![codebase_id, path.as_str()],
                )
                .map_err(|e| CodeloomError::storage("remove_stale_files/delete_chunks", e))?;
                tx.execute(
                    "DELETE FROM indexed_files WHERE codebase_id = ?1 AND file_path = ?2",
                    params![codebase_id, path.as_str()],
                )
                .map_err(|e| CodeloomError::storage("remove_stale_files/delete_files", e))?;
            }

            tx.commit().map_err(|e| CodeloomError::storage("remove_stale_files/commit", e))?;
            Ok(stale.len())
        })
    }

    pub fn get_stale_embeddings(
        &self,
        codebase_id: i64,
        model_name: &str,
        limit: Option<i64>,
    ) -> Result<Vec<StaleEmbedding>> {
        self.with_conn(|conn| {
            let sql = "SELECT chunk_key, name, signature, file_path, kind, snippet FROM chunks
                       WHERE codebase_id = ?1 AND (embedding_model IS NULL OR embedding_model != ?2)";
            let mapper = |row: &rusqlite::Row| {
                Ok(StaleEmbedding {
                    chunk_key: row.get(0)?,
                    name: row.get(1)?,
                    signature: row.get(2)?,
                    file_path: row.get(3)?,
                    kind: row.get(4)?,
                    snippet: row.get(5)?,
                })
            };

            let mut out = Vec::new();
            if let Some(limit) = limit {
                let sql = format!("{sql} LIMIT ?3");
                let mut stmt = conn.prepare(&sql).map_err(|e| CodeloomError::storage("get_stale_embeddings", e))?;
                let rows = stmt
                    .query_map(params![codebase_id, model_name, limit], mapper)
                    .map_err(|e| CodeloomError::storage("get_stale_embeddings", e))?;
                for row in rows {
                    out.push(row.map_err(|e| CodeloomError::storage("get_stale_embeddings", e))?);
                }
            } else {
                let mut stmt = conn.prepare(sql).map_err(|e| CodeloomError::storage("get_stale_embeddings", e))?;
                let rows = stmt
                    .query_map(params![codebase_id, model_name], mapper)
                    .map_err(|e| CodeloomError::storage("get_stale_embeddings", e))?;
                for row in rows {
                    out.push(row.map_err(|e| CodeloomError::storage("get_stale_embeddings", e))?);
                }
            }
            Ok(out)
        })
    }

    pub fn batch_upsert_embeddings(&self, updates: &[EmbeddingUpdate]) -> Result<()> {
        let dimension = self.embedding_dimension;
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| CodeloomError::storage("batch_upsert_embeddings/begin", e))?;

            for update in updates {
                if update.embedding.len() != dimension {
                    return Err(CodeloomError::EmbeddingDimensionMismatch {
                        expected: dimension,
                        actual: update.embedding.len(),
                    });
                }

                let chunk_id: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM chunks WHERE chunk_key = ?1",
                        params![update.chunk_key],
                        |r| r.get(0),
                    )
                    .optional()
                    .map_err(|e| CodeloomError::storage("batch_upsert_embeddings/lookup", e))?;
                let Some(chunk_id) = chunk_id else { continue };

                let quantized = quantize(&update.embedding);
                tx.execute(
                    "INSERT OR REPLACE INTO vec_chunks(chunk_id, embedding) VALUES (?1, vec_int8(?2))",
                    params![chunk_id, quantized.as_bytes()],
                )
                .map_err(|e| CodeloomError::storage("batch_upsert_embeddings/vec", e))?;

                tx.execute(
                    "UPDATE chunks SET embedding_model = ?1 WHERE id = ?2",
                    params![update.model_name, chunk_id],
                )
                .map_err(|e| CodeloomError::storage("batch_upsert_embeddings/model", e))?;
            }

            tx.commit().map_err(|e| CodeloomError::storage("batch_upsert_embeddings/commit", e))?;
            Ok(())
        })
    }

    /// Drop and rebuild the per-codebase FTS5 text index from scratch.
    pub fn rebuild_fts_table(&self, codebase_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let table = format!("fts_{codebase_id}");
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .map_err(|e| CodeloomError::storage("rebuild_fts_table/drop", e))?;
            conn.execute_batch(&format!(
                "CREATE VIRTUAL TABLE {table} USING fts5(chunk_id UNINDEXED, name, signature, tokenize = 'unicode61')"
            ))
            .map_err(|e| CodeloomError::storage("rebuild_fts_table/create", e))?;

            conn.execute(
                &format!("INSERT INTO {table}(chunk_id, name, signature) SELECT id, name, signature FROM chunks WHERE codebase_id = ?1"),
                params![codebase_id],
            )
            .map_err(|e| CodeloomError::storage("rebuild_fts_table/populate", e))?;

            conn.execute(&format!("INSERT INTO {table}({table}) VALUES ('optimize')"), [])
                .map_err(|e| CodeloomError::storage("rebuild_fts_table/optimize", e))?;

            Ok(())
        })
    }

    /// Global cosine-similarity search against `vec_chunks`, across all
    /// codebases. Chunks without an embedding never match, and a chunk
    /// whose content changed since its last embed (`embedding_model`
    /// cleared on upsert, stale `vec_chunks` row left behind until the
    /// next embed pass overwrites it) is excluded too.
    pub fn vector_search(&self, query_embedding: &[f32], limit: i64, include_snippet: bool) -> Result<Vec<SearchResult>> {
        if query_embedding.len() != self.embedding_dimension {
            return Err(CodeloomError::EmbeddingDimensionMismatch {
                expected: self.embedding_dimension,
                actual: query_embedding.len(),
            });
        }
        let quantized = quantize(query_embedding);

        self.with_conn(|conn| {
            let has_vectors: bool = conn
                .query_row("SELECT EXISTS(SELECT 1 FROM vec_chunks LIMIT 1)", [], |r| r.get(0))
                .map_err(|e| CodeloomError::storage("vector_search/exists", e))?;
            if !has_vectors {
                return Ok(Vec::new());
            }

            let mut stmt = conn
                .prepare(
                    "SELECT c.chunk_key, c.file_path, c.name, c.kind, c.signature, c.snippet,
                            c.start_line, c.end_line, v.distance
                     FROM vec_chunks v
                     JOIN chunks c ON c.id = v.chunk_id
                     WHERE v.embedding MATCH vec_int8(?1) AND k = ?2 AND c.embedding_model IS NOT NULL
                     ORDER BY v.distance ASC",
                )
                .map_err(|e| CodeloomError::storage("vector_search/prepare", e))?;

            let rows = stmt
                .query_map(params![quantized.as_bytes(), limit], |row| {
                    let distance: f64 = row.get(8)?;
                    Ok(SearchResult {
                        chunk_key: row.get(0)?,
                        file_path: row.get(1)?,
                        name: row.get(2)?,
                        kind: row.get(3)?,
                        signature: row.get(4)?,
                        snippet: if include_snippet { row.get::<_, String>(5)? } else { String::new() },
                        start_line: row.get(6)?,
                        end_line: row.get(7)?,
                        score: (1.0 - distance) as f32,
                    })
                })
                .map_err(|e| CodeloomError::storage("vector_search/query", e))?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(|e| CodeloomError::storage("vector_search/row", e))?);
            }
            Ok(results)
        })
    }

    /// Text search across every codebase's FTS5 table, merged by score.
    /// Missing text tables/indices are treated as empty, not errors.
    pub fn fts_search(&self, query: &str, limit: i64, include_snippet: bool) -> Result<Vec<SearchResult>> {
        self.with_conn(|conn| {
            let codebase_ids: Vec<i64> = {
                let mut stmt = conn
                    .prepare("SELECT id FROM codebases")
                    .map_err(|e| CodeloomError::storage("fts_search/codebases", e))?;
                let rows = stmt
                    .query_map([], |r| r.get::<_, i64>(0))
                    .map_err(|e| CodeloomError::storage("fts_search/codebases", e))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row.map_err(|e| CodeloomError::storage("fts_search/codebases", e))?);
                }
                ids
            };

            let mut merged = Vec::new();
            for codebase_id in codebase_ids {
                let table = format!("fts_{codebase_id}");
                let exists: bool = conn
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        params![table],
                        |r| r.get::<_, i64>(0).map(|c| c > 0),
                    )
                    .map_err(|e| CodeloomError::storage("fts_search/table_exists", e))?;
                if !exists {
                    continue;
                }

                let sql = format!(
                    "SELECT c.chunk_key, c.file_path, c.name, c.kind, c.signature, c.snippet,
                            c.start_line, c.end_line, bm25({table}, 0.0, 5.0, 3.0) AS rank
                     FROM {table}
                     JOIN chunks c ON c.id = {table}.chunk_id
                     WHERE {table} MATCH ?1
                     ORDER BY rank
                     LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql).map_err(|e| CodeloomError::storage("fts_search/prepare", e))?;
                let rows = stmt
                    .query_map(params![query, limit], |row| {
                        let rank: f64 = row.get(8)?;
                        Ok(SearchResult {
                            chunk_key: row.get(0)?,
                            file_path: row.get(1)?,
                            name: row.get(2)?,
                            kind: row.get(3)?,
                            signature: row.get(4)?,
                            snippet: if include_snippet { row.get::<_, String>(5)? } else { String::new() },
                            start_line: row.get(6)?,
                            end_line: row.get(7)?,
                            score: -rank as f32,
                        })
                    })
                    .map_err(|e| CodeloomError::storage("fts_search/query", e))?;
                for row in rows {
                    merged.push(row.map_err(|e| CodeloomError::storage("fts_search/row", e))?);
                }
            }

            merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            merged.truncate(limit as usize);
            Ok(merged)
        })
    }

    pub fn list_codebases(&self) -> Result<Vec<Codebase>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, root_path, name, indexed_at FROM codebases ORDER BY id")
                .map_err(|e| CodeloomError::storage("list_codebases", e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Codebase {
                        id: row.get(0)?,
                        root_path: row.get(1)?,
                        name: row.get(2)?,
                        indexed_at: row.get(3)?,
                    })
                })
                .map_err(|e| CodeloomError::storage("list_codebases", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| CodeloomError::storage("list_codebases", e))?);
            }
            Ok(out)
        })
    }

    pub fn list_files(&self, codebase_id: Option<i64>) -> Result<Vec<IndexedFile>> {
        self.with_conn(|conn| {
            let mapper = |row: &rusqlite::Row| {
                Ok(IndexedFile {
                    codebase_id: row.get(0)?,
                    file_path: row.get(1)?,
                    file_hash: row.get(2)?,
                    chunk_count: row.get(3)?,
                    indexed_at: row.get(4)?,
                })
            };
            let mut out = Vec::new();
            if let Some(codebase_id) = codebase_id {
                let mut stmt = conn
                    .prepare("SELECT codebase_id, file_path, file_hash, chunk_count, indexed_at FROM indexed_files WHERE codebase_id = ?1")
                    .map_err(|e| CodeloomError::storage("list_files", e))?;
                let rows = stmt
                    .query_map(params![codebase_id], mapper)
                    .map_err(|e| CodeloomError::storage("list_files", e))?;
                for row in rows {
                    out.push(row.map_err(|e| CodeloomError::storage("list_files", e))?);
                }
            } else {
                let mut stmt = conn
                    .prepare("SELECT codebase_id, file_path, file_hash, chunk_count, indexed_at FROM indexed_files")
                    .map_err(|e| CodeloomError::storage("list_files", e))?;
                let rows = stmt.query_map([], mapper).map_err(|e| CodeloomError::storage("list_files", e))?;
                for row in rows {
                    out.push(row.map_err(|e| CodeloomError::storage("list_files", e))?);
                }
            }
            Ok(out)
        })
    }

    pub fn count_embedded_chunks(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks WHERE embedding_model IS NOT NULL", [], |r| r.get(0))
                .map_err(|e| CodeloomError::storage("count_embedded_chunks", e))
        })
    }

    pub fn touch_codebase(&self, codebase_id: i64, now: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE codebases SET indexed_at = ?1 WHERE id = ?2",
                params![now, codebase_id],
            )
            .map_err(|e| CodeloomError::storage("touch_codebase", e))?;
            Ok(())
        })
    }

    pub fn health_check(&self) -> Result<HealthReport> {
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        let total_chunks = self.with_conn(|conn| {
            conn.query_row("SELECT COALESCE(SUM(chunk_count), 0) FROM indexed_files", [], |r| r.get(0))
                .map_err(|e| CodeloomError::storage("health_check", e))
        })?;
        Ok(HealthReport { db_size_bytes, total_chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;

    fn test_chunk(file_path: &str, name: &str, start_line: i32) -> Chunk {
        Chunk {
            codebase_id: 0,
            file_path: file_path.to_string(),
            language: "rust".to_string(),
            kind: ChunkKind::Function,
            name: name.to_string(),
            signature: format!("fn {name}()"),
            snippet: format!("fn {name}() {{}}"),
            start_line,
            end_line: start_line,
            file_hash: "h1".to_string(),
        }
    }

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("db.sqlite"), 4).unwrap();
        (dir, store)
    }

    #[test]
    fn get_or_create_codebase_is_idempotent() {
        let (_dir, store) = open_store();
        let a = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let b = store.get_or_create_codebase("/repo", "repo", 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn upsert_then_get_file_hash_roundtrips() {
        let (_dir, store) = open_store();
        let codebase_id = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let files = vec![FileChunks {
            file_path: "a.rs".to_string(),
            file_hash: "h1".to_string(),
            chunks: vec![test_chunk("a.rs", "foo", 1)],
        }];
        store.batch_upsert_all_file_chunks(codebase_id, &files, 100).unwrap();

        assert_eq!(store.get_file_hash(codebase_id, "a.rs").unwrap(), Some("h1".to_string()));
        assert_eq!(store.list_files(Some(codebase_id)).unwrap().len(), 1);
    }

    #[test]
    fn remove_stale_files_deletes_untracked_paths() {
        let (_dir, store) = open_store();
        let codebase_id = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let files = vec![
            FileChunks { file_path: "a.rs".to_string(), file_hash: "h1".to_string(), chunks: vec![test_chunk("a.rs", "foo", 1)] },
            FileChunks { file_path: "b.rs".to_string(), file_hash: "h2".to_string(), chunks: vec![test_chunk("b.rs", "bar", 1)] },
        ];
        store.batch_upsert_all_file_chunks(codebase_id, &files, 100).unwrap();

        let active: HashSet<String> = ["a.rs".to_string()].into_iter().collect();
        let removed = store.remove_stale_files(codebase_id, &active).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list_files(Some(codebase_id)).unwrap().len(), 1);
    }

    #[test]
    fn stale_embeddings_then_upsert_clears_staleness() {
        let (_dir, store) = open_store();
        let codebase_id = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let files = vec![FileChunks { file_path: "a.rs".to_string(), file_hash: "h1".to_string(), chunks: vec![test_chunk("a.rs", "foo", 1)] }];
        store.batch_upsert_all_file_chunks(codebase_id, &files, 100).unwrap();

        let stale = store.get_stale_embeddings(codebase_id, "model-a", None).unwrap();
        assert_eq!(stale.len(), 1);

        store
            .batch_upsert_embeddings(&[EmbeddingUpdate {
                chunk_key: stale[0].chunk_key.clone(),
                embedding: vec![0.1, 0.2, 0.3, 0.4],
                model_name: "model-a".to_string(),
            }])
            .unwrap();

        let stale_after = store.get_stale_embeddings(codebase_id, "model-a", None).unwrap();
        assert!(stale_after.is_empty());
    }

    #[test]
    fn vector_search_finds_nearest_embedding() {
        let (_dir, store) = open_store();
        let codebase_id = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let files = vec![
            FileChunks { file_path: "a.rs".to_string(), file_hash: "h1".to_string(), chunks: vec![test_chunk("a.rs", "foo", 1)] },
            FileChunks { file_path: "b.rs".to_string(), file_hash: "h2".to_string(), chunks: vec![test_chunk("b.rs", "bar", 1)] },
        ];
        store.batch_upsert_all_file_chunks(codebase_id, &files, 100).unwrap();
        let stale = store.get_stale_embeddings(codebase_id, "model-a", None).unwrap();
        let updates: Vec<EmbeddingUpdate> = stale
            .iter()
            .map(|s| {
                let embedding = if s.name == "foo" { vec![1.0, 0.0, 0.0, 0.0] } else { vec![0.0, 1.0, 0.0, 0.0] };
                EmbeddingUpdate { chunk_key: s.chunk_key.clone(), embedding, model_name: "model-a".to_string() }
            })
            .collect();
        store.batch_upsert_embeddings(&updates).unwrap();

        let results = store.vector_search(&[1.0, 0.0, 0.0, 0.0], 5, true).unwrap();
        assert_eq!(results[0].name, "foo");
    }

    #[test]
    fn fts_search_matches_name_and_signature() {
        let (_dir, store) = open_store();
        let codebase_id = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let files = vec![FileChunks { file_path: "a.rs".to_string(), file_hash: "h1".to_string(), chunks: vec![test_chunk("a.rs", "calculate_total", 1)] }];
        store.batch_upsert_all_file_chunks(codebase_id, &files, 100).unwrap();
        store.rebuild_fts_table(codebase_id).unwrap();

        let results = store.fts_search("calculate_total", 5, false).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "calculate_total");
    }

    #[test]
    fn fts_search_tolerates_missing_tables() {
        let (_dir, store) = open_store();
        store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let results = store.fts_search("anything", 5, false).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn health_check_reports_chunk_total() {
        let (_dir, store) = open_store();
        let codebase_id = store.get_or_create_codebase("/repo", "repo", 1).unwrap();
        let files = vec![FileChunks { file_path: "a.rs".to_string(), file_hash: "h1".to_string(), chunks: vec![test_chunk("a.rs", "foo", 1)] }];
        store.batch_upsert_all_file_chunks(codebase_id, &files, 100).unwrap();

        let report = store.health_check().unwrap();
        assert_eq!(report.total_chunks, 1);
        assert!(report.db_size_bytes > 0);
    }
}
