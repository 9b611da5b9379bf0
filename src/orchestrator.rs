//! Top-level entry points: `index()` and `search()`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::chunk::Chunker;
use crate::config::CodeloomConfig;
use crate::embed::EmbeddingProvider;
use crate::embed::validate_embedding_batch;
use crate::error::CodeloomError;
use crate::error::Result;
use crate::language::descriptor_for_language;
use crate::scan::ScannedFile;
use crate::scan::scan;
use crate::search::fusion::RrfConfig;
use crate::search::fusion::fuse;
use crate::search::query::QueryMode;
use crate::search::query::preprocess;
use crate::store::EmbeddingUpdate;
use crate::store::FileChunks;
use crate::store::Store;
use crate::types::Codebase;
use crate::types::IndexOptions;
use crate::types::IndexResult;
use crate::types::IndexedFile;
use crate::types::SearchMode;
use crate::types::SearchOptions;
use crate::types::SearchResult;
use crate::types::build_embedding_input;

const UNSEARCHABLE_DB_SIZE_THRESHOLD: u64 = 1_000_000;

fn now_epoch() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Owns the store and embedder, and implements the indexing and search
/// pipelines over them.
pub struct Orchestrator {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: CodeloomConfig,
    health_checked: AtomicBool,
}

impl Orchestrator {
    pub fn new(config: CodeloomConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = Store::open(&config.data_dir, embedder.dimension())?;
        Ok(Self {
            store: Arc::new(store),
            embedder,
            config,
            health_checked: AtomicBool::new(false),
        })
    }

    pub fn list_codebases(&self) -> Result<Vec<Codebase>> {
        self.store.list_codebases()
    }

    pub fn list_files(&self, codebase_id: Option<i64>) -> Result<Vec<IndexedFile>> {
        self.store.list_files(codebase_id)
    }

    pub fn close(self) {
        // The store drops its connection when `self.store`'s last Arc does.
    }

    /// Run a blocking `Store` operation on tokio's blocking thread pool,
    /// keeping `rusqlite` calls off the async executor's worker threads.
    async fn blocking<F, T>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || f(&store)).await {
            Ok(result) => result,
            Err(e) => Err(CodeloomError::storage(operation, format!("blocking task panicked: {e}"))),
        }
    }

    /// Index `dir`: scan, hash-skip unchanged files, chunk and persist the
    /// rest in batches, re-embed stale chunks, drop files no longer on
    /// disk, and rebuild the text index.
    pub async fn index(&self, dir: &Path, options: IndexOptions) -> Result<IndexResult> {
        let started = Instant::now();
        let abs_dir = dir.canonicalize().map_err(CodeloomError::Io)?;
        let root_path = abs_dir.to_string_lossy().to_string();
        let name = abs_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root_path.clone());

        let (root_path_owned, name_owned) = (root_path.clone(), name.clone());
        let codebase_id = self
            .blocking("get_or_create_codebase", move |store| {
                store.get_or_create_codebase(&root_path_owned, &name_owned, now_epoch())
            })
            .await?;
        tracing::info!(codebase_id, root_path = %root_path, "scan");

        let scan_result = scan(&abs_dir);
        let mut errors = scan_result.errors;

        let candidates: Vec<ScannedFile> = match &options.languages {
            None => scan_result.files,
            Some(langs) => scan_result
                .files
                .into_iter()
                .filter(|f| langs.iter().any(|l| l == &f.language))
                .collect(),
        };

        let active_files: HashSet<String> = candidates.iter().map(|f| f.relative_path.clone()).collect();

        let mut to_process = Vec::new();
        let mut skipped = 0i32;
        for file in candidates {
            let relative_path = file.relative_path.clone();
            let stored_hash = self
                .blocking("get_file_hash", move |store| store.get_file_hash(codebase_id, &relative_path))
                .await?;
            if stored_hash.as_deref() == Some(file.content_hash.as_str()) {
                skipped += 1;
            } else {
                to_process.push(file);
            }
        }

        let mut files_processed = 0i32;
        let mut chunks_created = 0i32;
        let mut embedded = 0i32;
        let chunker = Chunker::new();

        for batch in to_process.chunks(self.config.indexing.batch_size.max(1) as usize) {
            let mut file_chunks = Vec::new();
            for file in batch {
                let descriptor = match descriptor_for_language(&file.language) {
                    Some(d) => d,
                    None => continue,
                };
                match chunker.chunk_file(&file.relative_path, &file.content, &file.content_hash, descriptor) {
                    Ok(mut chunks) => {
                        for chunk in &mut chunks {
                            chunk.codebase_id = codebase_id;
                        }
                        chunks_created += chunks.len() as i32;
                        file_chunks.push(FileChunks {
                            file_path: file.relative_path.clone(),
                            file_hash: file.content_hash.clone(),
                            chunks,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(path = %file.relative_path, error = %e, "chunk failed");
                        errors.push(format!("{}: {e}", file.relative_path));
                    }
                }
            }
            files_processed += file_chunks.len() as i32;

            if !file_chunks.is_empty() {
                let now = now_epoch();
                self.blocking("batch_upsert_all_file_chunks", move |store| {
                    store.batch_upsert_all_file_chunks(codebase_id, &file_chunks, now)
                })
                .await?;
            }

            let model_name = self.embedder.model_name().to_string();
            let stale = self
                .blocking("get_stale_embeddings", move |store| {
                    store.get_stale_embeddings(codebase_id, &model_name, None)
                })
                .await?;
            for sub_batch in stale.chunks(self.config.indexing.embed_batch_size.max(1) as usize) {
                let texts: Vec<String> = sub_batch
                    .iter()
                    .map(|s| build_embedding_input(&s.file_path, &s.kind, &s.name, &s.signature, &s.snippet))
                    .collect();
                let vectors = self.embedder.embed_many(&texts).await?;
                validate_embedding_batch(texts.len(), &vectors, self.embedder.dimension())?;

                let updates: Vec<EmbeddingUpdate> = sub_batch
                    .iter()
                    .zip(vectors.into_iter())
                    .map(|(stale_chunk, embedding)| EmbeddingUpdate {
                        chunk_key: stale_chunk.chunk_key.clone(),
                        embedding,
                        model_name: self.embedder.model_name().to_string(),
                    })
                    .collect();
                embedded += updates.len() as i32;
                self.blocking("batch_upsert_embeddings", move |store| store.batch_upsert_embeddings(&updates))
                    .await?;
            }
        }

        let removed = self
            .blocking("remove_stale_files", move |store| store.remove_stale_files(codebase_id, &active_files))
            .await? as i32;
        self.blocking("rebuild_fts_table", move |store| store.rebuild_fts_table(codebase_id)).await?;
        let now = now_epoch();
        self.blocking("touch_codebase", move |store| store.touch_codebase(codebase_id, now)).await?;

        tracing::info!(
            codebase_id,
            files = files_processed,
            chunks = chunks_created,
            embedded,
            skipped,
            removed,
            "index complete"
        );

        Ok(IndexResult {
            files: files_processed,
            chunks: chunks_created,
            embedded,
            skipped,
            removed,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run the one-time-per-process "unsearchable database" health check.
    async fn ensure_healthy(&self) -> Result<()> {
        if self.health_checked.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let report = self.blocking("health_check", |store| store.health_check()).await?;
        let has_codebases = !self.blocking("list_codebases", |store| store.list_codebases()).await?.is_empty();
        if report.db_size_bytes > UNSEARCHABLE_DB_SIZE_THRESHOLD && has_codebases && report.total_chunks == 0 {
            return Err(CodeloomError::Unsearchable {
                path: self.config.data_dir.clone(),
                db_size_bytes: report.db_size_bytes,
                cause: "database has registered codebases but zero indexed chunks; likely a stuck write-ahead log or concurrent lock".to_string(),
            });
        }
        Ok(())
    }

    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        self.ensure_healthy().await?;

        let mut results = match options.mode {
            SearchMode::Semantic => {
                let vectors = self.embedder.embed_many(&[query.to_string()]).await?;
                validate_embedding_batch(1, &vectors, self.embedder.dimension())?;
                let (limit, include_snippet) = (options.limit as i64, options.include_snippet);
                let embedding = vectors[0].clone();
                self.blocking("vector_search", move |store| {
                    store.vector_search(&embedding, limit, include_snippet)
                })
                .await?
            }
            SearchMode::Keyword => {
                let processed = preprocess(query, QueryMode::Keywords);
                if processed.is_empty() {
                    return Ok(Vec::new());
                }
                let (limit, include_snippet) = (options.limit as i64, options.include_snippet);
                self.blocking("fts_search", move |store| store.fts_search(&processed, limit, include_snippet))
                    .await?
            }
            SearchMode::Hybrid => {
                let candidate_limit = (options.limit as i64 * 4).max(20);
                let include_snippet = options.include_snippet;

                let processed = preprocess(query, QueryMode::Keywords);
                let text_results = if processed.is_empty() {
                    Vec::new()
                } else {
                    self.blocking("fts_search", move |store| {
                        store.fts_search(&processed, candidate_limit, include_snippet)
                    })
                    .await?
                };

                let vectors = self.embedder.embed_many(&[query.to_string()]).await?;
                validate_embedding_batch(1, &vectors, self.embedder.dimension())?;
                let embedding = vectors[0].clone();
                let vector_results = self
                    .blocking("vector_search", move |store| {
                        store.vector_search(&embedding, candidate_limit, include_snippet)
                    })
                    .await?;

                let rrf_config = RrfConfig {
                    k: self.config.search.rrf_k,
                    text_weight: self.config.search.text_weight,
                    vector_weight: self.config.search.vector_weight,
                };
                fuse(&text_results, &vector_results, rrf_config, options.limit as usize)
            }
        };

        results.retain(|r| r.score >= options.threshold);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbeddingProvider;
    use std::fs;

    fn make_orchestrator(data_dir: &Path) -> Orchestrator {
        let mut config = CodeloomConfig::default();
        config.data_dir = data_dir.to_path_buf();
        let embedder = Arc::new(HashingEmbeddingProvider::new(32));
        Orchestrator::new(config, embedder).unwrap()
    }

    #[tokio::test]
    async fn index_then_keyword_search_finds_function() {
        let scratch = tempfile::TempDir::new().unwrap();
        fs::write(scratch.path().join("a.rs"), "fn foo() {\n    1\n}\n").unwrap();
        let db = tempfile::TempDir::new().unwrap();
        let orchestrator = make_orchestrator(&db.path().join("db.sqlite"));

        let result = orchestrator.index(scratch.path(), IndexOptions::default()).await.unwrap();
        assert_eq!(result.files, 1);
        assert_eq!(result.chunks, 1);
        assert_eq!(result.embedded, 1);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.removed, 0);

        let results = orchestrator
            .search("foo", SearchOptions { mode: SearchMode::Keyword, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "foo");
        assert_eq!(results[0].kind, "function");
        assert_eq!(results[0].start_line, 1);
        assert_eq!(results[0].end_line, 3);
    }

    #[tokio::test]
    async fn reindexing_unchanged_tree_skips_everything() {
        let scratch = tempfile::TempDir::new().unwrap();
        fs::write(scratch.path().join("a.rs"), "fn foo() {}\n").unwrap();
        let db = tempfile::TempDir::new().unwrap();
        let orchestrator = make_orchestrator(&db.path().join("db.sqlite"));

        orchestrator.index(scratch.path(), IndexOptions::default()).await.unwrap();
        let second = orchestrator.index(scratch.path(), IndexOptions::default()).await.unwrap();

        assert_eq!(second.files, 0);
        assert_eq!(second.chunks, 0);
        assert_eq!(second.embedded, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.removed, 0);
    }

    #[tokio::test]
    async fn deleting_a_file_and_reindexing_removes_it() {
        let scratch = tempfile::TempDir::new().unwrap();
        let file_path = scratch.path().join("a.rs");
        fs::write(&file_path, "fn foo() {}\n").unwrap();
        let db = tempfile::TempDir::new().unwrap();
        let orchestrator = make_orchestrator(&db.path().join("db.sqlite"));

        orchestrator.index(scratch.path(), IndexOptions::default()).await.unwrap();
        fs::remove_file(&file_path).unwrap();
        let result = orchestrator.index(scratch.path(), IndexOptions::default()).await.unwrap();

        assert_eq!(result.files, 0);
        assert_eq!(result.removed, 1);

        let results = orchestrator
            .search("foo", SearchOptions { mode: SearchMode::Keyword, ..Default::default() })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn ignored_directories_are_skipped() {
        let scratch = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(scratch.path().join("src")).unwrap();
        fs::write(scratch.path().join("src/a.rs"), "fn keep() {}\n").unwrap();
        fs::create_dir_all(scratch.path().join("node_modules")).unwrap();
        fs::write(scratch.path().join("node_modules/b.rs"), "fn drop() {}\n").unwrap();
        let db = tempfile::TempDir::new().unwrap();
        let orchestrator = make_orchestrator(&db.path().join("db.sqlite"));

        let result = orchestrator.index(scratch.path(), IndexOptions::default()).await.unwrap();
        assert_eq!(result.files, 1);
    }
}
