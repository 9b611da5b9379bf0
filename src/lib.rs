//! codeloom: a local, embedded code-search engine. AST-aware chunking of
//! polyglot source, incremental hash-based re-indexing, and hybrid
//! text+vector retrieval over a single SQLite file.

pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod scan;
pub mod search;
pub mod store;
pub mod types;

pub use config::CodeloomConfig;
pub use embed::EmbeddingProvider;
pub use embed::HashingEmbeddingProvider;
pub use error::CodeloomError;
pub use error::Result;
pub use orchestrator::Orchestrator;
pub use types::Chunk;
pub use types::Codebase;
pub use types::IndexOptions;
pub use types::IndexResult;
pub use types::IndexedFile;
pub use types::SearchMode;
pub use types::SearchOptions;
pub use types::SearchResult;
