//! Error taxonomy for the indexing and search pipeline.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CodeloomError>;

#[derive(Debug, thiserror::Error)]
pub enum CodeloomError {
    #[error("sqlite error opening {path}: {cause}")]
    Sqlite { path: PathBuf, cause: String },

    #[error("sqlite operation '{operation}' failed: {cause}")]
    Storage { operation: String, cause: String },

    #[error("failed to parse {path}: {cause}")]
    ParseFailed { path: PathBuf, cause: String },

    #[error("unsupported file extension: {extension}")]
    UnsupportedLanguage { extension: String },

    #[error("embedding request failed: {cause}")]
    EmbeddingFailed { cause: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error(
        "database at {path} ({db_size_bytes} bytes) is unsearchable: \
         codebases are registered but zero chunks are indexed ({cause})"
    )]
    Unsearchable {
        path: PathBuf,
        db_size_bytes: u64,
        cause: String,
    },

    #[error("invalid configuration field '{field}': {cause}")]
    Config { field: String, cause: String },

    #[error("failed to parse config file {path}: {cause}")]
    ConfigParse { path: PathBuf, cause: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodeloomError {
    pub fn sqlite(path: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        Self::Sqlite {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    pub fn storage(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}
