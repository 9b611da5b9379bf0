//! Core data types shared across the indexing and search pipeline.

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// A registered root directory under which source files are indexed as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codebase {
    pub id: i64,
    pub root_path: String,
    pub name: String,
    pub indexed_at: i64,
}

/// One row per source file within a codebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub codebase_id: i64,
    pub file_path: String,
    pub file_hash: String,
    pub chunk_count: i32,
    pub indexed_at: i64,
}

/// Normalized chunk kind classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Function,
    Struct,
    Enum,
    Impl,
    Trait,
    Type,
    Const,
    Static,
    Macro,
    Namespace,
    Template,
    Module,
    Class,
    Method,
    Interface,
    Variable,
    Declaration,
    Test,
    Object,
    Record,
    Constructor,
    /// The raw AST kind string, when no normalized variant applies.
    Raw(String),
}

impl ChunkKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Struct => "struct",
            ChunkKind::Enum => "enum",
            ChunkKind::Impl => "impl",
            ChunkKind::Trait => "trait",
            ChunkKind::Type => "type",
            ChunkKind::Const => "const",
            ChunkKind::Static => "static",
            ChunkKind::Macro => "macro",
            ChunkKind::Namespace => "namespace",
            ChunkKind::Template => "template",
            ChunkKind::Module => "module",
            ChunkKind::Class => "class",
            ChunkKind::Method => "method",
            ChunkKind::Interface => "interface",
            ChunkKind::Variable => "variable",
            ChunkKind::Declaration => "declaration",
            ChunkKind::Test => "test",
            ChunkKind::Object => "object",
            ChunkKind::Record => "record",
            ChunkKind::Constructor => "constructor",
            ChunkKind::Raw(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of retrieval: one top-level definition extracted from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub codebase_id: i64,
    pub file_path: String,
    pub language: String,
    pub kind: ChunkKind,
    pub name: String,
    pub signature: String,
    pub snippet: String,
    pub start_line: i32,
    pub end_line: i32,
    pub file_hash: String,
}

impl Chunk {
    /// The globally unique `{file_path}:{start_line}:{end_line}` identifier.
    pub fn chunk_key(&self) -> String {
        format!("{}:{}:{}", self.file_path, self.start_line, self.end_line)
    }

    /// Plain-text embedding input:
    /// `{file_path}[: {kind} {name}]\n{signature}\n{first 500 chars of snippet}`.
    pub fn embedding_input(&self) -> String {
        build_embedding_input(&self.file_path, self.kind.as_str(), &self.name, &self.signature, &self.snippet)
    }
}

/// Build the plain-text embedding input shared by freshly chunked `Chunk`s
/// and stale-embedding rows read back from storage.
pub fn build_embedding_input(file_path: &str, kind: &str, name: &str, signature: &str, snippet: &str) -> String {
    let mut out = file_path.to_string();
    if !name.is_empty() {
        out.push_str(&format!(": {kind} {name}"));
    }
    if !signature.is_empty() {
        out.push('\n');
        out.push_str(signature);
    }
    if !snippet.is_empty() {
        out.push('\n');
        let truncated: String = snippet.chars().take(500).collect();
        out.push_str(&truncated);
    }
    out
}

/// Compute the SHA-256 hex digest of file content.
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(digest)
}

/// A result row returned by the store or the orchestrator's search path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub chunk_key: String,
    pub file_path: String,
    pub name: String,
    pub kind: String,
    pub signature: String,
    #[serde(default)]
    pub snippet: String,
    pub start_line: i32,
    pub end_line: i32,
    pub score: f32,
}

/// Outcome of a single `index()` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexResult {
    pub files: i32,
    pub chunks: i32,
    pub embedded: i32,
    pub skipped: i32,
    pub removed: i32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Search dispatch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Semantic
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// Options accepted by `Orchestrator::search`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: i32,
    pub threshold: f32,
    pub include_snippet: bool,
    pub mode: SearchMode,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            threshold: 0.0,
            include_snippet: false,
            mode: SearchMode::Semantic,
        }
    }
}

/// Options accepted by `Orchestrator::index`.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub languages: Option<Vec<String>>,
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(name: &str, signature: &str, snippet: &str) -> Chunk {
        Chunk {
            codebase_id: 1,
            file_path: "src/lib.rs".to_string(),
            language: "rust".to_string(),
            kind: ChunkKind::Function,
            name: name.to_string(),
            signature: signature.to_string(),
            snippet: snippet.to_string(),
            start_line: 1,
            end_line: 3,
            file_hash: "deadbeef".to_string(),
        }
    }

    #[test]
    fn chunk_key_format() {
        let chunk = make_chunk("foo", "fn foo() {", "fn foo() {\n}\n");
        assert_eq!(chunk.chunk_key(), "src/lib.rs:1:3");
    }

    #[test]
    fn embedding_input_omits_empty_fields() {
        let mut chunk = make_chunk("", "", "");
        assert_eq!(chunk.embedding_input(), "src/lib.rs");

        chunk.name = "foo".to_string();
        assert_eq!(chunk.embedding_input(), "src/lib.rs: function foo");
    }

    #[test]
    fn embedding_input_truncates_snippet_to_500_chars() {
        let long_snippet = "x".repeat(600);
        let chunk = make_chunk("foo", "sig", &long_snippet);
        let input = chunk.embedding_input();
        // file_path + ": function foo" + "\n" + "sig" + "\n" + 500 x's
        let tail: String = input.chars().rev().take(500).collect::<Vec<_>>().into_iter().rev().collect();
        assert_eq!(tail, "x".repeat(500));
    }

    #[test]
    fn content_hash_is_deterministic() {
        let a = content_hash(b"fn main() {}");
        let b = content_hash(b"fn main() {}");
        let c = content_hash(b"fn main() { }");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn search_mode_parses() {
        assert_eq!("semantic".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("bogus".parse::<SearchMode>().is_err());
    }
}
