//! Directory scanner: walks a root, applies ignore rules, hashes content.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use crate::language::descriptor_for_extension;
use crate::types::content_hash;

/// A single file accepted by the scanner, ready for chunking.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub language: String,
    pub content_hash: String,
    pub content: String,
}

/// Result of a single scan pass.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    /// Non-fatal per-entry errors (unreadable file/dir), human-readable.
    pub errors: Vec<String>,
}

const HARD_IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "build",
    "dist",
    ".next",
    "__pycache__",
    ".tox",
    ".venv",
    "venv",
    ".mypy_cache",
    ".cargo",
    ".rustup",
];

const MAX_FILE_SIZE_BYTES: u64 = 1_000_000;

/// Scan `root` recursively, returning accepted files and non-fatal errors.
pub fn scan(root: &Path) -> ScanResult {
    let mut result = ScanResult::default();
    let gitignore_dirs = read_gitignore_dir_patterns(root);

    let mut ignore_dirs: HashSet<&str> = HARD_IGNORE_DIRS.iter().copied().collect();
    let extra: HashSet<String> = gitignore_dirs.into_iter().collect();
    for name in &extra {
        ignore_dirs.insert(name.as_str());
    }

    walk(root, root, &ignore_dirs, &mut result);
    result
}

fn walk(root: &Path, dir: &Path, ignore_dirs: &HashSet<&str>, result: &mut ScanResult) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            result
                .errors
                .push(format!("failed to read directory {}: {e}", dir.display()));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                result
                    .errors
                    .push(format!("failed to read entry in {}: {e}", dir.display()));
                continue;
            }
        };
        let path = entry.path();
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };

        // Hidden entries are rejected, except the root itself.
        if path != root && file_name.starts_with('.') {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                result
                    .errors
                    .push(format!("failed to stat {}: {e}", path.display()));
                continue;
            }
        };

        if file_type.is_dir() {
            if ignore_dirs.contains(file_name) {
                continue;
            }
            walk(root, &path, ignore_dirs, result);
            continue;
        }

        if !file_type.is_file() {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let descriptor = match descriptor_for_extension(extension) {
            Some(descriptor) => descriptor,
            None => continue,
        };

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                result
                    .errors
                    .push(format!("failed to stat {}: {e}", path.display()));
                continue;
            }
        };
        let size = metadata.len();
        if size == 0 || size > MAX_FILE_SIZE_BYTES {
            continue;
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                result
                    .errors
                    .push(format!("failed to read {}: {e}", path.display()));
                continue;
            }
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                result
                    .errors
                    .push(format!("{} is not valid UTF-8", path.display()));
                continue;
            }
        };

        let hash = content_hash(content.as_bytes());
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        result.files.push(ScannedFile {
            absolute_path: path,
            relative_path,
            language: descriptor.name.to_string(),
            content_hash: hash,
            content,
        });
    }
}

/// Parse simple directory-name patterns (no wildcards, optional trailing
/// slash) out of the root `.gitignore`.
fn read_gitignore_dir_patterns(root: &Path) -> Vec<String> {
    let path = root.join(".gitignore");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| !line.contains('*') && !line.contains('/') || line.ends_with('/'))
        .map(|line| line.trim_end_matches('/').to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_accepts_known_extension_and_skips_unknown() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let result = scan(dir.path());
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].relative_path, "a.rs");
        assert_eq!(result.files[0].language, "rust");
    }

    #[test]
    fn scan_skips_hidden_and_hardcoded_ignore_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/b.rs"), "fn b() {}").unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden/c.rs"), "fn c() {}").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.rs"), "fn a() {}").unwrap();

        let result = scan(dir.path());
        assert_eq!(result.files.len(), 1);
        assert_eq!(
            PathBuf::from(&result.files[0].relative_path),
            PathBuf::from("src").join("a.rs")
        );
    }

    #[test]
    fn scan_skips_empty_and_oversized_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("empty.rs"), "").unwrap();
        fs::write(dir.path().join("big.rs"), "x".repeat(2_000_000)).unwrap();
        fs::write(dir.path().join("ok.rs"), "fn ok() {}").unwrap();

        let result = scan(dir.path());
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].relative_path, "ok.rs");
    }

    #[test]
    fn scan_respects_gitignore_directory_patterns() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "vendor\n").unwrap();
        fs::create_dir(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/d.rs"), "fn d() {}").unwrap();
        fs::write(dir.path().join("keep.rs"), "fn keep() {}").unwrap();

        let result = scan(dir.path());
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].relative_path, "keep.rs");
    }
}
