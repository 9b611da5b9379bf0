//! Chunker: parses a file and emits one chunk per top-level definition,
//! decomposing oversized splittable nodes into their members.

pub mod kind;
pub mod naming;

use tree_sitter::Node;
use tree_sitter::Parser;

use crate::error::CodeloomError;
use crate::error::Result;
use crate::language::BODY_WRAPPER_KINDS;
use crate::language::LanguageDescriptor;
use crate::language::language_handle;
use crate::types::Chunk;

const OVERSIZE_LINE_THRESHOLD: usize = 150;

pub struct Chunker;

impl Chunker {
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` with `descriptor`'s grammar and emit chunks.
    pub fn chunk_file(
        &self,
        path: &str,
        content: &str,
        file_hash: &str,
        descriptor: &LanguageDescriptor,
    ) -> Result<Vec<Chunk>> {
        let mut parser = Parser::new();
        parser
            .set_language(&language_handle(descriptor))
            .map_err(|e| CodeloomError::ParseFailed {
                path: path.into(),
                cause: e.to_string(),
            })?;

        let tree = parser.parse(content, None).ok_or_else(|| CodeloomError::ParseFailed {
            path: path.into(),
            cause: "parser returned no tree".to_string(),
        })?;

        let source = content.as_bytes();
        let root = tree.root_node();
        let mut chunks = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if !descriptor.is_top_level(child.kind()) {
                continue;
            }
            emit_for_top_level(child, descriptor, path, file_hash, source, &mut chunks);
        }

        Ok(chunks)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Process one direct child of the root that is a recognized top-level kind:
/// unwrap export/decorator/template wrappers, then decide whether to split.
fn emit_for_top_level(
    outer: Node,
    descriptor: &LanguageDescriptor,
    path: &str,
    file_hash: &str,
    source: &[u8],
    chunks: &mut Vec<Chunk>,
) {
    let inner = match unwrap_node(outer, descriptor.name) {
        Some(inner) => inner,
        None => return, // export with no recognizable inner declaration
    };

    let start_line = outer.start_position().row as i32 + 1;
    let end_line = outer.end_position().row as i32 + 1;
    let line_span = (end_line - start_line + 1) as usize;

    if descriptor.is_splittable(inner.kind()) && line_span > OVERSIZE_LINE_THRESHOLD {
        let members = find_members(inner, descriptor);
        if !members.is_empty() {
            for member in members {
                chunks.push(build_chunk(member, member, descriptor, path, file_hash, source));
            }
            return;
        }
        // No recognized member children: fall back to whole-node chunk.
    }

    chunks.push(build_chunk(outer, inner, descriptor, path, file_hash, source));
}

/// Build a chunk whose line range/signature/snippet come from `range_node`
/// but whose name/kind are derived from `semantic_node` (for unwrapped
/// export/decorator/template nodes these differ; for plain nodes and split
/// members they're the same node).
fn build_chunk(
    range_node: Node,
    semantic_node: Node,
    descriptor: &LanguageDescriptor,
    path: &str,
    file_hash: &str,
    source: &[u8],
) -> Chunk {
    let start_line = range_node.start_position().row as i32 + 1;
    let end_line = range_node.end_position().row as i32 + 1;
    let snippet = range_node.utf8_text(source).unwrap_or("").to_string();
    let signature = snippet.lines().next().unwrap_or("").trim().to_string();
    let name = naming::extract_name(semantic_node, descriptor.name, source);
    let chunk_kind = kind::normalize_kind(semantic_node.kind());

    Chunk {
        codebase_id: 0, // filled in by the caller once the codebase id is known
        file_path: path.to_string(),
        language: descriptor.name.to_string(),
        kind: chunk_kind,
        name,
        signature,
        snippet,
        start_line,
        end_line,
        file_hash: file_hash.to_string(),
    }
}

/// Unwrap export statements (JS/TS/TSX), decorated definitions (Python), and
/// template declarations (C++) to find the inner declaration used for
/// naming, kind classification, and split decisions.
fn unwrap_node<'a>(outer: Node<'a>, language: &str) -> Option<Node<'a>> {
    match (language, outer.kind()) {
        ("javascript" | "typescript" | "tsx", "export_statement") => {
            outer.child_by_field_name("declaration").or(Some(outer)).filter(|inner| {
                // An export with no declaration field and no recognizable
                // default-exported function/class is dropped.
                inner.kind() != "export_statement"
            })
        }
        ("python", "decorated_definition") => outer
            .child_by_field_name("definition")
            .or_else(|| last_named_child(outer)),
        ("cpp", "template_declaration") => {
            let mut cursor = outer.walk();
            let found = outer.named_children(&mut cursor).find(|c| {
                matches!(
                    c.kind(),
                    "class_specifier" | "struct_specifier" | "function_definition"
                )
            });
            found
        }
        _ => Some(outer),
    }
}

fn last_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).last()
}

/// True when `kind` denotes a member definition: a function, method,
/// constructor, or any kind in the language's top-level set.
fn is_member_kind(descriptor: &LanguageDescriptor, kind: &str) -> bool {
    kind.contains("function")
        || kind.contains("method")
        || kind.contains("constructor")
        || descriptor.is_top_level(kind)
}

/// Find member definitions of an oversized splittable node, either directly
/// among its children or inside a recognized body-wrapper node.
fn find_members<'a>(inner: Node<'a>, descriptor: &LanguageDescriptor) -> Vec<Node<'a>> {
    let mut members = Vec::new();
    let mut cursor = inner.walk();
    for child in inner.named_children(&mut cursor) {
        if BODY_WRAPPER_KINDS.contains(&child.kind()) {
            let mut inner_cursor = child.walk();
            for grandchild in child.named_children(&mut inner_cursor) {
                if is_member_kind(descriptor, grandchild.kind()) {
                    members.push(grandchild);
                }
            }
        } else if is_member_kind(descriptor, child.kind()) {
            members.push(child);
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::descriptor_for_extension;

    fn chunk(source: &str, extension: &str) -> Vec<Chunk> {
        let descriptor = descriptor_for_extension(extension).unwrap();
        Chunker::new()
            .chunk_file("test.rs", source, "hash", descriptor)
            .unwrap()
    }

    #[test]
    fn single_small_function_is_one_chunk() {
        let source = "fn foo() {\n    1\n}\n";
        let chunks = chunk(source, "rs");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "foo");
        assert_eq!(chunks[0].kind.as_str(), "function");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn oversized_impl_splits_into_methods() {
        let mut body = String::new();
        for i in 0..5 {
            body.push_str(&format!("    fn m{i}(&self) {{\n"));
            for _ in 0..40 {
                body.push_str("        let _ = 1;\n");
            }
            body.push_str("    }\n");
        }
        let source = format!("impl Foo {{\n{body}}}\n");
        let chunks = chunk(&source, "rs");

        assert_eq!(chunks.len(), 5);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.name, format!("m{i}"));
            assert_eq!(c.kind.as_str(), "function");
        }
    }

    #[test]
    fn small_impl_is_not_split() {
        let source = "impl Foo {\n    fn m1(&self) {}\n}\n";
        let chunks = chunk(source, "rs");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "Foo");
        assert_eq!(chunks[0].kind.as_str(), "impl");
    }

    #[test]
    fn non_splittable_oversized_node_stays_whole() {
        let mut source = String::from("fn big() {\n");
        for _ in 0..200 {
            source.push_str("    let _ = 1;\n");
        }
        source.push_str("}\n");
        let chunks = chunk(&source, "rs");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "big");
        assert!(chunks[0].end_line - chunks[0].start_line + 1 > 150);
    }

    #[test]
    fn signature_is_first_line_trimmed() {
        let source = "pub fn foo(\n    a: i32,\n) -> i32 {\n    a\n}\n";
        let chunks = chunk(source, "rs");
        assert_eq!(chunks[0].signature, "pub fn foo(");
    }

    #[test]
    fn python_decorated_function_keeps_outer_range() {
        let source = "@decorator\ndef foo():\n    pass\n";
        let chunks = chunk(source, "py");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "foo");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert!(chunks[0].snippet.starts_with("@decorator"));
    }

    #[test]
    fn js_export_unwraps_for_naming_but_keeps_outer_range() {
        let source = "export function foo() {\n  return 1;\n}\n";
        let chunks = chunk(source, "js");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "foo");
        assert!(chunks[0].snippet.starts_with("export"));
    }

    #[test]
    fn chunk_key_is_stable_for_distinct_ranges() {
        let source = "fn a() {}\nfn b() {}\n";
        let chunks = chunk(source, "rs");
        assert_eq!(chunks.len(), 2);
        assert_ne!(chunks[0].chunk_key(), chunks[1].chunk_key());
    }
}
