//! Per-language, per-node-kind name extraction.
//!
//! Rules are tried in a fixed per-language order; the first rule that
//! produces a non-empty name wins, falling through to a generic
//! name/identifier/type_identifier field lookup.

use tree_sitter::Node;

fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("").trim()
}

fn first_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).find(|c| c.kind() == kind);
    result
}

/// Extract the best-effort name for `node`, given its language and the raw
/// source bytes. Returns an empty string if no rule applies.
pub fn extract_name(node: Node, language: &str, source: &[u8]) -> String {
    let kind = node.kind();

    match language {
        "ruby" => {
            if kind == "singleton_method" {
                if let (Some(object), Some(name)) =
                    (node.child_by_field_name("object"), node.child_by_field_name("name"))
                {
                    return format!("{}.{}", node_text(object, source), node_text(name, source));
                }
            }
            if kind == "assignment" {
                if let Some(lhs) = node.child_by_field_name("left") {
                    return node_text(lhs, source).to_string();
                }
            }
        }
        "c" => {
            if kind == "function_definition" {
                if let Some(declarator) = node.child_by_field_name("declarator") {
                    let inner = declarator
                        .child_by_field_name("declarator")
                        .unwrap_or(declarator);
                    let text = node_text(inner, source);
                    if !text.is_empty() {
                        return text.to_string();
                    }
                }
            }
            if kind == "type_definition" {
                if let Some(ident) = first_child_of_kind(node, "type_identifier") {
                    return node_text(ident, source).to_string();
                }
            }
        }
        "go" => {
            if kind == "method_declaration" {
                if let (Some(receiver), Some(name)) = (
                    node.child_by_field_name("receiver"),
                    node.child_by_field_name("name"),
                ) {
                    // `receiver` is the whole `(r *Repo)` parameter_list; the
                    // bare receiver identifier is its one parameter_declaration's
                    // own "name" field.
                    if let Some(param) = first_child_of_kind(receiver, "parameter_declaration") {
                        if let Some(receiver_name) = param.child_by_field_name("name") {
                            return format!(
                                "{}.{}",
                                node_text(receiver_name, source),
                                node_text(name, source)
                            );
                        }
                    }
                }
            }
            if matches!(
                kind,
                "type_declaration" | "const_declaration" | "var_declaration"
            ) {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind().ends_with("_spec") {
                        if let Some(name) = child.child_by_field_name("name") {
                            return node_text(name, source).to_string();
                        }
                    }
                }
            }
        }
        "scala" => {
            if kind == "val_definition" {
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    return node_text(pattern, source).to_string();
                }
            }
        }
        "zig" => {
            if kind == "VarDecl" {
                let mut cursor = node.walk();
                let found = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "IDENTIFIER" || c.kind() == "identifier");
                if let Some(ident) = found {
                    return node_text(ident, source).to_string();
                }
            }
            if kind == "TestDecl" {
                let mut cursor = node.walk();
                let found = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "STRINGLITERALSINGLE" || c.kind() == "string");
                if let Some(string_node) = found {
                    let text = node_text(string_node, source);
                    return text.trim_matches('"').to_string();
                }
            }
        }
        "rust" => {
            if kind == "impl_item" {
                if let Some(ty) = node.child_by_field_name("type") {
                    let type_name = node_text(ty, source);
                    if let Some(trait_ref) = node.child_by_field_name("trait") {
                        return format!("{} for {}", node_text(trait_ref, source), type_name);
                    }
                    return type_name.to_string();
                }
            }
        }
        "javascript" | "typescript" | "tsx" => {
            if kind == "lexical_declaration" {
                if let Some(declarator) = first_child_of_kind(node, "variable_declarator") {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        return node_text(name, source).to_string();
                    }
                }
            }
        }
        _ => {}
    }

    // Generic fallback: first non-empty of name/identifier/type_identifier
    // child *fields*.
    for field in ["name", "identifier", "type_identifier"] {
        if let Some(child) = node.child_by_field_name(field) {
            let text = node_text(child, source);
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }

    String::new()
}
