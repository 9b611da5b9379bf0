//! Raw AST kind string → normalized `ChunkKind` classification.

use crate::types::ChunkKind;

/// Classify a raw tree-sitter node kind into the normalized vocabulary.
///
/// Exact-match language-specific variants are checked first, then a
/// substring match against the common vocabulary, falling back to the raw
/// kind string when nothing matches.
pub fn normalize_kind(raw: &str) -> ChunkKind {
    match raw {
        "namespace_definition" => return ChunkKind::Namespace,
        "template_declaration" => return ChunkKind::Template,
        "test_declaration" | "TestDecl" => return ChunkKind::Test,
        "record_declaration" => return ChunkKind::Record,
        "constructor_declaration" => return ChunkKind::Constructor,
        "object_definition" => return ChunkKind::Object,
        "lexical_declaration" | "variable_declaration" | "var_declaration" | "VarDecl" => {
            return ChunkKind::Variable
        }
        "type_alias_declaration" | "type_item" | "type_declaration" => return ChunkKind::Type,
        "const_item" | "const_declaration" => return ChunkKind::Const,
        "static_item" => return ChunkKind::Static,
        "macro_definition" => return ChunkKind::Macro,
        "mod_item" => return ChunkKind::Module,
        _ => {}
    }

    let substring_table: &[(&str, ChunkKind)] = &[
        ("function", ChunkKind::Function),
        ("struct", ChunkKind::Struct),
        ("enum", ChunkKind::Enum),
        ("impl", ChunkKind::Impl),
        ("trait", ChunkKind::Trait),
        ("interface", ChunkKind::Interface),
        ("class", ChunkKind::Class),
        ("method", ChunkKind::Method),
        ("macro", ChunkKind::Macro),
        ("mod", ChunkKind::Module),
    ];

    for (needle, kind) in substring_table {
        if raw.contains(needle) {
            return kind.clone();
        }
    }

    ChunkKind::Raw(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_variants() {
        assert_eq!(normalize_kind("namespace_definition"), ChunkKind::Namespace);
        assert_eq!(normalize_kind("template_declaration"), ChunkKind::Template);
        assert_eq!(normalize_kind("test_declaration"), ChunkKind::Test);
    }

    #[test]
    fn substring_match_variants() {
        assert_eq!(normalize_kind("function_item"), ChunkKind::Function);
        assert_eq!(normalize_kind("function_definition"), ChunkKind::Function);
        assert_eq!(normalize_kind("struct_item"), ChunkKind::Struct);
        assert_eq!(normalize_kind("impl_item"), ChunkKind::Impl);
        assert_eq!(normalize_kind("interface_declaration"), ChunkKind::Interface);
        assert_eq!(normalize_kind("method_declaration"), ChunkKind::Method);
    }

    #[test]
    fn unknown_kind_falls_back_to_raw() {
        assert_eq!(
            normalize_kind("weird_node_kind"),
            ChunkKind::Raw("weird_node_kind".to_string())
        );
    }
}
