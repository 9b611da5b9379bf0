//! Language registry: maps file extensions to language descriptors.
//!
//! Each descriptor names the AST node kinds considered top-level definitions
//! and the subset of those considered splittable when oversized. Parser
//! handles are resolved once per process and cached read-only.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A single supported language: its canonical name, recognized extensions,
/// grammar handle, and the AST-kind vocabulary used by the chunker.
pub struct LanguageDescriptor {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub grammar: fn() -> tree_sitter::Language,
    pub top_level_kinds: &'static [&'static str],
    pub splittable_kinds: &'static [&'static str],
}

/// Recognized "body wrapper" node kinds that may contain member definitions
/// of an oversized splittable node.
pub const BODY_WRAPPER_KINDS: &[&str] = &[
    "class_body",
    "declaration_list",
    "field_declaration_list",
    "body_statement",
    "block",
];

macro_rules! lang {
    ($name:expr, $exts:expr, $grammar:expr, $top:expr, $split:expr) => {
        LanguageDescriptor {
            name: $name,
            extensions: $exts,
            grammar: $grammar,
            top_level_kinds: $top,
            splittable_kinds: $split,
        }
    };
}

static REGISTRY: &[LanguageDescriptor] = &[
    lang!(
        "rust",
        &["rs"],
        || tree_sitter_rust::LANGUAGE.into(),
        &[
            "function_item",
            "struct_item",
            "enum_item",
            "impl_item",
            "trait_item",
            "type_item",
            "const_item",
            "static_item",
            "macro_definition",
            "mod_item",
            "union_item",
        ],
        &["impl_item", "trait_item", "mod_item"]
    ),
    lang!(
        "c",
        &["c", "h"],
        || tree_sitter_c::LANGUAGE.into(),
        &["function_definition", "struct_specifier", "enum_specifier", "type_definition", "declaration"],
        &["struct_specifier"]
    ),
    lang!(
        "cpp",
        &["cpp", "cc", "cxx", "hpp", "hh"],
        || tree_sitter_cpp::LANGUAGE.into(),
        &[
            "function_definition",
            "class_specifier",
            "struct_specifier",
            "enum_specifier",
            "namespace_definition",
            "template_declaration",
            "type_definition",
        ],
        &["class_specifier", "struct_specifier", "namespace_definition", "template_declaration"]
    ),
    lang!(
        "go",
        &["go"],
        || tree_sitter_go::LANGUAGE.into(),
        &["function_declaration", "method_declaration", "type_declaration", "const_declaration", "var_declaration"],
        &["type_declaration"]
    ),
    lang!(
        "python",
        &["py"],
        || tree_sitter_python::LANGUAGE.into(),
        &["function_definition", "class_definition", "decorated_definition"],
        &["class_definition"]
    ),
    lang!(
        "zig",
        &["zig"],
        || tree_sitter_zig::LANGUAGE.into(),
        &["FnProto", "VarDecl", "TestDecl"],
        &[]
    ),
    lang!(
        "java",
        &["java"],
        || tree_sitter_java::LANGUAGE.into(),
        &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "method_declaration",
            "constructor_declaration",
            "record_declaration",
        ],
        &["class_declaration", "interface_declaration", "record_declaration"]
    ),
    lang!(
        "scala",
        &["scala"],
        || tree_sitter_scala::LANGUAGE.into(),
        &["function_definition", "class_definition", "object_definition", "trait_definition", "val_definition"],
        &["class_definition", "object_definition", "trait_definition"]
    ),
    lang!(
        "javascript",
        &["js", "jsx", "mjs", "cjs"],
        || tree_sitter_javascript::LANGUAGE.into(),
        &[
            "function_declaration",
            "class_declaration",
            "lexical_declaration",
            "export_statement",
            "method_definition",
        ],
        &["class_declaration"]
    ),
    lang!(
        "typescript",
        &["ts"],
        || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        &[
            "function_declaration",
            "class_declaration",
            "interface_declaration",
            "type_alias_declaration",
            "lexical_declaration",
            "export_statement",
            "enum_declaration",
        ],
        &["class_declaration"]
    ),
    lang!(
        "tsx",
        &["tsx"],
        || tree_sitter_typescript::LANGUAGE_TSX.into(),
        &[
            "function_declaration",
            "class_declaration",
            "interface_declaration",
            "type_alias_declaration",
            "lexical_declaration",
            "export_statement",
            "enum_declaration",
        ],
        &["class_declaration"]
    ),
    lang!(
        "php",
        &["php"],
        || tree_sitter_php::LANGUAGE_PHP.into(),
        &["function_definition", "class_declaration", "interface_declaration", "trait_declaration", "method_declaration"],
        &["class_declaration", "interface_declaration", "trait_declaration"]
    ),
    lang!(
        "ruby",
        &["rb"],
        || tree_sitter_ruby::LANGUAGE.into(),
        &["method", "singleton_method", "class", "module", "assignment"],
        &["class", "module"]
    ),
];

/// Process-wide, read-only parser artifact cache keyed by language name.
static LANGUAGE_CACHE: Lazy<HashMap<&'static str, tree_sitter::Language>> = Lazy::new(|| {
    REGISTRY
        .iter()
        .map(|descriptor| (descriptor.name, (descriptor.grammar)()))
        .collect()
});

/// Extension → descriptor lookup table, built once.
static EXTENSION_INDEX: Lazy<HashMap<&'static str, &'static LanguageDescriptor>> =
    Lazy::new(|| {
        let mut map = HashMap::new();
        for descriptor in REGISTRY {
            for ext in descriptor.extensions {
                map.insert(*ext, descriptor);
            }
        }
        map
    });

/// Look up a language descriptor by file extension (no leading dot).
pub fn descriptor_for_extension(extension: &str) -> Option<&'static LanguageDescriptor> {
    EXTENSION_INDEX.get(extension).copied()
}

/// Look up a language descriptor by its canonical registry name.
pub fn descriptor_for_language(name: &str) -> Option<&'static LanguageDescriptor> {
    REGISTRY.iter().find(|d| d.name == name)
}

/// Resolve the cached `tree_sitter::Language` handle for a descriptor.
pub fn language_handle(descriptor: &LanguageDescriptor) -> tree_sitter::Language {
    LANGUAGE_CACHE
        .get(descriptor.name)
        .cloned()
        .unwrap_or_else(|| (descriptor.grammar)())
}

impl LanguageDescriptor {
    pub fn is_splittable(&self, kind: &str) -> bool {
        self.splittable_kinds.contains(&kind)
    }

    pub fn is_top_level(&self, kind: &str) -> bool {
        self.top_level_kinds.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(descriptor_for_extension("rs").unwrap().name, "rust");
        assert_eq!(descriptor_for_extension("tsx").unwrap().name, "tsx");
        assert_eq!(descriptor_for_extension("rb").unwrap().name, "ruby");
    }

    #[test]
    fn unknown_extension_is_none() {
        assert!(descriptor_for_extension("bogus").is_none());
    }

    #[test]
    fn rust_impl_is_splittable() {
        let descriptor = descriptor_for_extension("rs").unwrap();
        assert!(descriptor.is_splittable("impl_item"));
        assert!(!descriptor.is_splittable("function_item"));
    }

    #[test]
    fn language_handles_are_cached_and_usable() {
        let descriptor = descriptor_for_extension("rs").unwrap();
        let language = language_handle(descriptor);
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&language).unwrap();
        let tree = parser.parse("fn main() {}", None).unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
    }
}
