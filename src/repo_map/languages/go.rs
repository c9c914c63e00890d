//! Go 语言规则

use super::LanguageSpec;

pub static GO: LanguageSpec = LanguageSpec {
    name: "go",
    extensions: &["go"],
    grammar: tree_sitter_go::language,
    definition_kinds: &[
        "function_declaration",
        "method_declaration",
        "type_spec",
        "type_alias",
        "const_spec",
        "var_spec",
    ],
    identifier_kinds: &[
        "identifier",
        "type_identifier",
        "field_identifier",
        "package_identifier",
    ],
    top_level_assignments: &[],
};
