//! JavaScript 语言规则

use super::LanguageSpec;

pub static JAVASCRIPT: LanguageSpec = LanguageSpec {
    name: "javascript",
    extensions: &["js", "jsx", "mjs", "cjs"],
    grammar: tree_sitter_javascript::language,
    definition_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "class_declaration",
        "method_definition",
        "variable_declarator",
    ],
    identifier_kinds: &[
        "identifier",
        "property_identifier",
        "shorthand_property_identifier",
    ],
    top_level_assignments: &[],
};
