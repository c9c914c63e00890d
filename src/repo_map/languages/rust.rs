//! Rust 语言规则

use super::LanguageSpec;

pub static RUST: LanguageSpec = LanguageSpec {
    name: "rust",
    extensions: &["rs"],
    grammar: tree_sitter_rust::language,
    definition_kinds: &[
        "function_item",
        "function_signature_item",
        "struct_item",
        "enum_item",
        "union_item",
        "trait_item",
        "type_item",
        "const_item",
        "static_item",
        "mod_item",
        "macro_definition",
        "enum_variant",
    ],
    identifier_kinds: &["identifier", "type_identifier", "field_identifier"],
    top_level_assignments: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo_map::extractor::extract_source;
    use crate::repo_map::TagKind;
    use std::path::Path;

    #[test]
    fn test_rust_definitions_and_references() {
        let source = r#"
pub struct User {
    name: String,
}

impl User {
    pub fn greet(&self) -> String {
        format_name(&self.name)
    }
}

fn format_name(name: &str) -> String {
    name.to_string()
}
"#;
        let tags = extract_source(&RUST, source, Path::new("/p/user.rs"), "user.rs").unwrap();

        let defs: Vec<_> = tags
            .iter()
            .filter(|t| t.kind == TagKind::Definition)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(defs, vec!["User", "greet", "format_name"]);

        // impl User 与函数调用都算作引用
        assert!(tags
            .iter()
            .any(|t| t.kind == TagKind::Reference && t.name == "User" && t.line == 5));
        assert!(tags
            .iter()
            .any(|t| t.kind == TagKind::Reference && t.name == "format_name"));
    }

    #[test]
    fn test_rust_enum_variants() {
        let source = "enum Mode { Fast, Slow }\n";
        let tags = extract_source(&RUST, source, Path::new("/p/m.rs"), "m.rs").unwrap();
        let defs: Vec<_> = tags
            .iter()
            .filter(|t| t.kind == TagKind::Definition)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(defs, vec!["Mode", "Fast", "Slow"]);
    }
}
