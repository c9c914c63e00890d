//! TypeScript / TSX 语言规则

use super::LanguageSpec;

const TS_DEFINITIONS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_signature",
    "class_declaration",
    "abstract_class_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
    "method_definition",
    "method_signature",
    "abstract_method_signature",
    "variable_declarator",
];

const TS_IDENTIFIERS: &[&str] = &[
    "identifier",
    "type_identifier",
    "property_identifier",
    "shorthand_property_identifier",
];

pub static TYPESCRIPT: LanguageSpec = LanguageSpec {
    name: "typescript",
    extensions: &["ts", "mts", "cts"],
    grammar: tree_sitter_typescript::language_typescript,
    definition_kinds: TS_DEFINITIONS,
    identifier_kinds: TS_IDENTIFIERS,
    top_level_assignments: &[],
};

pub static TSX: LanguageSpec = LanguageSpec {
    name: "tsx",
    extensions: &["tsx"],
    grammar: tree_sitter_typescript::language_tsx,
    definition_kinds: TS_DEFINITIONS,
    identifier_kinds: TS_IDENTIFIERS,
    top_level_assignments: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo_map::extractor::extract_source;
    use crate::repo_map::TagKind;
    use std::path::Path;

    #[test]
    fn test_typescript_types() {
        let source = r#"
export interface User {
  id: number;
}

export type UserId = User["id"];

export function findUser(id: UserId): User | undefined {
  return undefined;
}
"#;
        let tags =
            extract_source(&TYPESCRIPT, source, Path::new("/p/user.ts"), "user.ts").unwrap();

        let defs: Vec<_> = tags
            .iter()
            .filter(|t| t.kind == TagKind::Definition)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(defs, vec!["User", "UserId", "findUser"]);

        let user_refs = tags
            .iter()
            .filter(|t| t.kind == TagKind::Reference && t.name == "User")
            .count();
        assert_eq!(user_refs, 2);
    }

    #[test]
    fn test_tsx_component() {
        let source = "export function Button() {\n  return <Label text=\"ok\" />;\n}\n";
        let tags = extract_source(&TSX, source, Path::new("/p/b.tsx"), "b.tsx").unwrap();
        assert!(tags
            .iter()
            .any(|t| t.kind == TagKind::Definition && t.name == "Button"));
    }
}
