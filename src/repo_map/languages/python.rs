//! Python 语言规则
//!
//! `def`、`class` 以及模块顶层赋值产生定义；装饰器、参数、属性访问中的标识符都是引用。

use super::LanguageSpec;

pub static PYTHON: LanguageSpec = LanguageSpec {
    name: "python",
    extensions: &["py", "pyi"],
    grammar: tree_sitter_python::language,
    definition_kinds: &["function_definition", "class_definition"],
    identifier_kinds: &["identifier"],
    top_level_assignments: &["assignment"],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo_map::extractor::extract_source;
    use crate::repo_map::TagKind;
    use std::path::Path;

    #[test]
    fn test_python_class_and_methods() {
        let source = r#"
class Calculator:
    def __init__(self):
        self.result = 0

    def add(self, x, y):
        return helper(x) + y

def helper(value):
    return value
"#;
        let tags = extract_source(&PYTHON, source, Path::new("/p/calc.py"), "calc.py").unwrap();

        let defs: Vec<_> = tags
            .iter()
            .filter(|t| t.kind == TagKind::Definition)
            .map(|t| (t.name.as_str(), t.line))
            .collect();
        assert_eq!(
            defs,
            vec![("Calculator", 1), ("__init__", 2), ("add", 5), ("helper", 8)]
        );

        let helper_refs = tags
            .iter()
            .filter(|t| t.kind == TagKind::Reference && t.name == "helper")
            .count();
        assert_eq!(helper_refs, 1);
    }

    #[test]
    fn test_python_decorated_function() {
        let source = "@cached\ndef load():\n    pass\n";
        let tags = extract_source(&PYTHON, source, Path::new("/p/a.py"), "a.py").unwrap();
        assert!(tags
            .iter()
            .any(|t| t.kind == TagKind::Definition && t.name == "load" && t.line == 1));
        assert!(tags
            .iter()
            .any(|t| t.kind == TagKind::Reference && t.name == "cached"));
    }

    #[test]
    fn test_python_module_constants() {
        let source = r#"
CONFIG = {"debug": True}
HOST, PORT = "localhost", 8080

class Server:
    timeout = 30

    def start(self):
        retries = 3
        return CONFIG
"#;
        let tags = extract_source(&PYTHON, source, Path::new("/p/srv.py"), "srv.py").unwrap();

        let defs: Vec<_> = tags
            .iter()
            .filter(|t| t.kind == TagKind::Definition)
            .map(|t| (t.name.as_str(), t.line))
            .collect();
        assert_eq!(
            defs,
            vec![("CONFIG", 1), ("HOST", 2), ("PORT", 2), ("Server", 4), ("start", 7)]
        );
        assert!(tags
            .iter()
            .any(|t| t.kind == TagKind::Reference && t.name == "CONFIG" && t.line == 9));
    }
}
