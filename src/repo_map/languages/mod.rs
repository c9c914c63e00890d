//! 语言注册表
//!
//! 每种语言只是一张表：扩展名 → 语法 + 定义节点类型 + 标识符节点类型。
//! 提取逻辑统一在 `extractor` 中完成，不需要每种语言写一套遍历代码。

pub mod go;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use tree_sitter::Language;

/// 单个语言的提取规则
pub struct LanguageSpec {
    /// 语言名称（日志与缓存展示用）
    pub name: &'static str,
    /// 由该语法处理的扩展名（小写，不含点）
    pub extensions: &'static [&'static str],
    /// 语法构造函数
    pub grammar: fn() -> Language,
    /// 定义节点类型：节点的 `name` 字段即被定义的符号
    pub definition_kinds: &'static [&'static str],
    /// 标识符叶子节点类型：非定义名称的标识符都记为引用
    pub identifier_kinds: &'static [&'static str],
    /// 赋值节点类型：不在任何定义内部时，`left` 字段中的标识符记为定义
    pub top_level_assignments: &'static [&'static str],
}

impl LanguageSpec {
    pub fn handles(&self, ext: &str) -> bool {
        self.extensions.contains(&ext)
    }

    pub fn is_definition(&self, kind: &str) -> bool {
        self.definition_kinds.contains(&kind)
    }

    pub fn is_identifier(&self, kind: &str) -> bool {
        self.identifier_kinds.contains(&kind)
    }

    pub fn is_top_level_assignment(&self, kind: &str) -> bool {
        self.top_level_assignments.contains(&kind)
    }
}

/// 所有内置语言
pub fn builtin() -> Vec<&'static LanguageSpec> {
    vec![
        &rust::RUST,
        &python::PYTHON,
        &go::GO,
        &javascript::JAVASCRIPT,
        &typescript::TYPESCRIPT,
        &typescript::TSX,
    ]
}
