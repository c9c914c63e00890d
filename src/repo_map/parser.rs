//! Parser 辅助工具
//!
//! 提供通用的 Tree-sitter 解析辅助函数

use tree_sitter::{Language, Node, Parser, Tree};

/// 解析源代码为 Tree-sitter AST
pub fn parse_source(source: &str, language: &Language) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(language).ok()?;
    parser.parse(source, None)
}

/// 提取节点的文本内容（越界或非 UTF-8 边界时返回空串）
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// 先序遍历整棵树，不使用递归（深度嵌套的文件不会爆栈）
pub fn for_each_node<'t, F>(root: Node<'t>, mut visit: F)
where
    F: FnMut(Node<'t>),
{
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
