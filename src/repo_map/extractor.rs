//! 标签提取器 - 扩展名 → 语法的查找表
//!
//! 有语法的文件走 Tree-sitter；只被识别为源码文本的扩展名走纯文本回退扫描；
//! 其余扩展名返回空列表。单个文件的任何失败都只产生警告，不会中断整批提取。

use super::languages::{self, LanguageSpec};
use super::{fallback, parser, Tag, TagKind};
use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// 没有语法但可以按纯文本扫描的扩展名
const TEXT_FALLBACK_EXTENSIONS: &[&str] = &[
    "java", "c", "h", "cc", "cpp", "hpp", "cs", "rb", "php", "swift", "kt", "scala", "lua", "sh",
    "bash", "sql",
];

/// 扩展名驱动的标签提取器
pub struct TagExtractor {
    languages: Vec<&'static LanguageSpec>,
    text_extensions: HashSet<&'static str>,
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TagExtractor {
    /// 注册全部内置语言
    pub fn new() -> Self {
        Self {
            languages: languages::builtin(),
            text_extensions: TEXT_FALLBACK_EXTENSIONS.iter().copied().collect(),
        }
    }

    /// 注册额外语言；与已注册语言冲突的扩展名以新注册者为准
    pub fn register(&mut self, spec: &'static LanguageSpec) {
        self.languages.insert(0, spec);
    }

    /// 查找文件对应的语言
    pub fn language_for(&self, path: &Path) -> Option<&'static LanguageSpec> {
        let ext = extension_of(path)?;
        self.languages.iter().copied().find(|spec| spec.handles(&ext))
    }

    /// 是否能从该文件中提取出任何标签
    pub fn supports(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => {
                self.languages.iter().any(|spec| spec.handles(&ext))
                    || self.text_extensions.contains(ext.as_str())
            }
            None => false,
        }
    }

    /// 提取一个文件的标签（失败时返回空列表）
    pub fn extract(&self, file_path: &Path, relative_path: &str) -> Vec<Tag> {
        let Some(ext) = extension_of(file_path) else {
            return Vec::new();
        };

        let spec = self.language_for(file_path);
        if spec.is_none() && !self.text_extensions.contains(ext.as_str()) {
            return Vec::new();
        }

        let content = match std::fs::read(file_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %file_path.display(), error = %e, "failed to read file for tags");
                return Vec::new();
            }
        };

        let Some(spec) = spec else {
            return fallback::scan(&content, file_path, relative_path);
        };

        match extract_source(spec, &content, file_path, relative_path) {
            Ok(tags) if !tags.is_empty() => tags,
            Ok(_) => {
                debug!(file = relative_path, "grammar produced no tags, scanning as text");
                fallback::scan(&content, file_path, relative_path)
            }
            Err(e) => {
                warn!(file = relative_path, error = %e, "failed to parse file, skipping tags");
                Vec::new()
            }
        }
    }
}

/// 使用指定语言规则从源码中提取标签
pub fn extract_source(
    spec: &LanguageSpec,
    source: &str,
    file_path: &Path,
    relative_path: &str,
) -> Result<Vec<Tag>> {
    let language = (spec.grammar)();
    let tree = parser::parse_source(source, &language)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse {} source", spec.name))?;

    let mut definition_names = HashSet::new();
    let mut tags = Vec::new();

    parser::for_each_node(tree.root_node(), |node| {
        let kind = node.kind();

        if spec.is_definition(kind) {
            if let Some(name_node) = node.child_by_field_name("name") {
                if spec.is_identifier(name_node.kind()) {
                    definition_names.insert(name_node.id());
                }
            }
            return;
        }

        if spec.is_top_level_assignment(kind) && !inside_definition(spec, node) {
            if let Some(left) = node.child_by_field_name("left") {
                mark_assignment_targets(spec, left, &mut definition_names);
            }
            return;
        }

        if !spec.is_identifier(kind) {
            return;
        }

        let name = parser::node_text(&node, source);
        if name.is_empty() {
            return;
        }

        let tag_kind = if definition_names.contains(&node.id()) {
            TagKind::Definition
        } else {
            TagKind::Reference
        };

        tags.push(Tag {
            file_path: file_path.to_path_buf(),
            relative_path: relative_path.to_string(),
            name: name.to_string(),
            kind: tag_kind,
            line: node.start_position().row,
        });
    });

    Ok(tags)
}

fn inside_definition(spec: &LanguageSpec, node: tree_sitter::Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if spec.is_definition(parent.kind()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// `X = ...` 与 `A, B = ...` 的左侧标识符
fn mark_assignment_targets(
    spec: &LanguageSpec,
    left: tree_sitter::Node,
    definition_names: &mut HashSet<usize>,
) {
    if spec.is_identifier(left.kind()) {
        definition_names.insert(left.id());
        return;
    }
    let mut cursor = left.walk();
    for child in left.named_children(&mut cursor) {
        if spec.is_identifier(child.kind()) {
            definition_names.insert(child.id());
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
