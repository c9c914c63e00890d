//! 工作区文件枚举
//!
//! 遵守 `.gitignore`，跳过点文件、内容过短的文件，并限制单次考虑的文件数。

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::RepoMapConfig;

use super::special;

const COMMENT_PREFIXES: &[&str] = &["#", "//", "/*", "*", "--", ";"];

/// 枚举地图候选文件（绝对路径，按路径排序）
pub fn discover_files(root: &Path, config: &RepoMapConfig) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker.filter_map(|entry| entry.ok()) {
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !special::is_important(&relative.to_string_lossy()) && !has_enough_content(path, config) {
            continue;
        }

        files.push(path.to_path_buf());
        if files.len() >= config.max_files {
            debug!(limit = config.max_files, "file limit reached during discovery");
            break;
        }
    }

    files.sort();
    files
}

/// 内容长度与非注释代码行数都达到阈值
fn has_enough_content(path: &Path, config: &RepoMapConfig) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    let Ok(content) = std::str::from_utf8(&bytes) else {
        return false;
    };
    if content.chars().count() <= config.min_content_chars {
        return false;
    }

    count_code_lines(content) > config.min_code_lines
}

/// 非空且不以常见注释前缀开头的行数
pub fn count_code_lines(content: &str) -> usize {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !COMMENT_PREFIXES.iter().any(|p| line.starts_with(p)))
        .count()
}
