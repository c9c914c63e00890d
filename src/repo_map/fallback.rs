//! 纯文本回退扫描
//!
//! 没有可用语法（或语法没有产出任何标签）时，把每个非注释的标识符记作一次
//! 隐式定义，保证文件不会因为无法解析而在排序中彻底消失。

use super::{Tag, TagKind};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
}

/// 一种语言的注释写法
struct CommentSyntax {
    line: &'static [&'static str],
    block: bool,
}

const C_STYLE: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: true,
};

fn comment_syntax(file_path: &Path) -> CommentSyntax {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "py" | "pyi" | "rb" | "sh" | "bash" => CommentSyntax {
            line: &["#"],
            block: false,
        },
        "php" => CommentSyntax {
            line: &["//", "#"],
            block: true,
        },
        "sql" => CommentSyntax {
            line: &["--", "#"],
            block: true,
        },
        "lua" => CommentSyntax {
            line: &["--"],
            block: false,
        },
        _ => C_STYLE,
    }
}

/// 扫描文本，每个标识符只记录第一次出现的位置
pub fn scan(content: &str, file_path: &Path, relative_path: &str) -> Vec<Tag> {
    let syntax = comment_syntax(file_path);
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    let mut in_block_comment = false;

    for (line_no, raw_line) in content.lines().enumerate() {
        let code = strip_comments(raw_line, &syntax, &mut in_block_comment);
        if code.trim().is_empty() {
            continue;
        }

        for m in IDENTIFIER.find_iter(&code) {
            let name = m.as_str();
            if name.len() < 2 || !seen.insert(name.to_string()) {
                continue;
            }
            tags.push(Tag {
                file_path: file_path.to_path_buf(),
                relative_path: relative_path.to_string(),
                name: name.to_string(),
                kind: TagKind::Definition,
                line: line_no,
            });
        }
    }

    tags
}

/// 去掉一行中的注释部分，跨行块注释由 `in_block` 记录状态
fn strip_comments(line: &str, syntax: &CommentSyntax, in_block: &mut bool) -> String {
    let mut code = String::new();
    let mut rest = line;

    loop {
        if *in_block {
            match rest.find("*/") {
                Some(end) => {
                    *in_block = false;
                    rest = &rest[end + 2..];
                }
                None => return code,
            }
        }

        match rest.find("/*").filter(|_| syntax.block) {
            Some(start) => {
                code.push_str(&rest[..start]);
                *in_block = true;
                rest = &rest[start + 2..];
            }
            None => {
                code.push_str(rest);
                break;
            }
        }
    }

    // 文档注释的续行（` * text`）
    let trimmed = code.trim_start();
    if syntax.block && (trimmed == "*" || trimmed.starts_with("* ")) {
        return String::new();
    }
    if let Some(cut) = syntax
        .line
        .iter()
        .filter_map(|marker| code.find(marker))
        .min()
    {
        code.truncate(cut);
    }
    code
}
