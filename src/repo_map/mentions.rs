//! 从对话文本中提取被提及的标识符和文件

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
    static ref PATH_LIKE: Regex = Regex::new(r"[A-Za-z0-9_./\\-]+").unwrap();
}

/// 文本中出现过的所有标识符
pub fn extract_ident_mentions(text: &str) -> BTreeSet<String> {
    WORD.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// 在候选相对路径中找出文本提及过的文件
///
/// 完整相对路径出现在文本中即算提及；只出现文件名时，该文件名必须在候选中
/// 唯一，并且像一个真正的文件名（含 `.`、`_`、`-` 或 `/`），避免普通单词误判。
pub fn extract_file_mentions<'a, I>(text: &str, candidates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let words: BTreeSet<String> = PATH_LIKE
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
                .replace('\\', "/")
        })
        .filter(|w| !w.is_empty())
        .collect();

    let candidates: Vec<&str> = candidates.into_iter().collect();
    let mut by_basename: std::collections::BTreeMap<&str, Vec<&str>> = Default::default();
    for rel in &candidates {
        if let Some(name) = Path::new(rel).file_name().and_then(|n| n.to_str()) {
            by_basename.entry(name).or_default().push(*rel);
        }
    }

    let mut mentioned = BTreeSet::new();
    for rel in &candidates {
        if words.contains(*rel) {
            mentioned.insert(rel.to_string());
        }
    }

    for (basename, paths) in by_basename {
        if paths.len() != 1 || !looks_like_file_name(basename) {
            continue;
        }
        if words.contains(basename) {
            mentioned.insert(paths[0].to_string());
        }
    }

    mentioned
}

fn looks_like_file_name(name: &str) -> bool {
    name.contains(|c: char| matches!(c, '.' | '_' | '-' | '/'))
}
