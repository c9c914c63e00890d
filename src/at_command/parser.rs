//! @ 命令解析
//!
//! 把自由文本切分成交替出现的普通文本和 `@path` 片段。`@` 开始一个路径，
//! 路径在未转义的空白处结束；`\ ` 在路径内部表示一个字面空格。

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref CONTENT_SECTION: Regex =
        Regex::new(r"(?s)\A---\s+(.+?)\s+---\n\n(.*?)\n*\z").unwrap();
}

/// 路径中不允许出现的字符
const INVALID_PATH_CHARS: &[char] = &['<', '>', '|', '"', '\0'];

/// 解析结果中的一段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum AtCommandPart {
    Text(String),
    /// 包含开头的 `@`，转义空格已还原
    AtPath(String),
}

impl AtCommandPart {
    pub fn content(&self) -> &str {
        match self {
            AtCommandPart::Text(content) | AtCommandPart::AtPath(content) => content,
        }
    }

    pub fn is_at_path(&self) -> bool {
        matches!(self, AtCommandPart::AtPath(_))
    }
}

/// 切分文本；空输入返回空列表
pub fn parse_all_at_commands(text: &str) -> Vec<AtCommandPart> {
    let mut parts = Vec::new();
    let mut text_start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '@' {
            continue;
        }

        if idx > text_start {
            parts.push(AtCommandPart::Text(text[text_start..idx].to_string()));
        }

        let mut path = String::from("@");
        while let Some(&(_, next)) = chars.peek() {
            if next == '\\' {
                chars.next();
                match chars.peek() {
                    Some(&(_, ' ')) => {
                        chars.next();
                        path.push(' ');
                    }
                    _ => path.push('\\'),
                }
                continue;
            }
            if next.is_whitespace() {
                break;
            }
            path.push(next);
            chars.next();
        }

        text_start = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());

        // 单独的 `@` 按普通文本处理
        if path.len() == 1 {
            parts.push(AtCommandPart::Text(path));
        } else {
            parts.push(AtCommandPart::AtPath(path));
        }
    }

    if text_start < text.len() {
        parts.push(AtCommandPart::Text(text[text_start..].to_string()));
    }

    parts
}

/// 把 `@path` 内容中的空格重新转义（`parse_all_at_commands` 的逆操作）
pub fn escape_at_path(content: &str) -> String {
    content.replace(' ', "\\ ")
}

/// 以 `@` 开头且不含非法字符
pub fn validate_at_path(token: &str) -> bool {
    token.starts_with('@') && !token.contains(INVALID_PATH_CHARS)
}

/// 从 `--- {path} ---\n\n{content}` 片段中还原路径和内容
pub fn extract_file_content_info(section: &str) -> (Option<String>, String) {
    match CONTENT_SECTION.captures(section) {
        Some(caps) => (Some(caps[1].to_string()), caps[2].to_string()),
        None => (None, section.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> AtCommandPart {
        AtCommandPart::Text(s.to_string())
    }

    fn at(s: &str) -> AtCommandPart {
        AtCommandPart::AtPath(s.to_string())
    }

    fn reconstruct(parts: &[AtCommandPart]) -> String {
        parts
            .iter()
            .map(|part| match part {
                AtCommandPart::Text(s) => s.clone(),
                AtCommandPart::AtPath(s) => escape_at_path(s),
            })
            .collect()
    }

    #[test]
    fn test_parse_single_at_command() {
        assert_eq!(parse_all_at_commands("@file.txt"), vec![at("@file.txt")]);
    }

    #[test]
    fn test_parse_mixed_content() {
        assert_eq!(
            parse_all_at_commands("Check @file1.txt and @file2.txt"),
            vec![
                text("Check "),
                at("@file1.txt"),
                text(" and "),
                at("@file2.txt")
            ]
        );
    }

    #[test]
    fn test_parse_escaped_spaces() {
        assert_eq!(
            parse_all_at_commands("@my\\ file.txt"),
            vec![at("@my file.txt")]
        );
    }

    #[test]
    fn test_parse_lone_at_symbol() {
        assert_eq!(
            parse_all_at_commands("Just @ symbol"),
            vec![text("Just "), text("@"), text(" symbol")]
        );
        assert_eq!(parse_all_at_commands("@"), vec![text("@")]);
    }

    #[test]
    fn test_parse_empty_and_plain() {
        assert!(parse_all_at_commands("").is_empty());
        assert_eq!(
            parse_all_at_commands("This is just text"),
            vec![text("This is just text")]
        );
    }

    #[test]
    fn test_backslash_without_space_is_kept() {
        assert_eq!(
            parse_all_at_commands("@dir\\file.txt\tnext"),
            vec![at("@dir\\file.txt"), text("\tnext")]
        );
    }

    #[test]
    fn test_validate_at_path() {
        assert!(validate_at_path("@file.txt"));
        assert!(validate_at_path("@path/to/file.py"));
        assert!(validate_at_path("@"));

        assert!(!validate_at_path(""));
        assert!(!validate_at_path("file.txt"));
        assert!(!validate_at_path("@file<.txt"));
        assert!(!validate_at_path("@file>.txt"));
    }

    #[test]
    fn test_extract_file_content_info() {
        let (path, content) = extract_file_content_info("--- test.py ---\n\nprint('hello')\n\n");
        assert_eq!(path.as_deref(), Some("test.py"));
        assert_eq!(content, "print('hello')");

        let (path, content) = extract_file_content_info("Just some text");
        assert!(path.is_none());
        assert_eq!(content, "Just some text");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&at("@a.py")).unwrap();
        assert_eq!(json, r#"{"type":"at_path","content":"@a.py"}"#);
    }

    proptest! {
        #[test]
        fn prop_round_trip(input in r"[a-z@ \\./\t]{0,40}") {
            let parts = parse_all_at_commands(&input);
            prop_assert_eq!(reconstruct(&parts), input);
        }

        #[test]
        fn prop_no_empty_parts(input in r"[a-z@ \\]{0,40}") {
            for part in parse_all_at_commands(&input) {
                prop_assert!(!part.content().is_empty());
            }
        }
    }
}
