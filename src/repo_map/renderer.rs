//! 地图渲染 - 在 token 预算内二分查找可渲染的最长前缀
//!
//! 每个文件输出一个路径标题，其下是每个标签所在行的窥视窗口：标签行本身、
//! 可配置的前后若干行，以及按缩进找到的外层作用域标题行。省略的区间用 `⋮`
//! 标记，源码行以 `│` 开头。

use super::ranker::RankEntry;
use super::token::TokenCounter;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RepoMapConfig;
use crate::utils::truncate_line;

/// 渲染失败后最多排除多少个文件重试
const MAX_RETRIES: usize = 3;

const GAP_MARKER: &str = "⋮";
const LINE_MARKER: &str = "│";

/// 渲染输入中的一项
#[derive(Debug, Clone, PartialEq)]
pub enum MapItem {
    /// 一个排好序的定义
    Tag(RankEntry),
    /// 只列出路径的文件
    File(String),
}

impl MapItem {
    pub fn relative_path(&self) -> &str {
        match self {
            MapItem::Tag(entry) => &entry.relative_path,
            MapItem::File(path) => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot read {relative_path}: {source}")]
    Unreadable {
        relative_path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMap {
    pub text: String,
    /// 渲染进去的输入项个数（前缀长度）
    pub items_included: usize,
    pub tokens: usize,
}

/// 窥视窗口参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub peek_before: usize,
    pub peek_after: usize,
    pub max_line_chars: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&RepoMapConfig::default())
    }
}

impl From<&RepoMapConfig> for RenderOptions {
    fn from(config: &RepoMapConfig) -> Self {
        Self {
            peek_before: config.peek_before,
            peek_after: config.peek_after,
            max_line_chars: config.max_line_chars.max(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapRenderer {
    options: RenderOptions,
}

impl MapRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// 渲染能放进 `token_budget` 的最长前缀；连一个文件标题都放不下时返回 None
    pub fn render<C>(
        &self,
        items: &[MapItem],
        token_budget: usize,
        counter: &C,
    ) -> Option<RenderedMap>
    where
        C: TokenCounter + ?Sized,
    {
        let mut sources = SourceLines::default();
        let mut excluded: BTreeSet<String> = BTreeSet::new();

        for _ in 0..=MAX_RETRIES {
            let candidates: Vec<&MapItem> = items
                .iter()
                .filter(|item| !excluded.contains(item.relative_path()))
                .collect();

            match self.fit(&candidates, token_budget, counter, &mut sources) {
                Ok(result) => return result,
                Err(RenderError::Unreadable {
                    relative_path,
                    source,
                }) => {
                    warn!(file = relative_path.as_str(), error = %source, "file unreadable while rendering map, excluding it");
                    excluded.insert(relative_path);
                }
            }
        }

        // 重试次数用尽：退化为不读文件的纯路径列表
        debug!(excluded = excluded.len(), "falling back to bare file list");
        let mut seen = BTreeSet::new();
        let bare: Vec<MapItem> = items
            .iter()
            .map(MapItem::relative_path)
            .filter(|path| !excluded.contains(*path) && seen.insert(*path))
            .map(|path| MapItem::File(path.to_string()))
            .collect();
        let bare_refs: Vec<&MapItem> = bare.iter().collect();

        // 纯路径列表不读文件，不会失败
        self.fit(&bare_refs, token_budget, counter, &mut sources)
            .ok()
            .flatten()
    }

    fn fit<C>(
        &self,
        items: &[&MapItem],
        token_budget: usize,
        counter: &C,
        sources: &mut SourceLines,
    ) -> Result<Option<RenderedMap>, RenderError>
    where
        C: TokenCounter + ?Sized,
    {
        if items.is_empty() {
            return Ok(None);
        }

        let mut best: Option<RenderedMap> = None;
        let (mut lo, mut hi) = (1, items.len());
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let text = self.render_prefix(&items[..mid], sources)?;
            let tokens = counter.count_tokens(&text);
            if tokens <= token_budget {
                best = Some(RenderedMap {
                    text,
                    items_included: mid,
                    tokens,
                });
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }

        if best.is_some() {
            return Ok(best);
        }

        // 最小的非空渲染：第一个文件只有标题
        let text = format!("{}\n", items[0].relative_path());
        let tokens = counter.count_tokens(&text);
        Ok((tokens <= token_budget).then_some(RenderedMap {
            text,
            items_included: 0,
            tokens,
        }))
    }

    /// 渲染一组输入项（按文件路径分组排序）
    pub fn render_prefix(
        &self,
        items: &[&MapItem],
        sources: &mut SourceLines,
    ) -> Result<String, RenderError> {
        let mut files: BTreeMap<&str, Option<(&Path, BTreeSet<usize>)>> = BTreeMap::new();
        for item in items {
            match item {
                MapItem::Tag(entry) => {
                    let slot = files.entry(entry.relative_path.as_str()).or_insert(None);
                    slot.get_or_insert_with(|| (entry.tag.file_path.as_path(), BTreeSet::new()))
                        .1
                        .insert(entry.tag.line);
                }
                MapItem::File(path) => {
                    files.entry(path.as_str()).or_insert(None);
                }
            }
        }

        let mut output = String::new();
        for (relative_path, tagged) in files {
            match tagged {
                None => {
                    output.push_str(relative_path);
                    output.push('\n');
                }
                Some((file_path, lines_of_interest)) => {
                    let lines = sources.get(relative_path, file_path)?;
                    output.push_str(relative_path);
                    output.push_str(":\n");
                    self.render_peek(lines, &lines_of_interest, &mut output);
                }
            }
        }
        Ok(output)
    }

    fn render_peek(&self, lines: &[String], lines_of_interest: &BTreeSet<usize>, out: &mut String) {
        if lines.is_empty() {
            return;
        }
        let last = lines.len() - 1;

        let mut shown = BTreeSet::new();
        for &line in lines_of_interest {
            if line > last {
                continue;
            }
            let start = line.saturating_sub(self.options.peek_before);
            let end = (line + self.options.peek_after).min(last);
            shown.extend(start..=end);
            shown.extend(scope_headers(lines, line));
        }

        let mut previous: Option<usize> = None;
        for &line in &shown {
            let gap = match previous {
                None => line > 0,
                Some(prev) => line > prev + 1,
            };
            if gap {
                out.push_str(GAP_MARKER);
                out.push('\n');
            }
            out.push_str(LINE_MARKER);
            out.push_str(truncate_line(&lines[line], self.options.max_line_chars));
            out.push('\n');
            previous = Some(line);
        }

        if previous.is_some_and(|prev| prev < last) {
            out.push_str(GAP_MARKER);
            out.push('\n');
        }
    }
}

/// 按缩进向上查找外层作用域的标题行
fn scope_headers(lines: &[String], line: usize) -> Vec<usize> {
    let mut headers = Vec::new();
    let mut indent = indent_of(&lines[line]);

    for idx in (0..line).rev() {
        if indent == 0 {
            break;
        }
        let candidate = &lines[idx];
        if candidate.trim().is_empty() {
            continue;
        }
        let candidate_indent = indent_of(candidate);
        if candidate_indent < indent {
            headers.push(idx);
            indent = candidate_indent;
        }
    }

    headers
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// 单次渲染期间的文件内容缓存（二分查找会反复渲染同一批文件）
#[derive(Default)]
pub struct SourceLines {
    files: HashMap<PathBuf, Vec<String>>,
}

impl SourceLines {
    fn get(&mut self, relative_path: &str, file_path: &Path) -> Result<&[String], RenderError> {
        if !self.files.contains_key(file_path) {
            let bytes = std::fs::read(file_path).map_err(|source| RenderError::Unreadable {
                relative_path: relative_path.to_string(),
                source,
            })?;
            let lines = String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect();
            self.files.insert(file_path.to_path_buf(), lines);
        }
        Ok(self.files.get(file_path).map(Vec::as_slice).unwrap_or_default())
    }
}
