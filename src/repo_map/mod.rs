//! Repository Map - 代码库地图
//!
//! 使用 Tree-sitter 提取每个文件的定义与引用（标签），在 文件 ↔ 标识符 图上
//! 做个性化 PageRank，再把排名最高的内容装进固定的 token 预算，作为 prompt
//! 中的仓库概览。
//!
//! 流水线：`discovery` → `cache`(`extractor`) → `ranker` → `renderer`。

pub mod cache;
pub mod discovery;
pub mod extractor;
pub mod fallback;
pub mod languages;
pub mod mentions;
pub mod parser;
pub mod ranker;
pub mod renderer;
pub mod special;
pub mod token;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub use cache::{CacheStats, TagCache};
pub use discovery::discover_files;
pub use extractor::TagExtractor;
pub use ranker::{rank, RankEntry, RankWeights};
pub use renderer::{MapItem, MapRenderer, RenderOptions, RenderedMap};
pub use token::{HeuristicCounter, SampledCounter, TokenCounter};

pub use crate::config::{RefreshMode, RepoMapConfig};
use crate::utils::relative_display;

/// Prompt 中地图的固定标题
pub const MAP_HEADER: &str = "Repository Map:";
/// 无法生成地图时的占位文本
pub const MAP_UNAVAILABLE: &str = "Unable to generate repository map.";

/// 放大预算时为模型上下文预留的 token 数
const CONTEXT_PADDING: usize = 4096;
/// `auto` 模式下，生成耗时超过这个值才复用上次结果
const AUTO_REFRESH_THRESHOLD: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════════
// 标签
// ═══════════════════════════════════════════════════════════════════

/// 一次符号出现
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// 绝对路径
    pub file_path: PathBuf,
    /// 相对工作区的路径，用作图节点标识
    pub relative_path: String,
    pub name: String,
    pub kind: TagKind,
    /// 0 起始的行号
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Definition,
    Reference,
}

// ═══════════════════════════════════════════════════════════════════
// 引擎
// ═══════════════════════════════════════════════════════════════════

/// 一次地图请求
#[derive(Debug, Clone, Default)]
pub struct MapRequest {
    /// 已经在对话中打开的文件（绝对路径）
    pub chat_files: Vec<PathBuf>,
    /// 其余候选文件（绝对路径）
    pub other_files: Vec<PathBuf>,
    /// 被提及的文件（相对路径）
    pub mentioned_files: BTreeSet<String>,
    pub mentioned_idents: BTreeSet<String>,
}

struct LastMap {
    files_key: blake3::Hash,
    request_key: blake3::Hash,
    elapsed: Duration,
    map: Option<String>,
}

/// 地图引擎。标签缓存与 token 计数器由调用方持有并在每次调用时传入。
pub struct RepoMap {
    root: PathBuf,
    config: RepoMapConfig,
    renderer: MapRenderer,
    last: Option<LastMap>,
}

impl RepoMap {
    pub fn new(root: impl Into<PathBuf>, config: RepoMapConfig) -> Self {
        let renderer = MapRenderer::new(RenderOptions::from(&config));
        Self {
            root: root.into(),
            config,
            renderer,
            last: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoMapConfig {
        &self.config
    }

    /// 生成地图；没有候选文件、预算为 0 或预算放不下任何内容时返回 None
    pub fn get_repo_map<C>(
        &mut self,
        cache: &mut TagCache,
        counter: &C,
        request: &MapRequest,
    ) -> Option<String>
    where
        C: TokenCounter + ?Sized,
    {
        if self.config.map_tokens == 0 {
            debug!("repo map disabled");
            return None;
        }
        if request.other_files.is_empty() {
            return None;
        }

        let budget = self.token_budget(request.chat_files.is_empty());
        let (files_key, request_key) = self.request_keys(request, budget);

        if let Some(map) = self.reusable(files_key, request_key) {
            debug!(mode = ?self.config.refresh, "reusing previous repo map");
            return map;
        }

        let started = Instant::now();
        let map = self.build(cache, counter, request, budget);
        let elapsed = started.elapsed();
        info!(
            budget,
            elapsed_ms = elapsed.as_millis() as u64,
            produced = map.is_some(),
            "repo map generated"
        );

        self.last = Some(LastMap {
            files_key,
            request_key,
            elapsed,
            map: map.clone(),
        });
        map
    }

    /// 没有对话文件时放大预算，但不超过上下文窗口减去预留
    pub fn token_budget(&self, no_chat_files: bool) -> usize {
        let base = self.config.map_tokens;
        if !no_chat_files || self.config.map_mul_no_files <= 1 {
            return base;
        }

        let mut target = base.saturating_mul(self.config.map_mul_no_files);
        if let Some(window) = self.config.max_context_window {
            target = target.min(window.saturating_sub(CONTEXT_PADDING));
        }
        if target == 0 {
            base
        } else {
            target
        }
    }

    fn reusable(&self, files_key: blake3::Hash, request_key: blake3::Hash) -> Option<Option<String>> {
        let last = self.last.as_ref()?;
        let reuse = match self.config.refresh {
            RefreshMode::Always => false,
            RefreshMode::Manual => true,
            RefreshMode::Files => last.files_key == files_key,
            RefreshMode::Auto => {
                last.request_key == request_key && last.elapsed > AUTO_REFRESH_THRESHOLD
            }
        };
        reuse.then(|| last.map.clone())
    }

    fn request_keys(&self, request: &MapRequest, budget: usize) -> (blake3::Hash, blake3::Hash) {
        let mut files = blake3::Hasher::new();
        for (label, paths) in [("chat", &request.chat_files), ("other", &request.other_files)] {
            let mut sorted: Vec<String> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            sorted.sort();
            files.update(label.as_bytes());
            for path in sorted {
                files.update(path.as_bytes());
                files.update(b"\0");
            }
        }
        files.update(&(budget as u64).to_le_bytes());
        let files_key = files.finalize();

        let mut full = blake3::Hasher::new();
        full.update(files_key.as_bytes());
        for (label, names) in [
            ("files", &request.mentioned_files),
            ("idents", &request.mentioned_idents),
        ] {
            full.update(label.as_bytes());
            for name in names {
                full.update(name.as_bytes());
                full.update(b"\0");
            }
        }
        (files_key, full.finalize())
    }

    fn build<C>(
        &self,
        cache: &mut TagCache,
        counter: &C,
        request: &MapRequest,
        budget: usize,
    ) -> Option<String>
    where
        C: TokenCounter + ?Sized,
    {
        let chat: BTreeSet<String> = request
            .chat_files
            .iter()
            .map(|p| relative_display(p, &self.root))
            .collect();

        let mut all: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in request.chat_files.iter().chain(&request.other_files) {
            all.entry(relative_display(path, &self.root))
                .or_insert_with(|| path.clone());
        }

        let batch: Vec<(PathBuf, String)> = all
            .iter()
            .map(|(rel, abs)| (abs.clone(), rel.clone()))
            .collect();
        let tags_by_file: BTreeMap<String, Vec<Tag>> =
            cache.get_tags_batch(&batch).into_iter().collect();
        cache.flush();

        let ranking = rank(
            &tags_by_file,
            &request.mentioned_files,
            &request.mentioned_idents,
            &chat,
        );

        let items = assemble_items(ranking, all.keys(), &chat);
        self.renderer
            .render(&items, budget, counter)
            .map(|rendered| rendered.text)
            .filter(|text| !text.trim().is_empty())
    }
}

/// 重要文件在前，排名结果居中，没有排名的其余文件在后
fn assemble_items<'a, I>(ranking: Vec<RankEntry>, files: I, chat: &BTreeSet<String>) -> Vec<MapItem>
where
    I: IntoIterator<Item = &'a String>,
{
    let ranked: BTreeSet<String> = ranking.iter().map(|e| e.relative_path.clone()).collect();
    let unranked: Vec<&String> = files
        .into_iter()
        .filter(|rel| !chat.contains(*rel) && !ranked.contains(*rel))
        .collect();

    let (important, rest): (Vec<&String>, Vec<&String>) = unranked
        .into_iter()
        .partition(|rel| special::is_important(rel));

    let mut items: Vec<MapItem> = important
        .into_iter()
        .map(|rel| MapItem::File(rel.clone()))
        .collect();
    items.extend(ranking.into_iter().map(MapItem::Tag));
    items.extend(rest.into_iter().map(|rel| MapItem::File(rel.clone())));
    items
}

/// 把地图包进 prompt 中使用的固定格式
pub fn format_for_prompt(map: Option<&str>) -> String {
    match map {
        Some(text) if !text.trim().is_empty() => format!("{}\n{}", MAP_HEADER, text.trim_end()),
        _ => format!("{} {}", MAP_HEADER, MAP_UNAVAILABLE),
    }
}
