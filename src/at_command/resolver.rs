//! 路径解析 - `@path` → 工作区内的真实文件
//!
//! 顺序：工作区边界检查 → 直接命中（文件或目录展开） → 有界的模糊搜索。
//! 所有返回的路径都是规范化后的绝对路径，并且位于规范化后的工作区根目录之下。

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::ignore::{IgnoreReason, IgnoreRules};
use crate::config::AtCommandConfig;

/// 遍历时总是跳过的目录
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    Resolved,
    NotFound,
    /// 模糊搜索命中多个文件
    Ambiguous,
    DirectoryExpanded,
    RejectedOutsideWorkspace,
    /// 文件存在但被忽略规则排除
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    /// 原始 `@token`
    pub query: String,
    pub resolved_paths: Vec<PathBuf>,
    pub status: ResolveStatus,
    /// 展开或搜索过程中被忽略规则跳过的文件（相对路径）
    pub ignored: Vec<(String, IgnoreReason)>,
}

impl ResolvedPath {
    fn new(query: &str, status: ResolveStatus, resolved_paths: Vec<PathBuf>) -> Self {
        Self {
            query: query.to_string(),
            resolved_paths,
            status,
            ignored: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("workspace root {} is not accessible: {source}", root.display())]
    RootUnavailable {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot canonicalize {}: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct PathResolver {
    root: PathBuf,
    config: AtCommandConfig,
    ignore: IgnoreRules,
}

impl PathResolver {
    pub fn new(workspace_root: &Path, config: AtCommandConfig) -> Result<Self, ResolveError> {
        let root = workspace_root
            .canonicalize()
            .map_err(|source| ResolveError::RootUnavailable {
                root: workspace_root.to_path_buf(),
                source,
            })?;
        let ignore = IgnoreRules::load(&root, &config);
        Ok(Self {
            root,
            config,
            ignore,
        })
    }

    /// 规范化后的工作区根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析一个 `@token`；内部错误只记录日志并按未找到处理
    pub fn resolve(&self, at_token: &str) -> ResolvedPath {
        match self.try_resolve(at_token) {
            Ok(result) => result,
            Err(e) => {
                warn!(token = at_token, error = %e, "failed to resolve path");
                ResolvedPath::new(at_token, ResolveStatus::NotFound, Vec::new())
            }
        }
    }

    fn try_resolve(&self, at_token: &str) -> Result<ResolvedPath, ResolveError> {
        let raw = at_token.strip_prefix('@').unwrap_or(at_token).trim();
        if raw.is_empty() {
            return Ok(ResolvedPath::new(at_token, ResolveStatus::NotFound, Vec::new()));
        }

        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let normalized = normalize_lexically(&joined);
        if !normalized.starts_with(&self.root) {
            warn!(token = at_token, "path escapes the workspace, rejected");
            return Ok(ResolvedPath::new(
                at_token,
                ResolveStatus::RejectedOutsideWorkspace,
                Vec::new(),
            ));
        }

        if normalized.exists() {
            let canonical = normalized
                .canonicalize()
                .map_err(|source| ResolveError::Canonicalize {
                    path: normalized.clone(),
                    source,
                })?;
            // 符号链接可能指向工作区之外
            if !canonical.starts_with(&self.root) {
                warn!(token = at_token, "path resolves outside the workspace, rejected");
                return Ok(ResolvedPath::new(
                    at_token,
                    ResolveStatus::RejectedOutsideWorkspace,
                    Vec::new(),
                ));
            }
            return Ok(if canonical.is_dir() {
                self.expand_directory(at_token, &canonical)
            } else {
                self.resolve_file(at_token, canonical)
            });
        }

        Ok(self.fuzzy_search(at_token, raw))
    }

    fn resolve_file(&self, at_token: &str, file: PathBuf) -> ResolvedPath {
        let relative = file.strip_prefix(&self.root).unwrap_or(&file).to_path_buf();
        match self.ignore.check(&relative, false) {
            Some(reason) => {
                debug!(file = %relative.display(), ?reason, "referenced file is ignored");
                let mut result =
                    ResolvedPath::new(at_token, ResolveStatus::Ignored(reason), Vec::new());
                result.ignored.push((display(&relative), reason));
                result
            }
            None => ResolvedPath::new(at_token, ResolveStatus::Resolved, vec![file]),
        }
    }

    /// 展开目录下的文件（排序、限深、限量）
    fn expand_directory(&self, at_token: &str, dir: &Path) -> ResolvedPath {
        let relative_dir = self.relative(dir);
        let is_root = relative_dir.as_os_str().is_empty();
        if !is_root && is_excluded_dir(&relative_dir) {
            debug!(dir = %relative_dir.display(), "refusing to expand excluded directory");
            return ResolvedPath::new(at_token, ResolveStatus::NotFound, Vec::new());
        }
        if let Some(reason) = (!is_root)
            .then(|| self.ignore.check(&relative_dir, true))
            .flatten()
        {
            let mut result =
                ResolvedPath::new(at_token, ResolveStatus::Ignored(reason), Vec::new());
            result.ignored.push((display(&relative_dir), reason));
            return result;
        }

        let mut result = ResolvedPath::new(at_token, ResolveStatus::DirectoryExpanded, Vec::new());

        for entry in self.walk(dir) {
            if result.resolved_paths.len() >= self.config.max_expanded_files {
                debug!(limit = self.config.max_expanded_files, "directory expansion capped");
                break;
            }
            let relative = self.relative(entry.path());
            match self.ignore.check(&relative, false) {
                Some(reason) => result.ignored.push((display(&relative), reason)),
                None => result.resolved_paths.push(entry.into_path()),
            }
        }

        if result.resolved_paths.is_empty() {
            result.status = ResolveStatus::NotFound;
        }
        result
    }

    /// 大小写不敏感的后缀匹配优先，其次是文件名包含匹配
    fn fuzzy_search(&self, at_token: &str, raw: &str) -> ResolvedPath {
        let query = raw
            .replace('\\', "/")
            .trim_end_matches('/')
            .to_lowercase();
        if query.is_empty() {
            return ResolvedPath::new(at_token, ResolveStatus::NotFound, Vec::new());
        }
        let suffix = format!("/{}", query);
        let name_only = !query.contains('/');

        let mut exact = Vec::new();
        let mut partial = Vec::new();
        let mut ignored = Vec::new();

        for (visited, entry) in self.walk(&self.root).enumerate() {
            if visited >= self.config.max_search_files {
                debug!(limit = self.config.max_search_files, "fuzzy search capped");
                break;
            }
            let relative = self.relative(entry.path());
            let rel_lower = display(&relative).to_lowercase();

            let is_exact = rel_lower == query || rel_lower.ends_with(&suffix);
            let is_partial = if name_only {
                entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&query)
            } else {
                rel_lower.contains(&query)
            };
            if !is_exact && !is_partial {
                continue;
            }

            if let Some(reason) = self.ignore.check(&relative, false) {
                ignored.push((display(&relative), reason));
                continue;
            }
            if is_exact {
                exact.push(entry.into_path());
            } else {
                partial.push(entry.into_path());
            }
        }

        let matches = if exact.is_empty() { partial } else { exact };
        let status = match matches.len() {
            0 if !ignored.is_empty() => ResolveStatus::Ignored(ignored[0].1),
            0 => ResolveStatus::NotFound,
            1 => ResolveStatus::Resolved,
            _ => ResolveStatus::Ambiguous,
        };
        debug!(token = at_token, matches = matches.len(), ?status, "fuzzy search finished");

        let mut result = ResolvedPath::new(at_token, status, matches);
        result.ignored = ignored;
        result
    }

    /// 有界遍历：只产出普通文件（不跟随符号链接），跳过隐藏目录和被忽略的目录
    fn walk<'a>(&'a self, dir: &Path) -> impl Iterator<Item = DirEntry> + 'a {
        WalkDir::new(dir)
            .max_depth(self.config.max_search_depth.max(1))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || !self.skip_dir(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
    }

    fn skip_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        if is_excluded_name(&entry.file_name().to_string_lossy()) {
            return true;
        }
        self.ignore
            .check(&self.relative(entry.path()), true)
            .is_some()
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }
}

/// 解析 `@token`；工作区根目录不可用时按未找到处理
pub fn resolve(at_token: &str, workspace_root: &Path, config: &AtCommandConfig) -> ResolvedPath {
    match PathResolver::new(workspace_root, config.clone()) {
        Ok(resolver) => resolver.resolve(at_token),
        Err(e) => {
            warn!(error = %e, "cannot resolve @ command");
            ResolvedPath::new(at_token, ResolveStatus::NotFound, Vec::new())
        }
    }
}

fn is_excluded_name(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// 相对路径中任一级目录是隐藏目录或总是跳过的目录（根目录本身除外）
fn is_excluded_dir(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(name) => is_excluded_name(&name.to_string_lossy()),
        _ => false,
    })
}

/// 纯词法地消解 `.` 与 `..`，不访问文件系统
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
