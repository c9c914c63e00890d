//! 配置 - 分层加载
//!
//! 优先级（高 → 低）：环境变量 > 项目 `.coder/config.yaml` >
//! 用户配置目录 `coder-context/config.yaml` > 内置默认值。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::utils::{project_root::PROJECT_MARKER, read_file};

/// 项目内配置文件（相对项目根目录）
pub const PROJECT_CONFIG_FILE: &str = ".coder/config.yaml";

// ═══════════════════════════════════════════════════════════════════
// Repository Map 配置
// ═══════════════════════════════════════════════════════════════════

/// 地图复用策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// 每次都重新生成
    Always,
    /// 文件集合与预算不变时复用
    Files,
    /// 请求完全相同且上次生成耗时超过 1 秒时复用
    #[default]
    Auto,
    /// 只要有上次的结果就复用
    Manual,
}

impl FromStr for RefreshMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "files" => Ok(Self::Files),
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => anyhow::bail!("Unknown refresh mode: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoMapConfig {
    /// 地图 token 预算；0 表示禁用
    pub map_tokens: usize,
    /// 没有打开的对话文件时预算的放大倍数
    pub map_mul_no_files: usize,
    /// 模型上下文窗口，用于限制放大后的预算
    pub max_context_window: Option<usize>,
    pub refresh: RefreshMode,
    /// 每次最多考虑的文件数
    pub max_files: usize,
    /// 文件内容少于这么多字符时跳过
    pub min_content_chars: usize,
    /// 非注释代码行少于这么多行时跳过
    pub min_code_lines: usize,
    pub peek_before: usize,
    pub peek_after: usize,
    pub max_line_chars: usize,
    /// 标签缓存文件（相对项目根目录）
    pub cache_file: PathBuf,
}

impl Default for RepoMapConfig {
    fn default() -> Self {
        Self {
            map_tokens: 1024,
            map_mul_no_files: 8,
            max_context_window: None,
            refresh: RefreshMode::Auto,
            max_files: 50,
            min_content_chars: 100,
            min_code_lines: 5,
            peek_before: 0,
            peek_after: 0,
            max_line_chars: 100,
            cache_file: PathBuf::from(PROJECT_MARKER).join("repo_map/tags_cache.json"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// @ 命令配置
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtCommandConfig {
    /// 目录展开时最多包含的文件数
    pub max_expanded_files: usize,
    pub max_search_depth: usize,
    /// 模糊搜索最多遍历的文件数
    pub max_search_files: usize,
    /// 歧义匹配数不超过这个值时全部注入
    pub max_ambiguous_include: usize,
    /// 单个文件注入的最大字符数
    pub max_inject_chars: usize,
    pub respect_git_ignore: bool,
    pub respect_custom_ignore: bool,
}

impl Default for AtCommandConfig {
    fn default() -> Self {
        Self {
            max_expanded_files: 50,
            max_search_depth: 8,
            max_search_files: 5000,
            max_ambiguous_include: 3,
            max_inject_chars: 100_000,
            respect_git_ignore: true,
            respect_custom_ignore: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// 顶层配置
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 配置对应的项目根目录（不序列化）
    #[serde(skip)]
    pub root_dir: PathBuf,
    pub repo_map: RepoMapConfig,
    pub at_command: AtCommandConfig,
}

impl Config {
    /// 项目根目录下的默认配置
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Self::default()
        }
    }

    /// 加载配置；配置文件格式错误时返回错误
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = match Self::locate(root) {
            Some(path) => {
                debug!(file = %path.display(), "loading config");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.root_dir = root.to_path_buf();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 加载配置，失败时退回默认值
    pub fn load_or_default(root: &Path) -> Self {
        Self::load(root).unwrap_or_else(|e| {
            warn!(error = %format!("{:#}", e), "invalid config, using defaults");
            let mut config = Self::for_root(root);
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        })
    }

    /// 从 YAML 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = read_file(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn locate(root: &Path) -> Option<PathBuf> {
        let project = root.join(PROJECT_CONFIG_FILE);
        if project.is_file() {
            return Some(project);
        }
        let user = dirs::config_dir()?.join("coder-context").join("config.yaml");
        user.is_file().then_some(user)
    }

    /// 应用环境变量覆盖；无法解析的值只记录警告
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CODER_MAP_TOKENS") {
            match value.trim().parse::<usize>() {
                Ok(tokens) => self.repo_map.map_tokens = tokens,
                Err(_) => warn!(value = value.as_str(), "ignoring invalid CODER_MAP_TOKENS"),
            }
        }

        if let Some(value) = lookup("CODER_MAP_REFRESH") {
            match value.parse::<RefreshMode>() {
                Ok(mode) => self.repo_map.refresh = mode,
                Err(e) => warn!(error = %e, "ignoring invalid CODER_MAP_REFRESH"),
            }
        }

        if let Some(value) = lookup("SKIP_REPO_MAP") {
            if matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                self.repo_map.map_tokens = 0;
            }
        }
    }

    /// 标签缓存文件的绝对路径
    pub fn cache_path(&self) -> PathBuf {
        if self.repo_map.cache_file.is_absolute() {
            self.repo_map.cache_file.clone()
        } else {
            self.root_dir.join(&self.repo_map.cache_file)
        }
    }
}
