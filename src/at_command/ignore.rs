//! 忽略规则 - 工作区根目录的 `.gitignore` 与 `.coderignore`

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

use crate::config::AtCommandConfig;

/// 自定义忽略文件名
pub const CUSTOM_IGNORE_FILE: &str = ".coderignore";

/// 文件被哪一类规则忽略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Git,
    Custom,
    Both,
}

#[derive(Debug, Default)]
pub struct IgnoreRules {
    git: Option<Gitignore>,
    custom: Option<Gitignore>,
}

impl IgnoreRules {
    /// 从（已规范化的）工作区根目录加载；规则文件损坏时只记录警告
    pub fn load(root: &Path, config: &AtCommandConfig) -> Self {
        Self {
            git: config
                .respect_git_ignore
                .then(|| build_matcher(root, ".gitignore"))
                .flatten(),
            custom: config
                .respect_custom_ignore
                .then(|| build_matcher(root, CUSTOM_IGNORE_FILE))
                .flatten(),
        }
    }

    /// 检查相对根目录的路径
    pub fn check(&self, relative_path: &Path, is_dir: bool) -> Option<IgnoreReason> {
        let hit = |matcher: &Option<Gitignore>| {
            matcher.as_ref().is_some_and(|m| {
                m.matched_path_or_any_parents(relative_path, is_dir)
                    .is_ignore()
            })
        };

        match (hit(&self.git), hit(&self.custom)) {
            (true, true) => Some(IgnoreReason::Both),
            (true, false) => Some(IgnoreReason::Git),
            (false, true) => Some(IgnoreReason::Custom),
            (false, false) => None,
        }
    }
}

fn build_matcher(root: &Path, file_name: &str) -> Option<Gitignore> {
    let path = root.join(file_name);
    if !path.is_file() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    if let Some(e) = builder.add(&path) {
        warn!(file = %path.display(), error = %e, "some ignore rules could not be parsed");
    }
    match builder.build() {
        Ok(matcher) => Some(matcher),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "ignoring unreadable ignore file");
            None
        }
    }
}
