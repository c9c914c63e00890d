//! @ 命令处理 - 解析、解析路径、注入文件内容，并维护统计

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::ignore::IgnoreReason;
use super::parser::{parse_all_at_commands, validate_at_path, AtCommandPart};
use super::resolver::{PathResolver, ResolveStatus};
use crate::config::AtCommandConfig;
use crate::utils::{read_text_file, relative_display, truncate_middle};

pub const CONTENT_HEADER: &str = "--- Content from referenced files ---";
pub const CONTENT_FOOTER: &str = "--- End of content ---";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    pub total_at_commands: usize,
    /// 成功解析出至少一个文件的 @ 命令数
    pub resolved_paths: usize,
    pub failed_paths: usize,
    pub files_read: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IgnoredStats {
    pub git_ignored: Vec<String>,
    pub custom_ignored: Vec<String>,
    pub both_ignored: Vec<String>,
}

impl IgnoredStats {
    fn record(&mut self, relative_path: String, reason: IgnoreReason) {
        let bucket = match reason {
            IgnoreReason::Git => &mut self.git_ignored,
            IgnoreReason::Custom => &mut self.custom_ignored,
            IgnoreReason::Both => &mut self.both_ignored,
        };
        if !bucket.contains(&relative_path) {
            bucket.push(relative_path);
        }
    }

    pub fn total(&self) -> usize {
        self.git_ignored.len() + self.custom_ignored.len() + self.both_ignored.len()
    }
}

/// 一次处理的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedQuery {
    pub text: String,
    /// 实际注入的文件（相对路径）
    pub files_included: Vec<String>,
    /// 输入只由无法解析的 @ 命令组成时为 false
    pub should_proceed: bool,
}

impl ProcessedQuery {
    fn unchanged(query: &str) -> Self {
        Self {
            text: query.to_string(),
            files_included: Vec::new(),
            should_proceed: true,
        }
    }
}

pub struct AtCommandProcessor {
    config: AtCommandConfig,
    stats: ProcessingStats,
    ignored_stats: IgnoredStats,
}

impl AtCommandProcessor {
    pub fn new(config: AtCommandConfig) -> Self {
        Self {
            config,
            stats: ProcessingStats::default(),
            ignored_stats: IgnoredStats::default(),
        }
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    pub fn ignored_stats(&self) -> &IgnoredStats {
        &self.ignored_stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ProcessingStats::default();
        self.ignored_stats = IgnoredStats::default();
    }

    /// 处理一条用户消息
    pub fn process(&mut self, query: &str, workspace_root: &Path) -> Result<ProcessedQuery> {
        let parts = parse_all_at_commands(query);
        let commands: Vec<&str> = parts
            .iter()
            .filter_map(|part| match part {
                AtCommandPart::AtPath(path) if validate_at_path(path) => Some(path.as_str()),
                _ => None,
            })
            .collect();

        if commands.is_empty() {
            return Ok(ProcessedQuery::unchanged(query));
        }

        let resolver = PathResolver::new(workspace_root, self.config.clone())?;
        let files = self.resolve_all(&resolver, &commands);

        let mut output = String::new();
        let mut included = Vec::new();
        for file in &files {
            let relative = relative_display(file, resolver.root());
            match read_text_file(file) {
                Ok(Some(content)) => {
                    self.stats.files_read += 1;
                    let content = truncate_middle(&content, self.config.max_inject_chars);
                    output.push_str(&format!("--- {} ---\n\n{}\n\n", relative, content));
                    included.push(relative);
                }
                Ok(None) => debug!(file = relative.as_str(), "skipping non-text file"),
                Err(e) => warn!(file = relative.as_str(), error = %format!("{:#}", e), "failed to read referenced file"),
            }
        }

        if included.is_empty() {
            let only_commands = parts
                .iter()
                .all(|part| part.is_at_path() || part.content().trim().is_empty());
            return Ok(ProcessedQuery {
                should_proceed: !only_commands,
                ..ProcessedQuery::unchanged(query)
            });
        }

        let text = format!(
            "{}\n{}{}\n\n{}",
            CONTENT_HEADER, output, CONTENT_FOOTER, query
        );
        Ok(ProcessedQuery {
            text,
            files_included: included,
            should_proceed: true,
        })
    }

    /// 逐个解析 @ 命令，按出现顺序去重后返回要注入的文件
    fn resolve_all(&mut self, resolver: &PathResolver, commands: &[&str]) -> Vec<PathBuf> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();

        for command in commands {
            self.stats.total_at_commands += 1;
            let result = resolver.resolve(command);
            for (relative, reason) in result.ignored {
                self.ignored_stats.record(relative, reason);
            }

            let accepted = match result.status {
                ResolveStatus::Resolved | ResolveStatus::DirectoryExpanded => true,
                ResolveStatus::Ambiguous => {
                    let count = result.resolved_paths.len();
                    if count <= self.config.max_ambiguous_include {
                        true
                    } else {
                        warn!(token = *command, matches = count, "too many matches, skipping");
                        false
                    }
                }
                ResolveStatus::NotFound
                | ResolveStatus::RejectedOutsideWorkspace
                | ResolveStatus::Ignored(_) => false,
            };

            if !accepted {
                self.stats.failed_paths += 1;
                continue;
            }
            self.stats.resolved_paths += 1;
            for path in result.resolved_paths {
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        files
    }
}
