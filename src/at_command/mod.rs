//! @ 命令 - 把用户消息中的 `@path` 引用展开为文件内容
//!
//! 解析 → 路径解析（工作区边界、忽略规则、模糊匹配、目录展开） → 内容注入。
//! 对调用方严格只做加法：任何内部失败都原样返回用户输入。

pub mod ignore;
pub mod parser;
pub mod processor;
pub mod resolver;

use std::path::{Path, PathBuf};
use tracing::warn;

pub use self::ignore::{IgnoreReason, IgnoreRules, CUSTOM_IGNORE_FILE};
pub use parser::{
    escape_at_path, extract_file_content_info, parse_all_at_commands, validate_at_path,
    AtCommandPart,
};
pub use processor::{
    AtCommandProcessor, IgnoredStats, ProcessedQuery, ProcessingStats, CONTENT_FOOTER,
    CONTENT_HEADER,
};
pub use resolver::{resolve, PathResolver, ResolveError, ResolveStatus, ResolvedPath};

use crate::config::{AtCommandConfig, Config};

/// 能提供工作区根目录的对象
pub trait WorkspaceRoot {
    fn root_dir(&self) -> &Path;

    /// @ 命令配置，默认使用内置默认值
    fn at_command_config(&self) -> AtCommandConfig {
        AtCommandConfig::default()
    }
}

impl WorkspaceRoot for Path {
    fn root_dir(&self) -> &Path {
        self
    }
}

impl WorkspaceRoot for PathBuf {
    fn root_dir(&self) -> &Path {
        self
    }
}

impl WorkspaceRoot for Config {
    fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn at_command_config(&self) -> AtCommandConfig {
        self.at_command.clone()
    }
}

/// 处理一条用户消息；失败时原样返回输入
pub fn handle_at_command<W>(query: &str, workspace: &W) -> String
where
    W: WorkspaceRoot + ?Sized,
{
    let mut processor = AtCommandProcessor::new(workspace.at_command_config());
    match processor.process(query, workspace.root_dir()) {
        Ok(result) => result.text,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "@ command processing failed, passing query through");
            query.to_string()
        }
    }
}
