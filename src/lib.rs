// Coder Context - Library Root
//
// 为编码智能体组装 prompt 上下文：仓库地图 + @ 文件引用展开

pub mod at_command;
pub mod config;
pub mod repo_map;
pub mod utils;

// 重新导出常用类型
pub use at_command::{handle_at_command, AtCommandProcessor, WorkspaceRoot};
pub use config::{AtCommandConfig, Config, RefreshMode, RepoMapConfig};
pub use repo_map::{format_for_prompt, MapRequest, RepoMap, Tag, TagCache, TagKind};
pub use utils::find_project_root;
