//! 工具模块
//!
//! 提供 JSON、文件系统、截断、项目根目录、日志等常用工具函数

pub mod fs;
pub mod json;
pub mod logging;
pub mod project_root;
pub mod truncate;

// 重导出
pub use fs::*;
pub use json::*;
pub use logging::init_logging;
pub use project_root::{find_project_root, find_project_root_from_cwd};
pub use truncate::{truncate_line, truncate_middle};
