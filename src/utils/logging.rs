//! 日志初始化
//!
//! 日志写到 stderr，stdout 只留给地图和展开后的文本。

use tracing_subscriber::EnvFilter;

/// 控制日志级别的环境变量
pub const LOG_ENV: &str = "CODER_LOG";

/// 安装全局 fmt subscriber；重复调用是无害的
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
