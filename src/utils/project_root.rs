// Project Root Finder
// 项目根目录查找逻辑

use std::path::{Path, PathBuf};
use std::process::Command;

/// 项目标记目录
pub const PROJECT_MARKER: &str = ".coder";

/// 查找项目根目录
///
/// 查找策略:
/// 1. 从起点向上遍历查找 .coder 目录
/// 2. git 仓库根目录
/// 3. 起点本身
pub fn find_project_root(start: &Path) -> PathBuf {
    // 方法1: 向上遍历
    for dir in start.ancestors() {
        if dir.join(PROJECT_MARKER).is_dir() {
            return dir.to_path_buf();
        }
    }

    // 方法2: git 仓库根目录
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start)
        .output()
    {
        if output.status.success() {
            let git_root = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !git_root.is_empty() {
                return PathBuf::from(git_root);
            }
        }
    }

    // 方法3: 起点
    start.to_path_buf()
}

/// 从当前工作目录开始查找
pub fn find_project_root_from_cwd() -> Option<PathBuf> {
    std::env::current_dir().ok().map(|cwd| find_project_root(&cwd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_directory_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".coder")).unwrap();
        let nested = temp.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), temp.path());
    }

    #[test]
    fn test_falls_back_to_start() {
        let temp = TempDir::new().unwrap();
        // 临时目录不在 git 仓库中，也没有标记目录
        let root = find_project_root(temp.path());
        assert!(root == temp.path() || root.join(".git").exists());
    }
}
