//! 文件系统工具

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 安全读取文件内容
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

/// 读取文本文件；内容不是合法 UTF-8 时返回 None
pub fn read_text_file(path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(String::from_utf8(bytes).ok())
}

/// 安全写入文件
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    // 确保父目录存在
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

/// 删除文件，文件不存在时视为成功
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}

/// 把路径转换成以 `/` 分隔的相对路径（用作展示和图节点标识）
pub fn relative_display(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_write_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("nested/dir/test.txt");

        let content = "Hello, World!";
        write_file(&file_path, content).unwrap();

        let loaded = read_file(&file_path).unwrap();
        assert_eq!(loaded, content);
    }

    #[test]
    fn test_read_text_file_rejects_binary() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("blob.bin");
        fs::write(&bin, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        assert!(read_text_file(&bin).unwrap().is_none());
        assert!(read_text_file(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_remove_file_if_exists() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");
        write_file(&file_path, "x").unwrap();

        assert!(remove_file_if_exists(&file_path).unwrap());
        assert!(!remove_file_if_exists(&file_path).unwrap());
    }

    #[test]
    fn test_relative_display() {
        let root = Path::new("/work/project");
        assert_eq!(
            relative_display(Path::new("/work/project/src/main.rs"), root),
            "src/main.rs"
        );
        assert_eq!(relative_display(Path::new("/elsewhere/a.rs"), root), "/elsewhere/a.rs");
    }
}
