//! 标签缓存 - 以 (相对路径, mtime, size) 为键，避免重复解析未修改的文件
//!
//! 缓存对象由调用方持有并显式传入引擎；磁盘文件损坏或版本不符时按冷启动处理，
//! 持久化失败只记录警告，永远不会把错误抛给调用方。

use super::extractor::TagExtractor;
use super::Tag;
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::utils::{read_json, write_json};

/// 缓存文件格式版本
const CACHE_VERSION: u32 = 1;

/// 文件指纹：mtime + size 同时匹配才视为命中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub mtime_secs: u64,
    pub mtime_nanos: u32,
    pub size: u64,
}

impl FileStamp {
    /// 读取文件当前指纹
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Ok(Self {
            mtime_secs: mtime.as_secs(),
            mtime_nanos: mtime.subsec_nanos(),
            size: meta.len(),
        })
    }
}

/// 缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    stamp: FileStamp,
    tags: Vec<Tag>,
}

/// 磁盘格式
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    saved_at: Option<String>,
    entries: HashMap<String, CacheEntry>,
}

/// 命中统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    /// 未命中次数，即调用提取器的次数
    pub misses: usize,
}

/// 标签缓存
pub struct TagCache {
    path: Option<PathBuf>,
    entries: HashMap<String, CacheEntry>,
    extractor: TagExtractor,
    stats: CacheStats,
    dirty: bool, // 是否有修改需要保存
}

impl TagCache {
    /// 仅存在于内存中的缓存
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
            extractor: TagExtractor::new(),
            stats: CacheStats::default(),
            dirty: false,
        }
    }

    /// 从磁盘加载缓存；文件缺失、损坏或版本不符都按空缓存处理
    pub fn load(cache_file: impl Into<PathBuf>) -> Self {
        let path = cache_file.into();
        let mut cache = Self::in_memory();

        if path.exists() {
            match read_json::<CacheFile>(&path) {
                Ok(file) if file.version == CACHE_VERSION => {
                    debug!(entries = file.entries.len(), "loaded tag cache");
                    cache.entries = file.entries;
                }
                Ok(file) => {
                    warn!(
                        found = file.version,
                        expected = CACHE_VERSION,
                        "tag cache version mismatch, starting cold"
                    );
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %format!("{:#}", e), "tag cache unreadable, starting cold");
                }
            }
        }

        cache.path = Some(path);
        cache
    }

    /// 替换提取器（注册额外语言时使用）
    pub fn with_extractor(mut self, extractor: TagExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn extractor(&self) -> &TagExtractor {
        &self.extractor
    }

    /// 获取文件标签：指纹匹配直接返回，否则重新提取并覆盖
    pub fn get_tags(&mut self, file_path: &Path, relative_path: &str) -> Vec<Tag> {
        let stamp = match FileStamp::of(file_path) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(file = relative_path, error = %e, "cannot stat file, skipping tags");
                return Vec::new();
            }
        };

        if let Some(tags) = self.lookup(file_path, relative_path, stamp) {
            return tags;
        }

        let tags = self.extractor.extract(file_path, relative_path);
        self.store(relative_path, stamp, tags.clone());
        tags
    }

    /// 批量获取：命中部分串行读取，未命中部分并行提取后串行写回
    pub fn get_tags_batch(&mut self, files: &[(PathBuf, String)]) -> Vec<(String, Vec<Tag>)> {
        let mut results: Vec<Option<Vec<Tag>>> = vec![None; files.len()];
        let mut misses = Vec::new();

        for (idx, (abs, rel)) in files.iter().enumerate() {
            match FileStamp::of(abs) {
                Ok(stamp) => match self.lookup(abs, rel, stamp) {
                    Some(tags) => results[idx] = Some(tags),
                    None => misses.push((idx, stamp)),
                },
                Err(e) => {
                    warn!(file = rel.as_str(), error = %e, "cannot stat file, skipping tags");
                    results[idx] = Some(Vec::new());
                }
            }
        }

        let extractor = &self.extractor;
        let extracted: Vec<(usize, FileStamp, Vec<Tag>)> = misses
            .into_par_iter()
            .map(|(idx, stamp)| {
                let (abs, rel) = &files[idx];
                (idx, stamp, extractor.extract(abs, rel))
            })
            .collect();

        for (idx, stamp, tags) in extracted {
            self.store(&files[idx].1, stamp, tags.clone());
            results[idx] = Some(tags);
        }

        files
            .iter()
            .zip(results)
            .map(|((_, rel), tags)| (rel.clone(), tags.unwrap_or_default()))
            .collect()
    }

    /// 命中时把标签的绝对路径换成本次传入的路径（项目目录可能已被移动）
    fn lookup(&mut self, file_path: &Path, relative_path: &str, stamp: FileStamp) -> Option<Vec<Tag>> {
        let entry = self.entries.get(relative_path)?;
        if entry.stamp != stamp {
            return None;
        }
        self.stats.hits += 1;
        let tags = entry
            .tags
            .iter()
            .map(|tag| Tag {
                file_path: file_path.to_path_buf(),
                ..tag.clone()
            })
            .collect();
        Some(tags)
    }

    fn store(&mut self, relative_path: &str, stamp: FileStamp, tags: Vec<Tag>) {
        self.stats.misses += 1;
        self.entries
            .insert(relative_path.to_string(), CacheEntry { stamp, tags });
        self.dirty = true;
    }

    /// 写回磁盘；失败只记录警告并返回 false
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return true;
        }
        let Some(path) = self.path.clone() else {
            return true;
        };

        let file = CacheFile {
            version: CACHE_VERSION,
            saved_at: Some(Utc::now().to_rfc3339()),
            entries: std::mem::take(&mut self.entries),
        };
        let result = write_json(&path, &file);
        self.entries = file.entries;

        match result {
            Ok(()) => {
                // 成功写入后清理 dirty 标记，避免每次都重复写盘
                self.dirty = false;
                true
            }
            Err(e) => {
                warn!(file = %path.display(), error = %format!("{:#}", e), "failed to persist tag cache");
                false
            }
        }
    }

    /// 清除缓存
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for TagCache {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch_later(path: &Path) {
        // 显式推进 mtime，避免文件系统时间粒度导致误判
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
    }

    #[test]
    fn test_second_call_is_a_hit() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.py");
        std::fs::write(&file, "def alpha():\n    return beta()\n").unwrap();

        let mut cache = TagCache::in_memory();
        let first = cache.get_tags(&file, "a.py");
        let second = cache.get_tags(&file, "a.py");

        assert_eq!(first, second);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_modified_file_is_re_extracted() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.py");
        std::fs::write(&file, "def alpha():\n    pass\n").unwrap();

        let mut cache = TagCache::in_memory();
        let before = cache.get_tags(&file, "a.py");

        std::fs::write(&file, "def gamma_delta():\n    pass\n").unwrap();
        touch_later(&file);
        let after = cache.get_tags(&file, "a.py");

        assert_ne!(before, after);
        assert!(after.iter().any(|t| t.name == "gamma_delta"));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_persist_and_reload() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("lib.rs");
        std::fs::write(&file, "pub fn hello() {}\n").unwrap();
        let cache_file = temp.path().join(".coder/repo_map/tags_cache.json");

        {
            let mut cache = TagCache::load(&cache_file);
            cache.get_tags(&file, "lib.rs");
            assert!(cache.flush());
        }
        assert!(cache_file.exists());

        let mut reloaded = TagCache::load(&cache_file);
        assert_eq!(reloaded.len(), 1);
        let tags = reloaded.get_tags(&file, "lib.rs");
        assert!(tags.iter().any(|t| t.name == "hello"));
        assert_eq!(reloaded.stats(), CacheStats { hits: 1, misses: 0 });
    }

    #[test]
    fn test_corrupt_cache_is_cold_start() {
        let temp = TempDir::new().unwrap();
        let cache_file = temp.path().join("tags_cache.json");
        std::fs::write(&cache_file, "{ this is not json").unwrap();

        let cache = TagCache::load(&cache_file);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unwritable_cache_does_not_fail() {
        let temp = TempDir::new().unwrap();
        // 父路径是一个普通文件，目录无法创建
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let file = temp.path().join("a.py");
        std::fs::write(&file, "def a_function():\n    pass\n").unwrap();

        let mut cache = TagCache::load(blocker.join("cache.json"));
        cache.get_tags(&file, "a.py");
        assert!(!cache.flush());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_batch_mixes_hits_and_misses() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.py");
        let b = temp.path().join("b.py");
        std::fs::write(&a, "def alpha():\n    pass\n").unwrap();
        std::fs::write(&b, "def beta():\n    pass\n").unwrap();

        let mut cache = TagCache::in_memory();
        cache.get_tags(&a, "a.py");

        let files = vec![
            (a.clone(), "a.py".to_string()),
            (b.clone(), "b.py".to_string()),
            (temp.path().join("gone.py"), "gone.py".to_string()),
        ];
        let results = cache.get_tags_batch(&files);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "a.py");
        assert!(results[1].1.iter().any(|t| t.name == "beta"));
        assert!(results[2].1.is_empty());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 2 });
    }

    #[test]
    fn test_hit_after_project_move_uses_new_location() {
        let temp = TempDir::new().unwrap();
        let old_root = temp.path().join("before");
        std::fs::create_dir_all(&old_root).unwrap();
        std::fs::write(old_root.join("store.py"), "class StoreThing:\n    pass\n").unwrap();
        let cache_file = temp.path().join("tags_cache.json");

        {
            let mut cache = TagCache::load(&cache_file);
            cache.get_tags(&old_root.join("store.py"), "store.py");
            assert!(cache.flush());
        }

        let new_root = temp.path().join("after");
        std::fs::rename(&old_root, &new_root).unwrap();
        let moved = new_root.join("store.py");

        let mut cache = TagCache::load(&cache_file);
        let single = cache.get_tags(&moved, "store.py");
        let batch = cache.get_tags_batch(&[(moved.clone(), "store.py".to_string())]);

        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 0 });
        assert!(!single.is_empty());
        assert!(single.iter().all(|t| t.file_path == moved));
        assert!(batch[0].1.iter().all(|t| t.file_path == moved));
    }
}
