use coder_context::repo_map::{
    discover_files, rank, HeuristicCounter, MapItem, MapRenderer, TokenCounter,
};
use coder_context::{format_for_prompt, MapRequest, RepoMap, RepoMapConfig, TagCache};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

/// 一个小型多语言项目：`store.rs` 被所有人引用
fn polyglot_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        "src/store.rs",
        "pub struct Store {\n    items: Vec<String>,\n}\n\nimpl Store {\n    pub fn insert_item(&mut self, item: String) {\n        self.items.push(item);\n    }\n\n    pub fn item_count(&self) -> usize {\n        self.items.len()\n    }\n}\n",
    );
    write(
        root,
        "src/api.rs",
        "use crate::store::Store;\n\npub fn handle_insert(store: &mut Store, value: String) -> usize {\n    store.insert_item(value);\n    store.item_count()\n}\n\npub fn handle_count(store: &Store) -> usize {\n    store.item_count()\n}\n",
    );
    write(
        root,
        "src/main.rs",
        "mod api;\nmod store;\n\nfn main() {\n    let mut store = store::Store { items: Vec::new() };\n    let total = api::handle_insert(&mut store, String::from(\"x\"));\n    println!(\"{}\", total);\n    println!(\"{}\", api::handle_count(&store));\n}\n",
    );
    write(
        root,
        "scripts/report.py",
        "import json\n\ndef build_report(rows):\n    summary = {\"count\": len(rows)}\n    return json.dumps(summary)\n\ndef print_report(rows):\n    print(build_report(rows))\n",
    );
    write(root, "Cargo.toml", "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n");
    temp
}

fn all_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walk(root);
    files.sort();
    files
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out
}

#[test]
fn end_to_end_map_prefers_shared_definitions() {
    let temp = polyglot_project();
    let mut engine = RepoMap::new(temp.path(), RepoMapConfig::default());
    let mut cache = TagCache::in_memory();
    let request = MapRequest {
        other_files: all_files(temp.path()),
        ..MapRequest::default()
    };

    let map = engine
        .get_repo_map(&mut cache, &HeuristicCounter::default(), &request)
        .expect("map");

    assert!(map.contains("src/store.rs:"));
    assert!(map.contains("│pub struct Store {"));
    assert!(map.lines().any(|l| l == "Cargo.toml"));

    let prompt = format_for_prompt(Some(&map));
    assert!(prompt.starts_with("Repository Map:\n"));
}

#[test]
fn small_budget_keeps_the_highest_ranked_file() {
    let temp = polyglot_project();
    let config = RepoMapConfig {
        map_tokens: 12,
        map_mul_no_files: 1,
        ..RepoMapConfig::default()
    };
    let mut engine = RepoMap::new(temp.path(), config);
    let mut cache = TagCache::in_memory();
    let counter = |text: &str| text.lines().count();
    let request = MapRequest {
        other_files: all_files(temp.path())
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "rs"))
            .collect(),
        ..MapRequest::default()
    };

    let map = engine.get_repo_map(&mut cache, &counter, &request).expect("map");
    assert!(counter.count_tokens(&map) <= 12);
    assert!(map.contains("src/store.rs:"), "{}", map);
}

#[test]
fn ranking_is_deterministic_across_runs() {
    let temp = polyglot_project();
    let files = all_files(temp.path());
    let mut cache = TagCache::in_memory();
    let batch: Vec<(PathBuf, String)> = files
        .iter()
        .map(|p| {
            let rel = p.strip_prefix(temp.path()).unwrap().to_string_lossy().replace('\\', "/");
            (p.clone(), rel)
        })
        .collect();
    let tags: BTreeMap<String, _> = cache.get_tags_batch(&batch).into_iter().collect();

    let empty = BTreeSet::new();
    let first = rank(&tags, &empty, &empty, &empty);
    let second = rank(&tags, &empty, &empty, &empty);
    assert_eq!(first, second);
    assert!(!first.is_empty());
    assert_eq!(first[0].relative_path, "src/store.rs");
}

#[test]
fn renderer_budget_monotonicity_on_real_ranking() {
    let temp = polyglot_project();
    let files = all_files(temp.path());
    let mut cache = TagCache::in_memory();
    let batch: Vec<(PathBuf, String)> = files
        .iter()
        .map(|p| {
            let rel = p.strip_prefix(temp.path()).unwrap().to_string_lossy().replace('\\', "/");
            (p.clone(), rel)
        })
        .collect();
    let tags: BTreeMap<String, _> = cache.get_tags_batch(&batch).into_iter().collect();
    let empty = BTreeSet::new();
    // 每个文件只保留得分最高的定义，保证前缀渲染的 token 数单调
    let mut seen = BTreeSet::new();
    let items: Vec<MapItem> = rank(&tags, &empty, &empty, &empty)
        .into_iter()
        .filter(|entry| seen.insert(entry.relative_path.clone()))
        .map(MapItem::Tag)
        .collect();

    let renderer = MapRenderer::default();
    let counter = HeuristicCounter::default();
    let mut previous = 0;
    for budget in (0..400).step_by(10) {
        let included = renderer
            .render(&items, budget, &counter)
            .map(|r| r.items_included)
            .unwrap_or(0);
        assert!(included >= previous);
        previous = included;
    }
    assert_eq!(previous, items.len());
}

#[test]
fn tag_cache_survives_restart() {
    let temp = polyglot_project();
    let cache_file = temp.path().join(".coder/repo_map/tags_cache.json");
    let files = all_files(temp.path());
    let request = MapRequest {
        other_files: files,
        ..MapRequest::default()
    };

    {
        let mut cache = TagCache::load(&cache_file);
        let mut engine = RepoMap::new(temp.path(), RepoMapConfig::default());
        engine.get_repo_map(&mut cache, &HeuristicCounter::default(), &request);
    }

    let mut cache = TagCache::load(&cache_file);
    let mut engine = RepoMap::new(temp.path(), RepoMapConfig::default());
    engine.get_repo_map(&mut cache, &HeuristicCounter::default(), &request);
    assert_eq!(cache.stats().misses, 0);
    assert!(cache.stats().hits > 0);
}

#[test]
fn discovery_feeds_the_engine() {
    let temp = polyglot_project();
    let files = discover_files(temp.path(), &RepoMapConfig::default());
    assert!(files.iter().any(|p| p.ends_with("src/store.rs")));
    // 清单文件虽然很短，但属于重要文件
    assert!(files.iter().any(|p| p.ends_with("Cargo.toml")));
}

#[test]
fn moved_project_still_renders_from_shared_cache() {
    let outer = TempDir::new().unwrap();
    let old_root = outer.path().join("project");
    write(&old_root, "store.py", "class StoreThing:\n    def put(self, item):\n        return item\n");
    write(&old_root, "app.py", "from store import StoreThing\n\nthing = StoreThing()\nthing.put(1)\n");
    let cache_file = outer.path().join("tags_cache.json");

    let request_for = |root: &Path| MapRequest {
        other_files: all_files(root),
        ..MapRequest::default()
    };

    {
        let mut cache = TagCache::load(&cache_file);
        let mut engine = RepoMap::new(&old_root, RepoMapConfig::default());
        let map = engine
            .get_repo_map(&mut cache, &HeuristicCounter::default(), &request_for(&old_root))
            .expect("map before move");
        assert!(map.contains("store.py:\n│class StoreThing:"));
    }

    let new_root = outer.path().join("renamed");
    std::fs::rename(&old_root, &new_root).unwrap();

    let mut cache = TagCache::load(&cache_file);
    let mut engine = RepoMap::new(&new_root, RepoMapConfig::default());
    let map = engine
        .get_repo_map(&mut cache, &HeuristicCounter::default(), &request_for(&new_root))
        .expect("map after move");
    assert!(map.contains("store.py:\n│class StoreThing:"));
    assert_eq!(cache.stats().misses, 0);
}
