//! 重要性排序 - 文件 ↔ 标识符二部图上的个性化 PageRank
//!
//! 边：引用方文件 → 标识符，标识符 → 定义方文件。每次调用都从当前标签集合
//! 重新建图，排序完即丢弃。所有中间集合都用 BTree 容器，保证同样的输入
//! 以同样的顺序累加浮点数，输出逐字节一致。

use super::{Tag, TagKind};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// 排序结果中的一项：某个文件里的一个定义及其得分
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub relative_path: String,
    pub tag: Tag,
    pub score: f64,
}

/// 边权与个性化参数
#[derive(Debug, Clone)]
pub struct RankWeights {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// 被提及的标识符
    pub mentioned_ident: f64,
    /// 长度 >= 8 的 snake_case / camelCase 标识符
    pub long_ident: f64,
    /// `_` 开头的标识符
    pub private_ident: f64,
    /// 在超过 5 个文件中都有定义的标识符
    pub widely_defined: f64,
    /// 引用方是已打开的对话文件
    pub chat_referencer: f64,
    /// 定义方是被提及的文件
    pub mentioned_definer: f64,
    /// 定义方文件名以 `_` 开头（私有模块、`__init__.py` 等）
    pub private_definer: f64,
    pub chat_file_restart: f64,
    pub mentioned_file_restart: f64,
    pub mentioned_ident_restart: f64,
    /// 未被其它文件引用的定义仍然分到的最小权重
    pub unreferenced_share: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-9,
            mentioned_ident: 10.0,
            long_ident: 10.0,
            private_ident: 0.1,
            widely_defined: 0.1,
            chat_referencer: 50.0,
            mentioned_definer: 10.0,
            private_definer: 0.1,
            chat_file_restart: 100.0,
            mentioned_file_restart: 50.0,
            mentioned_ident_restart: 50.0,
            unreferenced_share: 0.1,
        }
    }
}

/// 使用默认权重排序
pub fn rank(
    tags_by_file: &BTreeMap<String, Vec<Tag>>,
    mentioned_files: &BTreeSet<String>,
    mentioned_idents: &BTreeSet<String>,
    chat_files: &BTreeSet<String>,
) -> Vec<RankEntry> {
    rank_with(
        &RankWeights::default(),
        tags_by_file,
        mentioned_files,
        mentioned_idents,
        chat_files,
    )
}

/// 排序。对话文件自身的定义不会出现在结果中（它们已经在 prompt 里了）。
pub fn rank_with(
    weights: &RankWeights,
    tags_by_file: &BTreeMap<String, Vec<Tag>>,
    mentioned_files: &BTreeSet<String>,
    mentioned_idents: &BTreeSet<String>,
    chat_files: &BTreeSet<String>,
) -> Vec<RankEntry> {
    // ident -> file -> 次数
    let mut defines: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    let mut references: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();

    for (file, tags) in tags_by_file {
        for tag in tags {
            let table = match tag.kind {
                TagKind::Definition => &mut defines,
                TagKind::Reference => &mut references,
            };
            *table
                .entry(tag.name.as_str())
                .or_default()
                .entry(file.as_str())
                .or_default() += 1;
        }
    }

    let shared: Vec<&str> = defines
        .keys()
        .copied()
        .filter(|ident| references.contains_key(ident))
        .collect();

    if shared.is_empty() {
        debug!("no identifier is both defined and referenced, using uniform ranking");
        return uniform_ranking(tags_by_file, chat_files);
    }

    // 节点：先文件（按路径排序），后标识符
    let mut file_set: BTreeSet<&str> = BTreeSet::new();
    for ident in &shared {
        file_set.extend(defines[ident].keys().copied());
        file_set.extend(references[ident].keys().copied());
    }
    let files: Vec<&str> = file_set.into_iter().collect();
    let file_index: BTreeMap<&str, usize> =
        files.iter().enumerate().map(|(i, f)| (*f, i)).collect();
    let node_count = files.len() + shared.len();

    let mut edges: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
    for (i, ident) in shared.iter().enumerate() {
        let ident_node = files.len() + i;
        let definers = &defines[ident];
        let mul = ident_multiplier(weights, ident, definers.len(), mentioned_idents);

        // 标识符只有一条出边时权重会被归一化抵消，所以定义方因子的均值
        // 同时乘到引用边上，影响引用方在各标识符之间的分配
        let definer_factors: Vec<f64> = definers
            .keys()
            .map(|file| definer_factor(weights, file, mentioned_files))
            .collect();
        let mean_factor = definer_factors.iter().sum::<f64>() / definer_factors.len() as f64;

        for (file, count) in &references[ident] {
            let mut weight = mul * mean_factor * (*count as f64).sqrt();
            if chat_files.contains(*file) {
                weight *= weights.chat_referencer;
            }
            edges[file_index[file]].push((ident_node, weight));
        }

        for (file, factor) in definers.keys().zip(definer_factors) {
            edges[ident_node].push((file_index[file], mul * factor));
        }
    }

    let mut restart = vec![0.0; node_count];
    for (i, file) in files.iter().enumerate() {
        if chat_files.contains(*file) {
            restart[i] += weights.chat_file_restart;
        }
        if mentioned_files.contains(*file) {
            restart[i] += weights.mentioned_file_restart;
        }
    }
    for (i, ident) in shared.iter().enumerate() {
        if mentioned_idents.contains(*ident) {
            restart[files.len() + i] += weights.mentioned_ident_restart;
        }
    }

    let scores = personalized_pagerank(&edges, restart, weights);

    let mut ranking = Vec::new();
    for (i, file) in files.iter().enumerate() {
        if chat_files.contains(*file) {
            continue;
        }
        let Some(tags) = tags_by_file.get(*file) else {
            continue;
        };
        distribute_file_rank(weights, file, scores[i], tags, &references, &mut ranking);
    }

    sort_ranking(&mut ranking);
    ranking
}

/// 把文件的总得分按“被其它文件引用的次数”分给它自己的定义
fn distribute_file_rank(
    weights: &RankWeights,
    file: &str,
    file_rank: f64,
    tags: &[Tag],
    references: &BTreeMap<&str, BTreeMap<&str, usize>>,
    out: &mut Vec<RankEntry>,
) {
    let definitions: Vec<&Tag> = tags
        .iter()
        .filter(|t| t.kind == TagKind::Definition)
        .collect();
    if definitions.is_empty() {
        return;
    }

    let shares: Vec<f64> = definitions
        .iter()
        .map(|tag| {
            let external: usize = references
                .get(tag.name.as_str())
                .map(|by_file| {
                    by_file
                        .iter()
                        .filter(|(f, _)| **f != file)
                        .map(|(_, n)| *n)
                        .sum()
                })
                .unwrap_or(0);
            external as f64 + weights.unreferenced_share
        })
        .collect();
    let total: f64 = shares.iter().sum();

    for (tag, share) in definitions.into_iter().zip(shares) {
        out.push(RankEntry {
            relative_path: file.to_string(),
            tag: tag.clone(),
            score: file_rank * share / total,
        });
    }
}

/// 带重启向量的加权 PageRank（幂迭代）。悬挂节点的质量按重启向量回流。
fn personalized_pagerank(
    edges: &[Vec<(usize, f64)>],
    mut restart: Vec<f64>,
    weights: &RankWeights,
) -> Vec<f64> {
    let n = edges.len();
    let restart_total: f64 = restart.iter().sum();
    if restart_total > 0.0 {
        restart.iter_mut().for_each(|r| *r /= restart_total);
    } else {
        restart = vec![1.0 / n as f64; n];
    }

    let out_weight: Vec<f64> = edges
        .iter()
        .map(|out| out.iter().map(|(_, w)| w).sum())
        .collect();

    let damping = weights.damping;
    let mut scores = vec![1.0 / n as f64; n];

    for iteration in 0..weights.max_iterations {
        let mut next = vec![0.0; n];
        let mut dangling = 0.0;

        for (source, out) in edges.iter().enumerate() {
            if out_weight[source] <= 0.0 {
                dangling += scores[source];
                continue;
            }
            for (target, weight) in out {
                next[*target] += damping * scores[source] * weight / out_weight[source];
            }
        }

        let teleport = damping * dangling + (1.0 - damping);
        for (value, r) in next.iter_mut().zip(&restart) {
            *value += teleport * r;
        }

        let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        if delta < n as f64 * weights.tolerance {
            debug!(iterations = iteration + 1, "pagerank converged");
            break;
        }
    }

    scores
}

/// 图中没有任何边时：所有定义按路径排序、得分均匀
fn uniform_ranking(
    tags_by_file: &BTreeMap<String, Vec<Tag>>,
    chat_files: &BTreeSet<String>,
) -> Vec<RankEntry> {
    let mut ranking: Vec<RankEntry> = tags_by_file
        .iter()
        .filter(|(file, _)| !chat_files.contains(*file))
        .flat_map(|(file, tags)| {
            tags.iter()
                .filter(|t| t.kind == TagKind::Definition)
                .map(move |tag| RankEntry {
                    relative_path: file.clone(),
                    tag: tag.clone(),
                    score: 0.0,
                })
        })
        .collect();

    if !ranking.is_empty() {
        let score = 1.0 / ranking.len() as f64;
        ranking.iter_mut().for_each(|entry| entry.score = score);
    }
    sort_ranking(&mut ranking);
    ranking
}

/// 得分降序；同分按路径、行号、名称
fn sort_ranking(ranking: &mut [RankEntry]) {
    ranking.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
            .then_with(|| a.tag.line.cmp(&b.tag.line))
            .then_with(|| a.tag.name.cmp(&b.tag.name))
    });
}

fn ident_multiplier(
    weights: &RankWeights,
    ident: &str,
    definer_count: usize,
    mentioned_idents: &BTreeSet<String>,
) -> f64 {
    let mut mul = 1.0;

    if mentioned_idents.contains(ident) {
        mul *= weights.mentioned_ident;
    }

    let is_snake = ident.contains('_') && ident.chars().any(|c| c.is_alphabetic());
    let is_camel =
        ident.chars().any(|c| c.is_uppercase()) && ident.chars().any(|c| c.is_lowercase());
    if ident.chars().count() >= 8 && (is_snake || is_camel) {
        mul *= weights.long_ident;
    }

    if ident.starts_with('_') {
        mul *= weights.private_ident;
    }
    if definer_count > 5 {
        mul *= weights.widely_defined;
    }

    mul
}

fn definer_factor(weights: &RankWeights, file: &str, mentioned_files: &BTreeSet<String>) -> f64 {
    let mut factor = 1.0;
    if mentioned_files.contains(file) {
        factor *= weights.mentioned_definer;
    }
    if is_private_file(file) {
        factor *= weights.private_definer;
    }
    factor
}

fn is_private_file(relative_path: &str) -> bool {
    relative_path
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .is_some_and(|name| name.starts_with('_'))
}
