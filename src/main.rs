use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use coder_context::{
    find_project_root, format_for_prompt, handle_at_command,
    repo_map::{
        discover_files,
        mentions::{extract_file_mentions, extract_ident_mentions},
        HeuristicCounter, SampledCounter, TagExtractor,
    },
    utils::{init_logging, relative_display, remove_file_if_exists, write_file},
    Config, MapRequest, RepoMap, TagCache, TagKind,
};

/// Coder Context CLI
///
/// 为编码智能体生成仓库地图、展开 @ 文件引用
#[derive(Parser)]
#[command(name = "coder-context")]
#[command(author, version = env!("APP_VERSION"), about)]
struct Cli {
    /// 项目根目录（默认：自动检测）
    #[arg(short = 'C', long, global = true)]
    root: Option<PathBuf>,

    /// 输出调试日志（CODER_LOG 优先）
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成 Repository Map
    Map {
        /// token 预算（覆盖配置）
        #[arg(short, long)]
        tokens: Option<usize>,

        /// 已在对话中打开的文件
        #[arg(long = "chat")]
        chat: Vec<PathBuf>,

        /// 被提及的文件（相对路径）
        #[arg(long = "mention-file")]
        mention_files: Vec<String>,

        /// 被提及的标识符
        #[arg(long = "mention-ident")]
        mention_idents: Vec<String>,

        /// 从一段对话文本中提取被提及的文件和标识符
        #[arg(short, long)]
        message: Option<String>,

        /// 写入文件而不是标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 展开文本中的 @ 文件引用
    Expand {
        /// 用户输入
        text: String,
    },

    /// 显示单个文件提取出的标签
    Tags {
        file: PathBuf,
    },

    /// 删除磁盘上的标签缓存
    CacheClear,

    /// 显示项目根目录
    Root,
}

// ═══════════════════════════════════════════════════════════════════
// Repository Map
// ═══════════════════════════════════════════════════════════════════

struct MapArgs {
    tokens: Option<usize>,
    chat: Vec<PathBuf>,
    mention_files: Vec<String>,
    mention_idents: Vec<String>,
    message: Option<String>,
    output: Option<PathBuf>,
}

fn generate_repo_map(root: &Path, args: MapArgs) -> Result<()> {
    let mut config = Config::load(root)?;
    if let Some(tokens) = args.tokens {
        config.repo_map.map_tokens = tokens;
    }

    let chat_files: Vec<PathBuf> = args.chat.iter().map(|p| absolutize(root, p)).collect();
    let chat_set: BTreeSet<&PathBuf> = chat_files.iter().collect();
    let other_files: Vec<PathBuf> = discover_files(root, &config.repo_map)
        .into_iter()
        .filter(|p| !chat_set.contains(p))
        .collect();

    let mut mentioned_files: BTreeSet<String> = args.mention_files.into_iter().collect();
    let mut mentioned_idents: BTreeSet<String> = args.mention_idents.into_iter().collect();
    if let Some(message) = &args.message {
        let candidates: Vec<String> = other_files
            .iter()
            .map(|p| relative_display(p, root))
            .collect();
        mentioned_files.extend(extract_file_mentions(
            message,
            candidates.iter().map(String::as_str),
        ));
        mentioned_idents.extend(extract_ident_mentions(message));
    }

    eprintln!(
        "{}",
        format!("🗺️  Generating Repository Map ({} files)...", other_files.len())
            .cyan()
            .bold()
    );

    let request = MapRequest {
        chat_files,
        other_files,
        mentioned_files,
        mentioned_idents,
    };
    let mut cache = TagCache::load(config.cache_path());
    let counter = SampledCounter::new(HeuristicCounter::default());
    let mut engine = RepoMap::new(root, config.repo_map.clone());

    let map = engine.get_repo_map(&mut cache, &counter, &request);
    let text = format_for_prompt(map.as_deref());

    match args.output {
        Some(path) => {
            let path = absolutize(root, &path);
            write_file(&path, &text)?;
            eprintln!("{} {}", "✅ Saved to".green(), path.display());
        }
        None => println!("{}", text),
    }

    let stats = cache.stats();
    eprintln!(
        "{}",
        format!("   cache: {} hits, {} misses", stats.hits, stats.misses).dimmed()
    );
    Ok(())
}

fn show_tags(root: &Path, file: &Path) -> Result<()> {
    let path = absolutize(root, file);
    if !path.is_file() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let relative = relative_display(&path, root);
    let tags = TagExtractor::new().extract(&path, &relative);
    if tags.is_empty() {
        eprintln!("{}", format!("No tags found in {}", relative).yellow());
        return Ok(());
    }

    for tag in tags {
        let kind = match tag.kind {
            TagKind::Definition => "def".green(),
            TagKind::Reference => "ref".normal(),
        };
        println!("{:>5}  {}  {}", tag.line + 1, kind, tag.name);
    }
    Ok(())
}

fn clear_cache(root: &Path) -> Result<()> {
    let config = Config::load(root)?;
    let cache_file = config.cache_path();
    if remove_file_if_exists(&cache_file)? {
        eprintln!("{} {}", "🗑️  Cleared".yellow(), cache_file.display());
    } else {
        eprintln!("No cache at {}", cache_file.display());
    }
    Ok(())
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn project_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(root) => root
            .canonicalize()
            .with_context(|| format!("Invalid project root: {}", root.display())),
        None => {
            let cwd = std::env::current_dir().context("Cannot read current directory")?;
            Ok(find_project_root(&cwd))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = project_root(cli.root)?;

    match cli.command {
        Commands::Map {
            tokens,
            chat,
            mention_files,
            mention_idents,
            message,
            output,
        } => generate_repo_map(
            &root,
            MapArgs {
                tokens,
                chat,
                mention_files,
                mention_idents,
                message,
                output,
            },
        ),
        Commands::Expand { text } => {
            let config = Config::load_or_default(&root);
            println!("{}", handle_at_command(&text, &config));
            Ok(())
        }
        Commands::Tags { file } => show_tags(&root, &file),
        Commands::CacheClear => clear_cache(&root),
        Commands::Root => {
            println!("{}", root.display());
            Ok(())
        }
    }
}
