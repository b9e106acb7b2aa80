//! sift CLI: Semantic search over file and folder names

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sift_core::cache::IndexCache;
use sift_core::engine::ProgressEvent;
use sift_core::search::{self, SearchHit};
use sift_core::{
    Config, Engine, EngineHandle, FastEmbedder, HeuristicClassifier, PathClassifier, SIFT_DIR,
    Searcher, SiftError, discover,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Semantic search over file and folder names", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Show progress logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Search query (when no subcommand is given)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new .sift repository
    Init,

    /// Scan the search root and embed new paths
    Index,

    /// Show configuration and index statistics
    Status,

    /// Search the cached index
    Search {
        /// Search query
        query: Vec<String>,

        /// Maximum number of results (default: top_k from config)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive search while the index updates in the background
    Shell,

    /// Show how the relevance policy scores paths
    Classify {
        /// Paths to score
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Open a result with the platform's default application
    Open {
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Init) => cmd_init()?,
        Some(Commands::Index) => cmd_index()?,
        Some(Commands::Status) => cmd_status()?,
        Some(Commands::Search { query, limit, json }) => {
            let query = query.join(" ");
            cmd_search(&query, limit, json)?;
        }
        Some(Commands::Shell) => cmd_shell()?,
        Some(Commands::Classify { paths }) => cmd_classify(&paths)?,
        Some(Commands::Open { path }) => cmd_open(&path)?,
        None => {
            if cli.query.is_empty() {
                println!("Usage: sift <query> or sift <command>");
                println!("Run 'sift --help' for more information.");
            } else {
                let query = cli.query.join(" ");
                cmd_search(&query, None, false)?;
            }
        }
    }

    Ok(())
}

fn repo_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    discover::find_sift_root(&cwd).context("Not in a sift repository. Run 'sift init' first.")
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn cmd_init() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let sift_dir = cwd.join(SIFT_DIR);

    if sift_dir.exists() {
        anyhow::bail!("Already initialized: {} exists", sift_dir.display());
    }

    std::fs::create_dir(&sift_dir)?;
    Config::default().save(&cwd)?;

    println!("Initialized sift repository in {}", sift_dir.display());
    println!("Run 'sift index' to index files.");

    Ok(())
}

fn cmd_index() -> Result<()> {
    let root = repo_root()?;
    let config = Config::load(&root)?;

    let pb = spinner("Loading model...")?;
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("█▓░");

    let mut engine = Engine::builder(&config, &root)?
        .on_progress({
            let pb = pb.clone();
            move |event| match event {
                ProgressEvent::CacheLoaded { entries, filtered } => {
                    pb.set_message(format!(
                        "Loaded {} cached entries ({} filtered). Scanning...",
                        entries, filtered
                    ));
                }
                ProgressEvent::Scanned { found, new } => {
                    pb.set_message(format!("Scanned {} paths, {} new", found, new));
                }
                ProgressEvent::Embedding { current, total } => {
                    pb.set_style(bar_style.clone());
                    pb.set_length(total as u64);
                    pb.set_position(current as u64);
                    pb.set_message("Embedding names...");
                }
                ProgressEvent::Saved { entries } => {
                    pb.set_message(format!("Saved {} entries", entries));
                }
            }
        })
        .start(FastEmbedder::loader(&config, discover::models_dir(&root)))?;

    let result = engine.wait();
    pb.finish_and_clear();
    let report = result?;

    println!("✓ Indexing complete:");
    println!("  From cache:      {}", report.cached);
    println!("  Filtered out:    {}", report.filtered);
    println!("  Paths scanned:   {}", report.scanned);
    println!("  Newly embedded:  {}", report.embedded);
    if report.embedded > 0 && !report.saved {
        println!("  Warning: the cache could not be saved; see the log for details.");
    }

    Ok(())
}

fn cmd_status() -> Result<()> {
    let root = repo_root()?;
    let config = Config::load(&root)?;
    let cache = IndexCache::for_root(&root, &config);

    println!("sift repository: {}", root.display());
    println!();
    println!("Configuration:");
    println!("  Model: {}", config.model);
    println!("  Search root: {}", config.search_root(&root).display());
    println!("  Classifier: {}", config.classifier);
    println!("  Relevance threshold: {}", config.relevance_threshold);
    println!("  Excluded paths: {}", config.excluded_paths.len());
    println!("  Excluded patterns: {}", config.excluded_patterns.len());
    println!();
    println!("Index:");
    match cache.load() {
        Some(snapshot) => {
            println!("  Entries: {}", snapshot.len());
            if let Some(dimension) = snapshot.dimension() {
                println!("  Dimension: {}", dimension);
            }
        }
        None => println!("  No cached index. Run 'sift index' to build one."),
    }

    Ok(())
}

fn cmd_search(query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let root = repo_root()?;
    let config = Config::load(&root)?;
    let limit = limit.unwrap_or(config.top_k);

    let pb = spinner("Searching...")?;
    let result = Searcher::open(&root).and_then(|searcher| searcher.search(query, limit));
    pb.finish_and_clear();
    let hits = match result {
        Err(SiftError::NotReady) => search::not_ready(),
        other => other?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!("Results for: {}\n", query);
    print_hits(&hits);

    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    for (i, hit) in hits.iter().enumerate() {
        let score_color = if hit.score > 0.7 {
            "\x1b[32m"
        } else if hit.score > 0.5 {
            "\x1b[33m"
        } else {
            "\x1b[31m"
        };

        println!(
            "\x1b[1;36m[{}]\x1b[0m {}{:.3}\x1b[0m  \x1b[1m{}\x1b[0m",
            i + 1,
            score_color,
            hit.score,
            hit.name,
        );
        println!("    \x1b[2m{}\x1b[0m", hit.path);
    }
}

fn cmd_shell() -> Result<()> {
    let root = repo_root()?;
    let config = Config::load(&root)?;

    let engine = Engine::builder(&config, &root)?
        .start(FastEmbedder::loader(&config, discover::models_dir(&root)))?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(shell(engine))
}

async fn shell(mut engine: Engine) -> Result<()> {
    let handle = engine.handle();

    tokio::task::spawn_blocking(move || match engine.wait() {
        Ok(report) => tracing::info!(
            "Index up to date: {} cached, {} embedded",
            report.cached,
            report.embedded
        ),
        Err(e) => tracing::warn!("Background indexing stopped: {}", e),
    });

    println!("sift shell. Type a query, ':status' for the index status, Ctrl-D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "" => {}
            ":status" => println!("{}", handle.get_status()),
            ":q" | ":quit" => break,
            query => {
                let hits = run_query(&handle, query).await?;
                if hits.is_empty() {
                    println!("No results found for: {}", query);
                } else {
                    print_hits(&hits);
                }
            }
        }
    }

    Ok(())
}

async fn run_query(handle: &EngineHandle, query: &str) -> Result<Vec<SearchHit>> {
    let handle = handle.clone();
    let query = query.to_string();

    let hits = tokio::task::spawn_blocking(move || handle.search(&query)).await??;
    Ok(hits)
}

fn cmd_classify(paths: &[PathBuf]) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = match discover::find_sift_root(&cwd) {
        Ok(root) => Config::load(&root)?,
        Err(_) => Config::default(),
    };
    let classifier = HeuristicClassifier::new(&config)?;

    for path in paths {
        let path = if path.is_absolute() {
            path.clone()
        } else {
            cwd.join(path)
        };
        let verdict = if classifier.rules().excludes(&path) {
            "excluded"
        } else if classifier.is_relevant(&path) {
            "relevant"
        } else {
            "skipped"
        };
        println!(
            "{:.2} (threshold {:.2})  {:<8}  {}",
            classifier.score(&path),
            classifier.threshold(),
            verdict,
            path.display()
        );
    }

    Ok(())
}

fn cmd_open(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("No such file or directory: {}", path.display());
    }

    let mut command = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };

    let status = command
        .arg(path)
        .status()
        .with_context(|| format!("Failed to launch opener for {}", path.display()))?;
    if !status.success() {
        anyhow::bail!("Opener exited with {}", status);
    }

    Ok(())
}
