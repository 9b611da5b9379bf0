//! codeloom CLI - index a directory and search it from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;

use codeloom::CodeloomConfig;
use codeloom::HashingEmbeddingProvider;
use codeloom::IndexOptions;
use codeloom::Orchestrator;
use codeloom::SearchMode;
use codeloom::SearchOptions;

#[derive(Parser)]
#[command(name = "codeloom")]
#[command(about = "Local, embedded code-search engine")]
struct Cli {
    /// Directory to index or search
    #[arg(default_value = ".")]
    workdir: PathBuf,

    /// Path to config file (default: {workdir}/.codeloom/config.toml or ~/.codeloom/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan, chunk, and embed a directory
    Index {
        /// Only index files in these languages (by registry name, e.g. "rust")
        #[arg(long)]
        language: Vec<String>,
    },

    /// Search a previously indexed directory
    Search {
        /// Search query
        query: String,

        /// Search mode: semantic, keyword, or hybrid
        #[arg(short, long, default_value = "hybrid")]
        mode: String,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<i32>,

        /// Minimum fused/raw score to include
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Include the full snippet text in results
        #[arg(long)]
        snippet: bool,
    },

    /// List registered codebases
    Codebases,

    /// List indexed files for a codebase
    Files,

    /// Show the effective configuration
    Config,
}

/// Set up the global subscriber. When `log_file` is given, logs go to it
/// through a non-blocking writer; the returned guard must be held for the
/// lifetime of `main` or buffered log lines are dropped on exit.
fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codeloom=info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_ref())?;
    let workdir = cli.workdir.canonicalize().unwrap_or_else(|_| cli.workdir.clone());

    let config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            CodeloomConfig::from_file(path)?
        }
        None => CodeloomConfig::load(&workdir)?,
    };

    for warning in config.validate_soft() {
        tracing::warn!("{warning}");
    }

    if matches!(cli.command, Command::Config) {
        return cmd_config(&config);
    }

    let embedder = Arc::new(HashingEmbeddingProvider::default());
    let orchestrator = Orchestrator::new(config, embedder)?;

    match cli.command {
        Command::Index { language } => cmd_index(&orchestrator, &workdir, language).await?,
        Command::Search { query, mode, limit, threshold, snippet } => {
            cmd_search(&orchestrator, &query, &mode, limit, threshold, snippet).await?
        }
        Command::Codebases => cmd_codebases(&orchestrator)?,
        Command::Files => cmd_files(&orchestrator)?,
        Command::Config => unreachable!(),
    }

    Ok(())
}

async fn cmd_index(orchestrator: &Orchestrator, workdir: &PathBuf, languages: Vec<String>) -> anyhow::Result<()> {
    let options = IndexOptions {
        languages: if languages.is_empty() { None } else { Some(languages) },
        verbose: false,
    };

    println!("Indexing {}...", workdir.display());
    let result = orchestrator.index(workdir, options).await?;

    println!(
        "Done in {}ms: {} files, {} chunks, {} embedded, {} skipped, {} removed",
        result.duration_ms, result.files, result.chunks, result.embedded, result.skipped, result.removed
    );
    for error in &result.errors {
        println!("  warning: {error}");
    }

    Ok(())
}

async fn cmd_search(
    orchestrator: &Orchestrator,
    query: &str,
    mode: &str,
    limit: Option<i32>,
    threshold: Option<f32>,
    snippet: bool,
) -> anyhow::Result<()> {
    let mode: SearchMode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let mut options = SearchOptions { mode, include_snippet: snippet, ..Default::default() };
    if let Some(limit) = limit {
        options.limit = limit;
    }
    if let Some(threshold) = threshold {
        options.threshold = threshold;
    }

    let results = orchestrator.search(query, options).await?;
    println!("Found {} results:\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {}:{}-{} {} {} (score: {:.3})",
            i + 1,
            result.file_path,
            result.start_line,
            result.end_line,
            result.kind,
            result.name,
            result.score
        );
        if !result.signature.is_empty() {
            println!("   {}", result.signature.trim());
        }
        if snippet && !result.snippet.is_empty() {
            for line in result.snippet.lines().take(3) {
                println!("   {}", line);
            }
        }
        println!();
    }

    Ok(())
}

fn cmd_codebases(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let codebases = orchestrator.list_codebases()?;
    for codebase in codebases {
        println!("{} {} (indexed_at: {})", codebase.id, codebase.root_path, codebase.indexed_at);
    }
    Ok(())
}

fn cmd_files(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let files = orchestrator.list_files(None)?;
    for file in files {
        println!("{} {} chunks ({})", file.file_path, file.chunk_count, file.file_hash);
    }
    Ok(())
}

fn cmd_config(config: &CodeloomConfig) -> anyhow::Result<()> {
    println!("data_dir: {}", config.data_dir.display());
    println!();
    println!("Indexing:");
    println!("  max_file_size_bytes: {}", config.indexing.max_file_size_bytes);
    println!("  batch_size: {}", config.indexing.batch_size);
    println!("  embed_batch_size: {}", config.indexing.embed_batch_size);
    println!();
    println!("Search:");
    println!("  rrf_k: {}", config.search.rrf_k);
    println!("  text_weight: {}", config.search.text_weight);
    println!("  vector_weight: {}", config.search.vector_weight);
    println!("  default_limit: {}", config.search.default_limit);
    println!("  default_threshold: {}", config.search.default_threshold);

    Ok(())
}
