//! CLI argument parsing and command handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CACHE_DIR, CacheStore};
use crate::config::load_workspace_config;
use crate::git::{GitCli, is_git_repo};
use crate::indexer::{IndexProgress, Indexer, ProgressCallback};
use crate::matcher::{SearchEngine, SearchOptions};
use crate::models::{IndexStats, Scope, ScoredEntity};
use crate::output;
use crate::store::IndexStore;
use crate::watcher::WatchConfig;

/// Navdex: fuzzy navigation over files, symbols and commands
#[derive(Parser, Debug)]
#[command(
    name = "ndx",
    version,
    about = "Fuzzy go-to-anything index for a code workspace",
    long_about = "Navdex indexes the files of a workspace and the declarations inside them \
                  (classes, interfaces, functions, properties) and answers fuzzy, acronym \
                  and typo-tolerant queries against them. Symbols are cached in .navdex/ \
                  so re-indexing an unchanged workspace is cheap."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a workspace and refresh the symbol cache
    Index {
        /// Workspace root (defaults to current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Suppress progress bar and summary
        #[arg(short, long)]
        quiet: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search the index
    ///
    /// Examples:
    ///   ndx search UsrSvc                  # fuzzy
    ///   ndx search RB --scope types        # acronym: ResetBalances
    ///   ndx search Recieve --json          # typo tolerant
    Search {
        /// Search query
        query: String,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Scope: everything, types, symbols, files, commands, properties, text
        #[arg(short, long, default_value = "everything")]
        scope: Scope,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Exact and prefix matches only
        #[arg(long)]
        burst: bool,

        /// Disable acronym matching
        #[arg(long)]
        no_acronym: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,
    },

    /// List entities declaring that they implement or extend a type
    Implementations {
        /// Type name, e.g. IDisposable
        type_name: String,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the files changed between two git refs to the index
    Sync {
        /// Base ref
        ref_a: String,

        /// Target ref
        ref_b: String,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Output counts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Index, then keep the index current as files change
    Watch {
        /// Workspace root (defaults to current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Quiet period in milliseconds (overrides config.toml)
        #[arg(short, long)]
        debounce: Option<u64>,

        /// Suppress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Delete the local cache
    Clear {
        /// Workspace root
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let log_level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        if let Command::Clear { path, yes } = &self.command {
            return handle_clear(path, *yes);
        }

        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

        runtime.block_on(async move {
            match self.command {
                Command::Index { path, quiet, json } => handle_index(&path, quiet, json).await,
                Command::Search {
                    query,
                    path,
                    scope,
                    limit,
                    burst,
                    no_acronym,
                    json,
                    pretty,
                } => {
                    handle_search(&path, &query, scope, limit, burst, !no_acronym, json, pretty)
                        .await
                }
                Command::Implementations {
                    type_name,
                    path,
                    json,
                } => handle_implementations(&path, &type_name, json).await,
                Command::Sync {
                    ref_a,
                    ref_b,
                    path,
                    json,
                } => handle_sync(&path, &ref_a, &ref_b, json).await,
                Command::Watch {
                    path,
                    debounce,
                    quiet,
                } => handle_watch(&path, debounce, quiet).await,
                Command::Clear { .. } => Ok(()),
            }
        })
    }
}

/// Build the indexer for a workspace: SQLite cache, config.toml, git when present
fn open_indexer(path: &Path) -> Result<Indexer> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", path.display()))?;

    let cache = CacheStore::open(&root)?;
    let config = load_workspace_config(&root)?;

    let indexer = Indexer::new(&root, config, Arc::new(IndexStore::new()), cache)?;

    if is_git_repo(&root) {
        log::debug!("Using git for discovery and content hashes");
        Ok(indexer.with_version_control(Arc::new(GitCli::new())))
    } else {
        Ok(indexer)
    }
}

/// Run a full index, drawing a progress bar unless quiet
async fn run_index(indexer: &Indexer, show_progress: bool) -> Result<IndexStats> {
    let pb = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let bar = pb.clone();
    let progress: ProgressCallback = Arc::new(move |p: IndexProgress| {
        bar.set_message(p.phase.to_string());
        bar.set_length(p.total as u64);
        bar.set_position(p.processed as u64);
    });

    let stats = indexer
        .index_workspace(Some(progress))
        .await
        .context("An indexing run is already in progress")?;
    pb.finish_and_clear();

    if stats.failures > 0 {
        output::warn(&format!(
            "{} files failed to index (run with -v for details)",
            stats.failures
        ));
    }

    Ok(stats)
}

async fn handle_index(path: &Path, quiet: bool, json: bool) -> Result<()> {
    log::info!("Starting index build");

    let indexer = open_indexer(path)?;
    let stats = run_index(&indexer, !quiet && !json).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if !quiet {
        println!("Indexing complete!");
        println!("  Files:       {}", stats.files);
        println!("  Entities:    {}", stats.entities);
        println!("  Cache hits:  {}", stats.cache_hits);
        println!("  Extracted:   {}", stats.extracted);
        println!("  Duration:    {}ms", stats.duration_ms);
        println!("  Cache:       {}", indexer.root().join(CACHE_DIR).display());
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_search(
    path: &Path,
    query: &str,
    scope: Scope,
    limit: usize,
    burst: bool,
    acronym: bool,
    json: bool,
    pretty: bool,
) -> Result<()> {
    let indexer = open_indexer(path)?;
    // Served from the symbol cache when the workspace is unchanged
    run_index(&indexer, false).await?;

    let engine = SearchEngine::new(Arc::clone(indexer.store()))
        .with_options(SearchOptions::from(indexer.config()));

    let start = Instant::now();
    let results = if burst {
        engine.burst_search(query, scope, limit)
    } else {
        engine.search(
            query,
            scope,
            limit,
            acronym && indexer.config().enable_acronym_match,
        )
    };
    log::info!("Search for {:?} took {:?}", query, start.elapsed());

    if json {
        let json_output = if pretty {
            serde_json::to_string_pretty(&results)?
        } else {
            serde_json::to_string(&results)?
        };
        println!("{}", json_output);
    } else if results.is_empty() {
        println!("No matches for {:?}", query);
    } else {
        for result in &results {
            output::result_line(result, indexer.root());
        }
    }

    Ok(())
}

async fn handle_implementations(path: &Path, type_name: &str, json: bool) -> Result<()> {
    let indexer = open_indexer(path)?;
    run_index(&indexer, false).await?;

    let found = indexer.store().find_implementations(type_name);

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else if found.is_empty() {
        println!("No implementations of {}", type_name);
    } else {
        for entity in found {
            output::result_line(&ScoredEntity { entity, score: 1.0 }, indexer.root());
        }
    }

    Ok(())
}

async fn handle_sync(path: &Path, ref_a: &str, ref_b: &str, json: bool) -> Result<()> {
    let indexer = open_indexer(path)?;
    if !is_git_repo(indexer.root()) {
        anyhow::bail!("Not a git repository: {}", indexer.root().display());
    }

    run_index(&indexer, false).await?;
    let delta = indexer.sync_delta(ref_a, ref_b).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&delta)?);
    } else {
        println!("Synced {}..{}", ref_a, ref_b);
        println!("  Created: {}", delta.created);
        println!("  Changed: {}", delta.changed);
        println!("  Deleted: {}", delta.deleted);
        println!("  Ignored: {}", delta.ignored);
    }

    Ok(())
}

async fn handle_watch(path: &Path, debounce: Option<u64>, quiet: bool) -> Result<()> {
    log::info!("Starting watch mode for {:?}", path);

    let indexer = Arc::new(open_indexer(path)?);
    let mut watch_config = WatchConfig::from_index_config(indexer.config());
    watch_config.quiet = quiet;
    if let Some(debounce_ms) = debounce {
        watch_config.debounce_ms = debounce_ms;
    }

    if !quiet {
        println!("Starting Navdex watch mode...");
        println!("  Directory: {}", indexer.root().display());
        println!("  Debounce: {}ms", watch_config.debounce_ms);
        println!("  Press Ctrl+C to stop.\n");
    }

    crate::watcher::watch(indexer, watch_config).await
}

/// Handle the `clear` subcommand
fn handle_clear(path: &Path, skip_confirm: bool) -> Result<()> {
    let cache_dir = path.join(CACHE_DIR);

    if !cache_dir.exists() {
        println!("No cache to clear.");
        return Ok(());
    }

    if !skip_confirm {
        println!("This will delete the local Navdex cache at: {:?}", cache_dir);
        print!("Are you sure? [y/N] ");
        use std::io::{self, Write};
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    std::fs::remove_dir_all(&cache_dir)
        .with_context(|| format!("Failed to remove {}", cache_dir.display()))?;
    println!("Cache cleared successfully.");

    Ok(())
}
