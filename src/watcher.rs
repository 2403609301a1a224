//! File system watcher for incremental reindexing
//!
//! The watcher monitors the workspace for file changes and feeds them to the
//! indexer's incremental handlers after a quiet period.

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::indexer::{DeltaStats, FileChange, Indexer};
use crate::output;

/// Poll interval of the event loop, bounds the debounce precision
const TICK: Duration = Duration::from_millis(50);

/// Configuration for file watching
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Waits this long after the last change before applying the batch
    pub debounce_ms: u64,
    /// Suppress output (only log errors)
    pub quiet: bool,
}

impl WatchConfig {
    pub fn from_index_config(config: &crate::models::IndexConfig) -> Self {
        Self {
            debounce_ms: config.watch_debounce_ms,
            quiet: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::from_index_config(&crate::models::IndexConfig::default())
    }
}

/// Changed paths collected since the last applied batch
///
/// The timer resets on every recorded path, so bursts such as a multi-file
/// refactor or format-on-save are applied as one batch.
#[derive(Debug)]
pub struct PendingChanges {
    files: HashSet<PathBuf>,
    last_event: Option<Instant>,
    debounce: Duration,
}

impl PendingChanges {
    pub fn new(debounce: Duration) -> Self {
        Self {
            files: HashSet::new(),
            last_event: None,
            debounce,
        }
    }

    pub fn record(&mut self, path: PathBuf, at: Instant) {
        self.files.insert(path);
        self.last_event = Some(at);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Drain the batch once the quiet period has elapsed
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let last = self.last_event?;
        if self.files.is_empty() || now.duration_since(last) < self.debounce {
            return None;
        }

        self.last_event = None;
        let mut batch: Vec<PathBuf> = self.files.drain().collect();
        batch.sort();
        Some(batch)
    }
}

/// Run a full index, then watch the workspace until interrupted (Ctrl+C)
pub async fn watch(indexer: Arc<Indexer>, config: WatchConfig) -> Result<()> {
    let root = indexer.root().to_path_buf();
    log::info!(
        "Starting file watcher for {:?} with {}ms debounce",
        root,
        config.debounce_ms
    );

    if let Some(stats) = indexer.index_workspace(None).await {
        if !config.quiet {
            println!(
                "Indexed {} files ({} entities) in {}ms",
                stats.files, stats.entities, stats.duration_ms
            );
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |event: notify::Result<Event>| {
            // Receiver gone means the loop below has stopped
            let _ = tx.send(event);
        },
        Config::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .context("Failed to start watching directory")?;

    if !config.quiet {
        println!("Watching for changes (debounce: {}ms)...", config.debounce_ms);
    }

    let mut pending = PendingChanges::new(Duration::from_millis(config.debounce_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Interrupted, stopping watcher");
                break;
            }
            received = tokio::time::timeout(TICK, rx.recv()) => match received {
                Ok(Some(Ok(event))) => {
                    for path in changed_paths(&event) {
                        if should_watch_file(&indexer, &path) {
                            log::debug!("Detected change: {:?}", path);
                            pending.record(path, Instant::now());
                        }
                    }
                }
                Ok(Some(Err(e))) => log::warn!("Watch error: {}", e),
                Ok(None) => {
                    log::info!("Watcher channel disconnected, stopping...");
                    break;
                }
                Err(_elapsed) => {}
            }
        }

        if let Some(batch) = pending.take_ready(Instant::now()) {
            let start = Instant::now();
            let applied = apply_batch(&indexer, &batch).await;
            if let Err(e) = indexer.cache().save() {
                log::warn!("Failed to save cache after watch batch: {:#}", e);
            }

            log::info!(
                "Applied {} changes ({} created, {} changed, {} deleted) in {:?}",
                batch.len(),
                applied.created,
                applied.changed,
                applied.deleted,
                start.elapsed()
            );
            if !config.quiet {
                output::info(&format!(
                    "Reindexed {} file(s): {} created, {} changed, {} deleted",
                    batch.len(),
                    applied.created,
                    applied.changed,
                    applied.deleted
                ));
            }
        }
    }

    if !config.quiet {
        println!("Watcher stopped.");
    }

    Ok(())
}

/// Classify each path and dispatch it to the matching incremental handler
pub async fn apply_batch(indexer: &Indexer, paths: &[PathBuf]) -> DeltaStats {
    let mut applied = DeltaStats::default();

    for path in paths {
        let Some(change) = indexer.classify_change(path) else {
            continue;
        };
        match change {
            FileChange::Created => applied.created += 1,
            FileChange::Changed => applied.changed += 1,
            FileChange::Deleted => applied.deleted += 1,
        }
        indexer.apply_change(path, change).await;
    }

    applied
}

/// Paths touched by a create, modify or remove event
///
/// Renames report both the old and the new path; both are returned so the
/// old one is classified as deleted and the new one as created.
fn changed_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event.paths.clone(),
        _ => Vec::new(),
    }
}

/// Whether a path can affect the index
fn should_watch_file(indexer: &Indexer, path: &Path) -> bool {
    if let Some(file_name) = path.file_name() {
        if file_name.to_string_lossy().starts_with('.') {
            return false;
        }
    }

    if path.is_dir() {
        return false;
    }

    indexer.is_indexable(path)
}
