//! Indexing pipeline
//!
//! The [`Indexer`] is the context object that owns the cache, the extraction
//! chain and the optional external services, and writes into a shared
//! [`IndexStore`]. A full run loads the cache, discovers and registers files,
//! merges workspace symbols, extracts per-file symbols through a sliding
//! window of workers, and persists the cache. Incremental handlers keep the
//! live set in step with single-file events between runs.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use strum::Display;

use crate::cache::{CacheStore, ModSignature, file_mtime};
use crate::error::PipelineFailure;
use crate::extraction::{ExtractionChain, SymbolService, workspace_symbols_to_entities};
use crate::git::VersionControl;
use crate::models::{IndexConfig, IndexStats, IndexedEntity};
use crate::store::IndexStore;

/// Bytes inspected for an auto-generated marker
const GENERATED_PROBE_LEN: usize = 1024;

/// Buffered entities before the extraction loop flushes them to the store
const FLUSH_THRESHOLD: usize = 5_000;

static GENERATED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*//\s*<auto-generated").expect("valid auto-generated marker regex")
});

/// Stage of a full indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IndexPhase {
    Discovering,
    Registering,
    WorkspaceSymbols,
    Extracting,
    Persisting,
    Done,
}

/// Progress notification of a full run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub processed: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

/// Incremental change to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FileChange {
    Created,
    Changed,
    Deleted,
}

/// Counts of a version-control delta sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaStats {
    pub created: usize,
    pub changed: usize,
    pub deleted: usize,
    /// Paths outside the indexed extension set or excluded
    pub ignored: usize,
}

/// Result of per-file symbol indexing
enum FileOutcome {
    Cached(Vec<IndexedEntity>),
    Extracted(Vec<IndexedEntity>),
    Empty,
    Failed,
}

/// Context object for indexing a workspace
pub struct Indexer {
    root: PathBuf,
    config: IndexConfig,
    store: Arc<IndexStore>,
    cache: CacheStore,
    chain: ExtractionChain,
    version_control: Option<Arc<dyn VersionControl>>,
    symbol_service: Option<Arc<dyn SymbolService>>,
    excludes: GlobSet,
    /// path -> content hash, from the version-control index
    hashes: Mutex<HashMap<String, String>>,
    indexing: AtomicBool,
}

impl Indexer {
    /// Create an indexer with the structural parser as its only extractor
    pub fn new(
        root: impl Into<PathBuf>,
        config: IndexConfig,
        store: Arc<IndexStore>,
        cache: CacheStore,
    ) -> Result<Self> {
        let excludes = build_excludes(&config.exclude_patterns)?;

        Ok(Self {
            root: root.into(),
            config,
            store,
            cache,
            chain: ExtractionChain::standard(None),
            version_control: None,
            symbol_service: None,
            excludes,
            hashes: Mutex::new(HashMap::new()),
            indexing: AtomicBool::new(false),
        })
    }

    pub fn with_version_control(mut self, version_control: Arc<dyn VersionControl>) -> Self {
        self.version_control = Some(version_control);
        self
    }

    /// Use a host symbol service for workspace symbols and as extraction fallback
    pub fn with_symbol_service(mut self, service: Arc<dyn SymbolService>) -> Self {
        self.chain = ExtractionChain::standard(Some(Arc::clone(&service)));
        self.symbol_service = Some(service);
        self
    }

    /// Replace the per-file extraction chain
    pub fn with_extraction_chain(mut self, chain: ExtractionChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    pub fn get_item_count(&self) -> usize {
        self.store.get_item_count()
    }

    fn hashes(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.hashes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a full indexing pass
    ///
    /// Returns `None` without doing anything when a run is already in flight.
    /// Every failure inside the run is contained and counted in the stats.
    pub async fn index_workspace(&self, progress: Option<ProgressCallback>) -> Option<IndexStats> {
        if self
            .indexing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::info!("Indexing already in progress, ignoring request");
            return None;
        }
        let _guard = scopeguard::guard(&self.indexing, |flag| {
            flag.store(false, Ordering::Release);
        });

        let start = Instant::now();
        let mut stats = IndexStats::default();
        let report = |phase: IndexPhase, processed: usize, total: usize| {
            if let Some(callback) = &progress {
                callback(IndexProgress {
                    phase,
                    processed,
                    total,
                });
            }
        };

        log::info!("Indexing workspace: {}", self.root.display());

        // 1. Cache
        if let Err(e) = self.cache.load() {
            PipelineFailure::persistence("load", e).log();
            stats.failures += 1;
        }

        // 2. Content hashes
        if let Err(failure) = self.refresh_hashes().await {
            log::debug!("{}", failure);
        }

        // 3. Discovery
        report(IndexPhase::Discovering, 0, 0);
        let (files, discovery_failures) = self.discover_files().await;
        stats.failures += discovery_failures;
        log::info!("Discovered {} files to index", files.len());

        // 4. Registration
        let files = self.register_files(files, &report).await;
        stats.files = files.len();

        // 5. Workspace symbols
        if let Some(service) = &self.symbol_service {
            report(IndexPhase::WorkspaceSymbols, 0, 1);
            match service.workspace_symbols("").await {
                Ok(symbols) => {
                    let added = self.store.merge_items(workspace_symbols_to_entities(&symbols));
                    log::info!("Merged {} workspace symbols", added);
                }
                Err(e) => {
                    PipelineFailure::extraction("<workspace>", e).log();
                    stats.failures += 1;
                }
            }
            report(IndexPhase::WorkspaceSymbols, 1, 1);
        }

        // 6. Per-file symbols
        self.extract_all(&files, &mut stats, &report).await;

        // 7. Persist
        report(IndexPhase::Persisting, 0, 1);
        if let Err(e) = self.cache.save() {
            PipelineFailure::persistence("save", e).log();
            stats.failures += 1;
        }

        stats.entities = self.store.get_item_count();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        if stats.failures > 0 {
            log::error!(
                "Indexing finished with {} failures (see warnings above)",
                stats.failures
            );
        }
        log::info!(
            "Indexing complete: {} files, {} entities ({} cached, {} extracted) in {}ms",
            stats.files,
            stats.entities,
            stats.cache_hits,
            stats.extracted,
            stats.duration_ms
        );

        report(IndexPhase::Done, stats.files, stats.files);
        Some(stats)
    }

    /// Reload the path -> content hash map from version control
    ///
    /// On failure the map is cleared and cache validation falls back to mtimes.
    async fn refresh_hashes(&self) -> std::result::Result<usize, PipelineFailure> {
        let Some(version_control) = self.version_control.clone() else {
            self.hashes().clear();
            return Ok(0);
        };
        let root = self.root.clone();

        let listed = tokio::task::spawn_blocking(move || version_control.list_staged_hashes(&root))
            .await
            .context("Hash listing task panicked")
            .and_then(|r| r);

        let mut hashes = self.hashes();
        hashes.clear();
        match listed {
            Ok(entries) => {
                hashes.extend(
                    entries
                        .into_iter()
                        .map(|(path, hash)| (path.to_string_lossy().to_string(), hash)),
                );
                log::debug!("Loaded {} content hashes", hashes.len());
                Ok(hashes.len())
            }
            Err(e) => Err(PipelineFailure::discovery("staged hashes", e)),
        }
    }

    /// List candidate files: version control first, filesystem walk as fallback
    ///
    /// Returns the files and the number of contained failures.
    async fn discover_files(&self) -> (Vec<PathBuf>, usize) {
        let root = self.root.clone();
        let config = self.config.clone();
        let excludes = self.excludes.clone();
        let version_control = self.version_control.clone();

        let discovered = tokio::task::spawn_blocking(move || {
            let mut failures = 0;

            let listed = match version_control {
                Some(vc) => match vc.list_files(&root) {
                    Ok(files) => Some(files),
                    Err(e) => {
                        PipelineFailure::discovery("version control", e).log();
                        failures += 1;
                        None
                    }
                },
                None => None,
            };

            let candidates = match listed {
                Some(files) => files,
                None => match walk_files(&root, config.follow_symlinks) {
                    Ok(files) => files,
                    Err(e) => {
                        PipelineFailure::discovery("filesystem walk", e).log();
                        failures += 1;
                        Vec::new()
                    }
                },
            };

            let files: Vec<PathBuf> = candidates
                .into_iter()
                .filter(|path| config.has_indexed_extension(path))
                .filter(|path| !is_excluded(&excludes, &root, path))
                .filter(|path| {
                    let generated = is_auto_generated(path);
                    if generated {
                        log::debug!("Skipping auto-generated file {}", path.display());
                    }
                    !generated
                })
                .collect();

            (files, failures)
        })
        .await;

        match discovered {
            Ok(result) => result,
            Err(e) => {
                PipelineFailure::discovery("discovery task", e.into()).log();
                (Vec::new(), 1)
            }
        }
    }

    /// Register one `File` entity per readable file, replacing the live set
    ///
    /// Non-file-backed entities (commands) survive the replacement. Returns the
    /// files that were registered and are small enough to extract.
    async fn register_files(
        &self,
        files: Vec<PathBuf>,
        report: &(dyn Fn(IndexPhase, usize, usize) + Sync),
    ) -> Vec<PathBuf> {
        let total = files.len();
        report(IndexPhase::Registering, 0, total);

        let max_file_size = self.config.max_file_size;
        let mut metadata_reads = stream::iter(files)
            .map(|path| async move {
                let metadata = tokio::fs::metadata(&path).await;
                (path, metadata)
            })
            .buffer_unordered(self.config.registration_concurrency.max(1));

        let mut entities: Vec<IndexedEntity> = self
            .store
            .items_snapshot()
            .into_iter()
            .filter(|e| e.file_path.is_empty())
            .collect();
        let mut registered = Vec::with_capacity(total);
        let mut processed = 0;

        while let Some((path, metadata)) = metadata_reads.next().await {
            processed += 1;
            match metadata {
                Ok(meta) if meta.is_file() => {
                    entities.push(IndexedEntity::file(&path));
                    if meta.len() <= max_file_size {
                        registered.push(path);
                    } else {
                        log::debug!(
                            "Registered {} without symbols (too large: {} bytes)",
                            path.display(),
                            meta.len()
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => log::debug!("Skipping {}: {}", path.display(), e),
            }
            if processed % 500 == 0 {
                report(IndexPhase::Registering, processed, total);
            }
        }

        let file_count = entities.iter().filter(|e| e.is_file()).count();
        self.store.set_items(entities);
        report(IndexPhase::Registering, total, total);
        log::info!("Registered {} files", file_count);

        registered
    }

    /// Sliding window of per-file workers
    ///
    /// Each worker pulls the next file as soon as it finishes one. Their
    /// entities are merged into the store from this single consumer loop, so
    /// ids already placed by the workspace-symbol pass are not repeated.
    async fn extract_all(
        &self,
        files: &[PathBuf],
        stats: &mut IndexStats,
        report: &(dyn Fn(IndexPhase, usize, usize) + Sync),
    ) {
        let total = files.len();
        report(IndexPhase::Extracting, 0, total);

        let mut outcomes = stream::iter(files)
            .map(|path| self.extract_file(path))
            .buffer_unordered(self.config.extraction_concurrency.max(1));

        let mut pending: Vec<IndexedEntity> = Vec::new();
        let mut processed = 0;

        while let Some(outcome) = outcomes.next().await {
            processed += 1;
            match outcome {
                FileOutcome::Cached(entities) => {
                    stats.cache_hits += 1;
                    pending.extend(entities);
                }
                FileOutcome::Extracted(entities) => {
                    stats.extracted += 1;
                    pending.extend(entities);
                }
                FileOutcome::Empty => {}
                FileOutcome::Failed => stats.failures += 1,
            }

            if pending.len() >= FLUSH_THRESHOLD {
                self.store.merge_items(std::mem::take(&mut pending));
            }
            report(IndexPhase::Extracting, processed, total);
        }

        self.store.merge_items(pending);
    }

    /// Cache-coherent symbol extraction for one file, without touching the store
    async fn extract_file(&self, path: &Path) -> FileOutcome {
        let path_str = path.to_string_lossy().to_string();
        let current_hash = self.hashes().get(&path_str).cloned();

        if let Some(entities) =
            self.cache
                .lookup(&path_str, current_hash.as_deref(), || file_mtime(path))
        {
            return FileOutcome::Cached(entities);
        }

        match self.chain.extract(path).await {
            Ok(entities) if entities.is_empty() => FileOutcome::Empty,
            Ok(entities) => {
                let signature = ModSignature {
                    mtime: file_mtime(path).unwrap_or_default(),
                    content_hash: current_hash,
                };
                self.cache.put(&path_str, signature, entities.clone());
                FileOutcome::Extracted(entities)
            }
            Err(failure) => {
                failure.log();
                FileOutcome::Failed
            }
        }
    }

    /// Index one file's symbols into the live set
    ///
    /// Returns the number of entities added. Failures are logged, never returned.
    pub async fn index_file_symbols(&self, path: &Path) -> usize {
        match self.extract_file(path).await {
            FileOutcome::Cached(entities) | FileOutcome::Extracted(entities) => {
                self.store.merge_items(entities)
            }
            FileOutcome::Empty | FileOutcome::Failed => 0,
        }
    }

    /// Register a new file and index its symbols
    pub async fn handle_file_created(&self, path: &Path) -> usize {
        let path_str = path.to_string_lossy().to_string();
        self.hashes().remove(&path_str);

        // A repeated create must not duplicate anything
        self.store.remove_symbols_by_file(&path_str);
        self.store.merge_items(vec![IndexedEntity::file(path)]);

        self.index_file_symbols(path).await
    }

    /// Re-extract a modified file's symbols
    pub async fn handle_file_changed(&self, path: &Path) -> usize {
        let path_str = path.to_string_lossy().to_string();
        // The index hash predates the edit; force an mtime comparison
        self.hashes().remove(&path_str);

        self.store.remove_symbols_by_file(&path_str);
        self.store.merge_items(vec![IndexedEntity::file(path)]);

        self.index_file_symbols(path).await
    }

    /// Drop every entity of a deleted file
    pub fn handle_file_deleted(&self, path: &Path) -> usize {
        let path_str = path.to_string_lossy().to_string();
        self.hashes().remove(&path_str);
        self.cache.remove(&path_str);
        self.store.remove_items_by_file(&path_str)
    }

    /// Whether a path is subject to indexing at all
    pub fn is_indexable(&self, path: &Path) -> bool {
        self.config.has_indexed_extension(path) && !is_excluded(&self.excludes, &self.root, path)
    }

    /// Classify a path by filesystem existence against live-set membership
    pub fn classify_change(&self, path: &Path) -> Option<FileChange> {
        let exists = path.is_file();
        let known = self.store.contains_file(&path.to_string_lossy());

        match (exists, known) {
            (true, false) => Some(FileChange::Created),
            (true, true) => Some(FileChange::Changed),
            (false, true) => Some(FileChange::Deleted),
            (false, false) => None,
        }
    }

    /// Dispatch a classified change to its handler
    pub async fn apply_change(&self, path: &Path, change: FileChange) {
        log::debug!("{}: {}", change, path.display());
        match change {
            FileChange::Created => {
                if is_auto_generated(path) {
                    return;
                }
                self.handle_file_created(path).await;
            }
            FileChange::Changed => {
                self.handle_file_changed(path).await;
            }
            FileChange::Deleted => {
                self.handle_file_deleted(path);
            }
        }
    }

    /// Bring the index in line with the paths changed between two refs
    pub async fn sync_delta(&self, ref_a: &str, ref_b: &str) -> Result<DeltaStats> {
        let version_control = self
            .version_control
            .clone()
            .context("Delta sync requires version control")?;

        let root = self.root.clone();
        let (a, b) = (ref_a.to_string(), ref_b.to_string());
        let changed = tokio::task::spawn_blocking(move || version_control.diff_name_only(&root, &a, &b))
            .await
            .context("Diff task panicked")??;

        log::info!("Delta sync {}..{}: {} changed paths", ref_a, ref_b, changed.len());

        let mut delta = DeltaStats::default();
        for relative in changed {
            let path = self.root.join(&relative);
            if !self.is_indexable(&path) {
                delta.ignored += 1;
                continue;
            }

            let Some(change) = self.classify_change(&path) else {
                continue;
            };
            match change {
                FileChange::Created => delta.created += 1,
                FileChange::Changed => delta.changed += 1,
                FileChange::Deleted => delta.deleted += 1,
            }
            self.apply_change(&path, change).await;
        }

        if let Err(failure) = self.refresh_hashes().await {
            log::debug!("{}", failure);
        }
        if let Err(e) = self.cache.save() {
            PipelineFailure::persistence("save", e).log();
        }

        Ok(delta)
    }
}

/// Compile exclude patterns into one matcher
pub fn build_excludes(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid exclude pattern: {}", pattern))?,
        );
    }
    builder.build().context("Failed to build exclude patterns")
}

/// Match exclude patterns against the root-relative path
pub fn is_excluded(excludes: &GlobSet, root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    excludes.is_match(relative) || excludes.is_match(path)
}

/// Whether the first kilobyte carries a `// <auto-generated />` marker
pub fn is_auto_generated(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };

    let mut head = Vec::with_capacity(GENERATED_PROBE_LEN);
    if file
        .take(GENERATED_PROBE_LEN as u64)
        .read_to_end(&mut head)
        .is_err()
    {
        return false;
    }

    GENERATED_MARKER.is_match(&String::from_utf8_lossy(&head))
}

/// Walk the directory tree honoring ignore files
fn walk_files(root: &Path, follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkBuilder::new(root).follow_links(follow_symlinks).build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Walk error: {}", e);
                continue;
            }
        };

        if entry.file_type().is_some_and(|ft| ft.is_file()) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() && !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }

    Ok(files)
}
