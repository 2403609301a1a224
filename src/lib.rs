//! Navdex: in-process fuzzy navigation index
//!
//! Navdex keeps a live set of searchable entities (files, declarations and
//! runtime commands) for a workspace and answers go-to-anything queries over
//! it with fuzzy, acronym and typo-tolerant matching.
//!
//! # Architecture
//!
//! - **Indexer**: discovers files, extracts declarations with Tree-sitter (or a
//!   host symbol service), and keeps the store current on file events
//! - **Cache**: per-file extraction results validated by content hash or mtime,
//!   persisted to SQLite in `.navdex/`
//! - **Store**: the live entity set plus per-scope prepared projections,
//!   published as immutable snapshots
//! - **Matcher**: ranked search over a snapshot
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use navdex::{CacheStore, IndexConfig, IndexStore, Indexer, Scope, SearchEngine};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(IndexStore::new());
//! let indexer = Indexer::new(".", IndexConfig::default(), store.clone(), CacheStore::open(".")?)?;
//! indexer.index_workspace(None).await;
//!
//! let engine = SearchEngine::new(store);
//! for hit in engine.search("UsrSvc", Scope::Everything, 20, true) {
//!     println!("{} {:.2}", hit.entity.name, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod git;
pub mod indexer;
pub mod matcher;
pub mod models;
pub mod output;
pub mod parsers;
pub mod store;
pub mod watcher;

// Re-export commonly used types
pub use activity::{ActivityProvider, ActivityTracker};
pub use cache::{CacheStore, MemoryPersistence, SqlitePersistence};
pub use error::PipelineFailure;
pub use extraction::{ExtractionChain, SymbolProvider, SymbolService};
pub use indexer::{DeltaStats, FileChange, IndexPhase, IndexProgress, Indexer, ProgressCallback};
pub use matcher::{SearchEngine, SearchOptions};
pub use models::{EntityKind, IndexConfig, IndexStats, IndexedEntity, Scope, ScoredEntity};
pub use store::IndexStore;
