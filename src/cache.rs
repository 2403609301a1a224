//! Persistent symbol cache
//!
//! The cache maps an absolute file path to the modification signature it had
//! when its entities were last extracted. While the signature still matches the
//! file on disk, the cached entities are authoritative and extraction is skipped.
//!
//! Layout of the `.navdex/` directory:
//! - `cache.db`: one row per file path (SQLite)
//! - `config.toml`: index settings (TOML text)

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;

use crate::models::IndexedEntity;

/// Default cache directory name
pub const CACHE_DIR: &str = ".navdex";

/// File names within the cache directory
pub const CACHE_DB: &str = "cache.db";
pub const CONFIG_TOML: &str = "config.toml";

/// Hash of the cache-critical sources, computed by `build.rs`
const CACHE_SCHEMA_HASH: &str = env!("CACHE_SCHEMA_HASH");

/// Cache-validity key for a file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModSignature {
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: i64,
    /// Version-control content hash, when one was known at extraction time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Last-known signature and extracted entities of one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub mod_signature: ModSignature,
    pub entities: Vec<IndexedEntity>,
}

/// Keyed blob storage behind the [`CacheStore`]
pub trait CachePersistence: Send + Sync {
    fn load(&self) -> Result<HashMap<String, CacheRecord>>;
    fn save(&self, records: &HashMap<String, CacheRecord>) -> Result<()>;
}

/// Read a file's modification time in milliseconds
pub fn file_mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let millis = modified.duration_since(UNIX_EPOCH).ok()?.as_millis();
    i64::try_from(millis).ok()
}

/// In-process cache shared by the indexing workers
///
/// Loaded once at the start of a run and written back once at the end, or
/// after each incremental sync cycle.
pub struct CacheStore {
    persistence: Box<dyn CachePersistence>,
    records: Mutex<HashMap<String, CacheRecord>>,
}

impl CacheStore {
    pub fn new(persistence: Box<dyn CachePersistence>) -> Self {
        Self {
            persistence,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Open the SQLite-backed cache under `<root>/.navdex/`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = root.as_ref().join(CACHE_DIR);
        init_cache_dir(&cache_dir)?;
        Ok(Self::new(Box::new(SqlitePersistence::new(
            cache_dir.join(CACHE_DB),
        ))))
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, CacheRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory records with the persisted snapshot
    ///
    /// On failure the in-memory cache is left empty and the error is returned
    /// for the caller to log.
    pub fn load(&self) -> Result<usize> {
        let loaded = self.persistence.load();
        let mut records = self.records();
        records.clear();
        let loaded = loaded?;
        records.extend(loaded);
        log::debug!("Loaded {} cache records", records.len());
        Ok(records.len())
    }

    /// Write the in-memory records back to persistence
    pub fn save(&self) -> Result<()> {
        let snapshot = self.records().clone();
        self.persistence.save(&snapshot)?;
        log::debug!("Saved {} cache records", snapshot.len());
        Ok(())
    }

    /// Return cached entities when the record is still valid for the file
    ///
    /// With a content hash available, the stored hash must match it. Without
    /// one, the stored mtime must match the file's current mtime, which is only
    /// read when needed.
    pub fn lookup(
        &self,
        path: &str,
        current_hash: Option<&str>,
        current_mtime: impl FnOnce() -> Option<i64>,
    ) -> Option<Vec<IndexedEntity>> {
        // Released before the mtime read so workers never stat under the lock
        let signature = self.records().get(path)?.mod_signature.clone();

        let valid = match current_hash {
            Some(hash) => signature.content_hash.as_deref() == Some(hash),
            None => current_mtime() == Some(signature.mtime),
        };

        if !valid {
            log::debug!("Symbol cache MISS: {} (signature changed)", path);
            return None;
        }

        let entities = self.records().get(path).map(|r| r.entities.clone())?;
        log::debug!("Symbol cache HIT: {} ({} entities)", path, entities.len());
        Some(entities)
    }

    pub fn get(&self, path: &str) -> Option<CacheRecord> {
        self.records().get(path).cloned()
    }

    /// Overwrite the record for a path
    pub fn put(&self, path: &str, signature: ModSignature, entities: Vec<IndexedEntity>) {
        self.records().insert(
            path.to_string(),
            CacheRecord {
                mod_signature: signature,
                entities,
            },
        );
    }

    pub fn remove(&self, path: &str) -> Option<CacheRecord> {
        self.records().remove(path)
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Create the cache directory and a default `config.toml`
fn init_cache_dir(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;
        log::info!("Initialized cache at {:?}", cache_dir);
    }

    let config_path = cache_dir.join(CONFIG_TOML);
    if config_path.exists() {
        return Ok(());
    }

    let default_config = r#"[index]
extensions = ["rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "cs"]
exclude_patterns = ["**/node_modules/**", "**/target/**", "**/bin/**", "**/obj/**", "**/.git/**"]
follow_symlinks = false
max_file_size = 10485760  # 10 MB

registration_concurrency = 100
extraction_concurrency = 50

activity_weight = 0.3
enable_acronym_match = true
typo_collect_all = false  # true = rank every typo candidate before capping

watch_debounce_ms = 300
"#;

    std::fs::write(&config_path, default_config).context("Failed to write config.toml")?;
    log::debug!("Created default config.toml");
    Ok(())
}

/// SQLite-backed persistence, one row per file path
pub struct SqlitePersistence {
    db_path: PathBuf,
}

impl SqlitePersistence {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open {}", self.db_path.display()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                path TEXT PRIMARY KEY,
                mtime INTEGER NOT NULL,
                content_hash TEXT,
                entities_json TEXT NOT NULL,
                last_cached INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(conn)
    }
}

impl CachePersistence for SqlitePersistence {
    fn load(&self) -> Result<HashMap<String, CacheRecord>> {
        if !self.db_path.exists() {
            return Ok(HashMap::new());
        }

        let conn = self.connect()?;

        let stored_hash: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_hash'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if stored_hash.as_deref() != Some(CACHE_SCHEMA_HASH) {
            log::warn!(
                "Cache schema changed ({} -> {}), discarding cached records",
                stored_hash.as_deref().unwrap_or("none"),
                CACHE_SCHEMA_HASH
            );
            conn.execute("DELETE FROM records", [])?;
            return Ok(HashMap::new());
        }

        let mut stmt =
            conn.prepare("SELECT path, mtime, content_hash, entities_json FROM records")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = HashMap::new();
        for row in rows {
            let (path, mtime, content_hash, entities_json) = row?;
            match serde_json::from_str::<Vec<IndexedEntity>>(&entities_json) {
                Ok(entities) => {
                    records.insert(
                        path,
                        CacheRecord {
                            mod_signature: ModSignature {
                                mtime,
                                content_hash,
                            },
                            entities,
                        },
                    );
                }
                Err(e) => {
                    log::warn!("Failed to deserialize cached entities for {}: {}", path, e);
                }
            }
        }

        Ok(records)
    }

    fn save(&self, records: &HashMap<String, CacheRecord>) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp();

        tx.execute("DELETE FROM records", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (path, mtime, content_hash, entities_json, last_cached)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (path, record) in records {
                let entities_json = serde_json::to_string(&record.entities)
                    .context("Failed to serialize cached entities")?;
                stmt.execute(rusqlite::params![
                    path,
                    record.mod_signature.mtime,
                    record.mod_signature.content_hash,
                    entities_json,
                    now,
                ])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_hash', ?1)",
            [CACHE_SCHEMA_HASH],
        )?;

        tx.commit()?;
        Ok(())
    }
}

/// In-memory persistence for tests and embedders without a cache directory
#[derive(Default)]
pub struct MemoryPersistence {
    records: Mutex<HashMap<String, CacheRecord>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CachePersistence for MemoryPersistence {
    fn load(&self) -> Result<HashMap<String, CacheRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, records: &HashMap<String, CacheRecord>) -> Result<()> {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records.clone();
        Ok(())
    }
}

impl<T: CachePersistence + ?Sized> CachePersistence for std::sync::Arc<T> {
    fn load(&self) -> Result<HashMap<String, CacheRecord>> {
        (**self).load()
    }

    fn save(&self, records: &HashMap<String, CacheRecord>) -> Result<()> {
        (**self).save(records)
    }
}
