//! Build-time schema hash computation for automatic cache invalidation
//!
//! This build script hashes the sources that define the persisted cache format.
//! The hash is stored alongside cached records; when it changes, previously
//! cached records are discarded on the next load instead of being misread.
//!
//! ## Cache-critical files:
//! - src/cache.rs: SQLite schema and record layout
//! - src/models.rs: `IndexedEntity` serialization shape

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Source files that affect persisted cache compatibility
const CACHE_CRITICAL_FILES: &[&str] = &["src/cache.rs", "src/models.rs"];

fn main() {
    let schema_hash = compute_schema_hash();

    println!("cargo:rustc-env=CACHE_SCHEMA_HASH={}", schema_hash);

    for file in CACHE_CRITICAL_FILES {
        println!("cargo:rerun-if-changed={}", file);
    }
}

/// Compute a deterministic hash of all cache-critical source files
fn compute_schema_hash() -> String {
    let mut hasher = blake3::Hasher::new();

    // Sorted for a stable hash regardless of declaration order
    let files: BTreeSet<&str> = CACHE_CRITICAL_FILES.iter().copied().collect();

    for file_path in &files {
        let path = Path::new(file_path);

        let content = fs::read(path)
            .unwrap_or_else(|e| panic!("Failed to read cache-critical file {}: {}", file_path, e));

        hasher.update(file_path.as_bytes());
        hasher.update(&content);
    }

    // First 8 bytes are plenty to detect a format change
    hasher.finalize().as_bytes()[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
