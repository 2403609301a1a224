//! Core data models for Navdex
//!
//! Every searchable unit (a file, a declaration, a runtime command) is an
//! [`IndexedEntity`]. Entities are immutable once created; re-extraction of an
//! unchanged declaration produces an identical id, which makes re-indexing
//! idempotent.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumIter, EnumString};

/// Kind of an indexed entity
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "PascalCase", ascii_case_insensitive)]
pub enum EntityKind {
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Property,
    Variable,
    File,
    Text,
    Command,
    Endpoint,
}

impl EntityKind {
    /// The single non-`Everything` scope this kind belongs to
    pub fn scope(self) -> Scope {
        match self {
            EntityKind::Class | EntityKind::Interface | EntityKind::Enum => Scope::Types,
            EntityKind::Function
            | EntityKind::Method
            | EntityKind::Variable
            | EntityKind::Endpoint => Scope::Symbols,
            EntityKind::Property => Scope::Properties,
            EntityKind::File => Scope::Files,
            EntityKind::Command => Scope::Commands,
            EntityKind::Text => Scope::Text,
        }
    }

    /// Multiplicative ranking boost applied to every match of this kind
    pub fn boost(self) -> f64 {
        match self {
            EntityKind::Class | EntityKind::Interface => 1.3,
            EntityKind::Enum | EntityKind::Command => 1.2,
            EntityKind::Function | EntityKind::Method => 1.1,
            EntityKind::Property | EntityKind::Endpoint => 1.0,
            EntityKind::Variable => 0.9,
            EntityKind::File => 0.8,
            EntityKind::Text => 0.7,
        }
    }
}

/// Named partition used to narrow a search
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Everything,
    Types,
    Symbols,
    Files,
    Commands,
    Properties,
    Text,
}

/// A single indexable unit: file, declaration, or command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexedEntity {
    /// Globally unique, origin-namespaced id (`file:`, `symbol:`, `ts:`, `command:`)
    pub id: String,
    /// Short display name
    pub name: String,
    /// Container-qualified name, matched slightly below `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub kind: EntityKind,
    /// Absolute path; empty only for non-file-backed entities
    pub file_path: String,
    /// Zero-based line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Zero-based column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Free-text annotation (signature, command id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<Vec<String>>,
    /// Present only for `Command` entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
}

impl IndexedEntity {
    /// Build the `File` entity registered for a path on disk
    pub fn file(path: &Path) -> Self {
        let path_str = path.to_string_lossy().to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.clone());
        let detail = path.parent().map(|p| p.to_string_lossy().to_string());

        Self {
            id: format!("file:{}", path_str),
            name,
            full_name: None,
            kind: EntityKind::File,
            file_path: path_str,
            line: None,
            column: None,
            container_name: None,
            detail,
            implements: None,
            command_id: None,
        }
    }

    /// Build a declaration entity
    ///
    /// `namespace` is the origin prefix (`ts` for the structural parser, `symbol`
    /// for host symbol services). The id combines path, qualified name and line so
    /// that re-extracting an unchanged declaration yields the same id.
    pub fn symbol(
        namespace: &str,
        file_path: &str,
        name: impl Into<String>,
        kind: EntityKind,
        container_name: Option<String>,
        line: usize,
        column: usize,
    ) -> Self {
        let name = name.into();
        let full_name = container_name
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| format!("{}.{}", c, name));
        let qualified = full_name.clone().unwrap_or_else(|| name.clone());

        Self {
            id: format!("{}:{}:{}:{}", namespace, file_path, qualified, line),
            name,
            full_name,
            kind,
            file_path: file_path.to_string(),
            line: Some(line),
            column: Some(column),
            container_name: container_name.filter(|c| !c.is_empty()),
            detail: None,
            implements: None,
            command_id: None,
        }
    }

    /// Build a runtime-invocable command entity
    pub fn command(command_id: &str, title: &str, detail: Option<String>) -> Self {
        Self {
            id: format!("command:{}", command_id),
            name: title.to_string(),
            full_name: None,
            kind: EntityKind::Command,
            file_path: String::new(),
            line: None,
            column: None,
            container_name: None,
            detail: detail.or_else(|| Some(command_id.to_string())),
            implements: None,
            command_id: Some(command_id.to_string()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_implements(mut self, implements: Vec<String>) -> Self {
        if !implements.is_empty() {
            self.implements = Some(implements);
        }
        self
    }

    /// Scope partition derived from the kind
    pub fn scope(&self) -> Scope {
        self.kind.scope()
    }

    /// Whether the entity is a `File` registration
    pub fn is_file(&self) -> bool {
        self.kind == EntityKind::File
    }
}

/// A search hit with its final score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: IndexedEntity,
    pub score: f64,
}

/// Configuration for indexing and search behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File extensions (without dot) that are indexed and watched
    pub extensions: Vec<String>,
    /// Glob patterns excluded from discovery and watching
    pub exclude_patterns: Vec<String>,
    /// Follow symbolic links during the filesystem walk
    pub follow_symlinks: bool,
    /// Maximum file size to index (bytes)
    pub max_file_size: u64,
    /// Pool width for file registration (metadata reads)
    pub registration_concurrency: usize,
    /// Sliding-window width for per-file symbol extraction
    pub extraction_concurrency: usize,
    /// Blend weight for usage-recency scores, in `[0, 1]`
    pub activity_weight: f64,
    /// Run the acronym pass when fuzzy matching is sparse
    pub enable_acronym_match: bool,
    /// Collect every typo candidate before capping instead of stopping early
    pub typo_collect_all: bool,
    /// Quiet period before a batch of watch events is applied
    pub watch_debounce_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: ["rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "cs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_patterns: [
                "**/node_modules/**",
                "**/target/**",
                "**/bin/**",
                "**/obj/**",
                "**/.git/**",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            follow_symlinks: false,
            max_file_size: 10 * 1024 * 1024, // 10 MB
            registration_concurrency: 100,
            extraction_concurrency: 50,
            activity_weight: 0.3,
            enable_acronym_match: true,
            typo_collect_all: false,
            watch_debounce_ms: 300,
        }
    }
}

impl IndexConfig {
    /// Whether a path carries one of the configured extensions
    pub fn has_indexed_extension(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Report for one indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Files discovered and registered
    pub files: usize,
    /// Entities in the live set after the run
    pub entities: usize,
    /// Files whose symbols were served from the cache
    pub cache_hits: usize,
    /// Files whose symbols were freshly extracted
    pub extracted: usize,
    /// Contained failures (extraction, discovery, persistence)
    pub failures: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_kind_has_one_concrete_scope() {
        for kind in EntityKind::iter() {
            assert_ne!(kind.scope(), Scope::Everything, "{kind} mapped to Everything");
        }
    }

    #[test]
    fn test_kind_scope_mapping() {
        assert_eq!(EntityKind::Class.scope(), Scope::Types);
        assert_eq!(EntityKind::Interface.scope(), Scope::Types);
        assert_eq!(EntityKind::Enum.scope(), Scope::Types);
        assert_eq!(EntityKind::Function.scope(), Scope::Symbols);
        assert_eq!(EntityKind::Method.scope(), Scope::Symbols);
        assert_eq!(EntityKind::Variable.scope(), Scope::Symbols);
        assert_eq!(EntityKind::Property.scope(), Scope::Properties);
        assert_eq!(EntityKind::File.scope(), Scope::Files);
        assert_eq!(EntityKind::Command.scope(), Scope::Commands);
        assert_eq!(EntityKind::Text.scope(), Scope::Text);
    }

    #[test]
    fn test_boost_ordering() {
        assert!(EntityKind::Class.boost() > EntityKind::Enum.boost());
        assert!(EntityKind::Enum.boost() > EntityKind::Method.boost());
        assert!(EntityKind::Method.boost() > EntityKind::Property.boost());
        assert!(EntityKind::Property.boost() > EntityKind::Variable.boost());
        assert!(EntityKind::Variable.boost() > EntityKind::File.boost());
        assert!(EntityKind::File.boost() > EntityKind::Text.boost());
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!(Scope::from_str("types").unwrap(), Scope::Types);
        assert_eq!(Scope::from_str("Files").unwrap(), Scope::Files);
        assert!(Scope::from_str("bogus").is_err());
    }

    #[test]
    fn test_symbol_id_is_deterministic() {
        let a = IndexedEntity::symbol(
            "ts",
            "/src/a.rs",
            "parse",
            EntityKind::Method,
            Some("Parser".to_string()),
            10,
            4,
        );
        let b = IndexedEntity::symbol(
            "ts",
            "/src/a.rs",
            "parse",
            EntityKind::Method,
            Some("Parser".to_string()),
            10,
            4,
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "ts:/src/a.rs:Parser.parse:10");
        assert_eq!(a.full_name.as_deref(), Some("Parser.parse"));
    }

    #[test]
    fn test_file_entity() {
        let entity = IndexedEntity::file(Path::new("/work/src/ResetBalances.cs"));
        assert_eq!(entity.id, "file:/work/src/ResetBalances.cs");
        assert_eq!(entity.name, "ResetBalances.cs");
        assert_eq!(entity.kind, EntityKind::File);
        assert_eq!(entity.detail.as_deref(), Some("/work/src"));
    }

    #[test]
    fn test_command_entity() {
        let entity = IndexedEntity::command("editor.format", "Format Document", None);
        assert_eq!(entity.id, "command:editor.format");
        assert!(entity.file_path.is_empty());
        assert_eq!(entity.command_id.as_deref(), Some("editor.format"));
        assert_eq!(entity.scope(), Scope::Commands);
    }

    #[test]
    fn test_entity_serializes_camel_case() {
        let entity = IndexedEntity::symbol(
            "symbol",
            "/a.ts",
            "run",
            EntityKind::Function,
            None,
            0,
            0,
        );
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"filePath\""));
        assert!(!json.contains("fullName"));
    }

    #[test]
    fn test_has_indexed_extension() {
        let config = IndexConfig::default();
        assert!(config.has_indexed_extension(Path::new("a/b.rs")));
        assert!(config.has_indexed_extension(Path::new("a/b.CS")));
        assert!(!config.has_indexed_extension(Path::new("a/b.txt")));
        assert!(!config.has_indexed_extension(Path::new("Makefile")));
    }
}
