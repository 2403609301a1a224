//! Symbol extraction façade
//!
//! Per-file extraction is an ordered chain of [`SymbolProvider`]s tried in
//! sequence; the first non-empty result wins:
//!
//! 1. [`ParserProvider`]: the tree-sitter structural parser
//! 2. [`DocumentSymbolProvider`]: the host's document-symbol service
//! 3. [`DocumentSymbolProvider::after_reopen`]: the same service after the
//!    document was explicitly opened, for hosts that only answer for open files
//!
//! A provider error never stops the chain. When every provider comes back
//! empty and at least one errored, the chain reports an extraction failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineFailure;
use crate::models::{EntityKind, IndexedEntity};
use crate::parsers;

/// Id namespace of host-provided symbols
pub const SYMBOL_NAMESPACE: &str = "symbol";

/// Upper bound on a single host-service call
const SERVICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Zero-based position in a document
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Symbol kinds reported by a host symbol service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostSymbolKind {
    Class,
    Struct,
    Interface,
    Trait,
    Enum,
    Function,
    Method,
    Constructor,
    Property,
    Field,
    Variable,
    Constant,
    #[serde(other)]
    Other,
}

impl HostSymbolKind {
    /// Entity kind for a host kind; kinds with no counterpart are not indexed
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            HostSymbolKind::Class | HostSymbolKind::Struct => Some(EntityKind::Class),
            HostSymbolKind::Interface | HostSymbolKind::Trait => Some(EntityKind::Interface),
            HostSymbolKind::Enum => Some(EntityKind::Enum),
            HostSymbolKind::Function => Some(EntityKind::Function),
            HostSymbolKind::Method | HostSymbolKind::Constructor => Some(EntityKind::Method),
            HostSymbolKind::Property | HostSymbolKind::Field => Some(EntityKind::Property),
            HostSymbolKind::Variable | HostSymbolKind::Constant => Some(EntityKind::Variable),
            HostSymbolKind::Other => None,
        }
    }
}

/// Hierarchical symbol of one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: HostSymbolKind,
    pub range: Range,
    /// Range of the symbol's name, when the host distinguishes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_range: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentSymbol>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Absolute path
    pub path: String,
    pub range: Range,
}

/// Flat symbol returned by a workspace-wide query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSymbol {
    pub name: String,
    pub kind: HostSymbolKind,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

/// Host-provided symbol service (language server, IDE, ...)
#[async_trait]
pub trait SymbolService: Send + Sync {
    /// Symbols of one document; may be empty when the host has not loaded it
    async fn document_symbols(&self, path: &Path) -> Result<Vec<DocumentSymbol>>;

    /// Workspace-wide symbols matching `query` (empty query means "all")
    async fn workspace_symbols(&self, query: &str) -> Result<Vec<WorkspaceSymbol>>;

    /// Ask the host to open (load) a document
    async fn open_document(&self, path: &Path) -> Result<()>;
}

/// One strategy for extracting a file's entities
#[async_trait]
pub trait SymbolProvider: Send + Sync {
    /// Extract entities; an empty result lets the next provider try
    async fn provide(&self, path: &Path) -> Result<Vec<IndexedEntity>>;

    /// Provider name (for logging)
    fn name(&self) -> &str;
}

/// Ordered list of providers
#[derive(Clone)]
pub struct ExtractionChain {
    providers: Vec<Arc<dyn SymbolProvider>>,
}

impl ExtractionChain {
    pub fn new(providers: Vec<Arc<dyn SymbolProvider>>) -> Self {
        Self { providers }
    }

    /// Parser first, then the host service when one is available
    pub fn standard(service: Option<Arc<dyn SymbolService>>) -> Self {
        let mut providers: Vec<Arc<dyn SymbolProvider>> = vec![Arc::new(ParserProvider)];
        if let Some(service) = service {
            providers.push(Arc::new(DocumentSymbolProvider::new(Arc::clone(&service))));
            providers.push(Arc::new(DocumentSymbolProvider::after_reopen(service)));
        }
        Self::new(providers)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run the chain for one file
    pub async fn extract(
        &self,
        path: &Path,
    ) -> std::result::Result<Vec<IndexedEntity>, PipelineFailure> {
        let mut last_error = None;

        for provider in &self.providers {
            match provider.provide(path).await {
                Ok(entities) if !entities.is_empty() => {
                    log::trace!(
                        "{}: {} entities from {}",
                        path.display(),
                        entities.len(),
                        provider.name()
                    );
                    return Ok(entities);
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("{} failed for {}: {:#}", provider.name(), path.display(), e);
                    last_error = Some(e.context(format!("{} provider", provider.name())));
                }
            }
        }

        match last_error {
            Some(e) => Err(PipelineFailure::extraction(path.to_string_lossy(), e)),
            None => Ok(Vec::new()),
        }
    }
}

/// Tree-sitter structural parser
///
/// Parsing is CPU-bound and runs on the blocking pool.
pub struct ParserProvider;

#[async_trait]
impl SymbolProvider for ParserProvider {
    async fn provide(&self, path: &Path) -> Result<Vec<IndexedEntity>> {
        if parsers::SourceLanguage::from_path(path).is_none() {
            return Ok(Vec::new());
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let path_str = path.to_string_lossy().to_string();

        tokio::task::spawn_blocking(move || {
            let source = String::from_utf8_lossy(&bytes);
            parsers::parse_file(&path_str, &source)
        })
        .await
        .context("Parser task panicked")?
    }

    fn name(&self) -> &str {
        "parser"
    }
}

/// Host document symbols, optionally after reopening the document
pub struct DocumentSymbolProvider {
    service: Arc<dyn SymbolService>,
    reopen: bool,
}

impl DocumentSymbolProvider {
    pub fn new(service: Arc<dyn SymbolService>) -> Self {
        Self {
            service,
            reopen: false,
        }
    }

    /// Open the document before asking for its symbols
    pub fn after_reopen(service: Arc<dyn SymbolService>) -> Self {
        Self {
            service,
            reopen: true,
        }
    }
}

#[async_trait]
impl SymbolProvider for DocumentSymbolProvider {
    async fn provide(&self, path: &Path) -> Result<Vec<IndexedEntity>> {
        if self.reopen {
            with_timeout(self.service.open_document(path), "open_document").await?;
        }

        let symbols =
            with_timeout(self.service.document_symbols(path), "document_symbols").await?;
        Ok(flatten_document_symbols(&path.to_string_lossy(), &symbols))
    }

    fn name(&self) -> &str {
        if self.reopen {
            "document-symbols-after-reopen"
        } else {
            "document-symbols"
        }
    }
}

async fn with_timeout<T>(
    call: impl std::future::Future<Output = Result<T>>,
    what: &str,
) -> Result<T> {
    match tokio::time::timeout(SERVICE_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("{} timed out after {:?}", what, SERVICE_TIMEOUT),
    }
}

/// Flatten a document-symbol tree into entities
///
/// Children take their parent's qualified name as container. Symbols of
/// unmapped kinds are skipped but their children are still visited.
pub fn flatten_document_symbols(path: &str, symbols: &[DocumentSymbol]) -> Vec<IndexedEntity> {
    let mut entities = Vec::new();
    for symbol in symbols {
        flatten_into(path, symbol, symbol.container_name.clone(), &mut entities);
    }
    entities
}

fn flatten_into(
    path: &str,
    symbol: &DocumentSymbol,
    container: Option<String>,
    out: &mut Vec<IndexedEntity>,
) {
    let qualified = match &container {
        Some(c) if !c.is_empty() => format!("{}.{}", c, symbol.name),
        _ => symbol.name.clone(),
    };

    if let Some(kind) = symbol.kind.entity_kind() {
        let position = symbol.selection_range.unwrap_or(symbol.range).start;
        let mut entity = IndexedEntity::symbol(
            SYMBOL_NAMESPACE,
            path,
            symbol.name.clone(),
            kind,
            container,
            position.line,
            position.character,
        );
        if let Some(detail) = &symbol.detail {
            entity = entity.with_detail(detail.clone());
        }
        out.push(entity);
    }

    for child in &symbol.children {
        flatten_into(path, child, Some(qualified.clone()), out);
    }
}

/// Convert workspace symbols into entities, skipping unmapped kinds
pub fn workspace_symbols_to_entities(symbols: &[WorkspaceSymbol]) -> Vec<IndexedEntity> {
    symbols
        .iter()
        .filter_map(|symbol| {
            let kind = symbol.kind.entity_kind()?;
            let start = symbol.location.range.start;
            Some(IndexedEntity::symbol(
                SYMBOL_NAMESPACE,
                &symbol.location.path,
                symbol.name.clone(),
                kind,
                symbol.container_name.clone(),
                start.line,
                start.character,
            ))
        })
        .collect()
}
