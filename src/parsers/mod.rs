//! Tree-sitter parsers for extracting declarations from source code
//!
//! Each language has its own submodule with a `parse` function that takes a
//! path and source text and returns [`IndexedEntity`] values in the `ts`
//! namespace. Lines and columns are zero-based and point at the declaration's
//! name. The container of a declaration is its nearest enclosing type.

pub mod csharp;
pub mod python;
pub mod rust;
pub mod typescript;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::models::{EntityKind, IndexedEntity};

/// Id namespace of structurally parsed entities
pub const NAMESPACE: &str = "ts";

/// Longest signature kept in an entity's `detail`
const MAX_DETAIL_LEN: usize = 120;

/// Languages with a structural parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Rust,
    TypeScript,
    Tsx,
    /// Parsed with the TSX grammar, which accepts plain JS and JSX
    JavaScript,
    Python,
    CSharp,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "rs" => Some(Self::Rust),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" | "pyi" => Some(Self::Python),
            "cs" => Some(Self::CSharp),
            _ => None,
        }
    }
}

/// Parse a file and extract its declarations based on its extension
///
/// Files without a structural parser yield no entities. Duplicate ids (two
/// queries matching the same declaration) keep the first occurrence.
pub fn parse_file(path: &str, source: &str) -> Result<Vec<IndexedEntity>> {
    let Some(language) = SourceLanguage::from_path(Path::new(path)) else {
        return Ok(Vec::new());
    };

    let entities = match language {
        SourceLanguage::Rust => rust::parse(path, source)?,
        SourceLanguage::TypeScript | SourceLanguage::Tsx | SourceLanguage::JavaScript => {
            typescript::parse(path, source, language)?
        }
        SourceLanguage::Python => python::parse(path, source)?,
        SourceLanguage::CSharp => csharp::parse(path, source)?,
    };

    let mut seen = HashSet::new();
    Ok(entities
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect())
}

/// Parse source text into a syntax tree
pub(crate) fn parse_tree(language: &Language, source: &str, what: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .with_context(|| format!("Failed to set {} language", what))?;

    parser
        .parse(source, None)
        .with_context(|| format!("Failed to parse {} source", what))
}

/// Shared state of one file's extraction
pub(crate) struct ParseContext<'a> {
    pub path: &'a str,
    pub source: &'a str,
    pub language: Language,
    /// Node kinds that act as containers of member declarations
    pub containers: &'static [&'static str],
    /// Supertypes named in a type declaration's header
    pub heritage: fn(&ParseContext<'_>, Node<'_>) -> Vec<String>,
}

impl<'a> ParseContext<'a> {
    pub fn query(&self, query_str: &str, what: &str) -> Result<Query> {
        Query::new(&self.language, query_str)
            .with_context(|| format!("Failed to create {} query", what))
    }

    pub fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Nearest enclosing container of a declaration node, with its name
    pub fn container_of(&self, decl: Node<'_>) -> Option<String> {
        let mut current = decl.parent();
        while let Some(node) = current {
            if self.containers.contains(&node.kind()) {
                let name_node = node
                    .child_by_field_name("name")
                    .or_else(|| node.child_by_field_name("type"))?;
                return Some(type_name(self.text(name_node)));
            }
            current = node.parent();
        }
        None
    }

    /// Build an entity from a name node and its declaration node
    pub fn entity(
        &self,
        name_node: Node<'_>,
        decl: Node<'_>,
        kind: EntityKind,
        member_kind: Option<EntityKind>,
    ) -> IndexedEntity {
        let container = self.container_of(decl);
        let kind = match (member_kind, &container) {
            (Some(member), Some(_)) => member,
            _ => kind,
        };

        let position = name_node.start_position();
        let mut entity = IndexedEntity::symbol(
            NAMESPACE,
            self.path,
            self.text(name_node),
            kind,
            container,
            position.row,
            position.column,
        );

        if let Some(signature) = self.signature(decl) {
            entity = entity.with_detail(signature);
        }
        if matches!(kind, EntityKind::Class | EntityKind::Interface | EntityKind::Enum) {
            entity = entity.with_implements((self.heritage)(self, decl));
        }

        entity
    }

    /// First line of a declaration, trimmed and bounded
    fn signature(&self, decl: Node<'_>) -> Option<String> {
        let line = self.text(decl).lines().next()?.trim();
        let line = line.trim_end_matches('{').trim_end();
        if line.is_empty() {
            return None;
        }
        Some(line.chars().take(MAX_DETAIL_LEN).collect())
    }
}

/// No supertypes; used by languages that resolve heritage separately
pub(crate) fn no_heritage(_ctx: &ParseContext<'_>, _decl: Node<'_>) -> Vec<String> {
    Vec::new()
}

/// Strip generic arguments and path qualifiers: `core::fmt::Display<T>` -> `Display`
pub(crate) fn type_name(text: &str) -> String {
    let base = text.split('<').next().unwrap_or(text).trim();
    let base = base.rsplit("::").next().unwrap_or(base);
    base.rsplit('.').next().unwrap_or(base).trim().to_string()
}

/// Run a query whose `@name` captures name declarations of one kind
///
/// The declaration node is the name's parent. When `member_kind` is set,
/// declarations inside a container take that kind instead.
pub(crate) fn extract_symbols(
    ctx: &ParseContext<'_>,
    root: Node<'_>,
    query: &Query,
    kind: EntityKind,
    member_kind: Option<EntityKind>,
) -> Vec<IndexedEntity> {
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, root, ctx.source.as_bytes());

    let mut entities = Vec::new();

    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            let capture_name: &str = query.capture_names()[capture.index as usize];
            if capture_name != "name" {
                continue;
            }
            let Some(decl) = capture.node.parent() else {
                continue;
            };
            if ctx.text(capture.node).is_empty() {
                continue;
            }
            entities.push(ctx.entity(capture.node, decl, kind, member_kind));
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_path() {
        assert_eq!(SourceLanguage::from_path(Path::new("a.rs")), Some(SourceLanguage::Rust));
        assert_eq!(SourceLanguage::from_path(Path::new("a.TSX")), Some(SourceLanguage::Tsx));
        assert_eq!(SourceLanguage::from_path(Path::new("a.mjs")), Some(SourceLanguage::JavaScript));
        assert_eq!(SourceLanguage::from_path(Path::new("a.cs")), Some(SourceLanguage::CSharp));
        assert_eq!(SourceLanguage::from_path(Path::new("a.txt")), None);
        assert_eq!(SourceLanguage::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(type_name("Foo<T>"), "Foo");
        assert_eq!(type_name("core::fmt::Display"), "Display");
        assert_eq!(type_name("System.IDisposable"), "IDisposable");
        assert_eq!(type_name("IRepository<User>"), "IRepository");
    }

    #[test]
    fn test_unsupported_file_yields_nothing() {
        let entities = parse_file("/w/notes.txt", "fn looks_like_rust() {}").unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_parse_file_ids_are_unique() {
        let source = "fn a() {}\nfn b() {}\nstruct S;\nimpl S { fn a() {} }\n";
        let entities = parse_file("/w/lib.rs", source).unwrap();
        let ids: HashSet<_> = entities.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids.len(), entities.len());
    }
}
