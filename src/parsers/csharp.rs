//! C# language parser using Tree-sitter
//!
//! Extracts declarations from C# source code:
//! - Classes, records and structs (as classes), with their base lists
//! - Interfaces
//! - Enums
//! - Methods and constructors
//! - Properties and fields

use anyhow::Result;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor};

use super::{ParseContext, extract_symbols, parse_tree, type_name};
use crate::models::{EntityKind, IndexedEntity};

const CONTAINERS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "record_declaration",
    "interface_declaration",
];

/// Parse C# source code and extract declarations
pub fn parse(path: &str, source: &str) -> Result<Vec<IndexedEntity>> {
    let ctx = ParseContext {
        path,
        source,
        language: tree_sitter_c_sharp::LANGUAGE.into(),
        containers: CONTAINERS,
        heritage: base_list,
    };

    let tree = parse_tree(&ctx.language, source, "C#")?;
    let root = tree.root_node();

    let mut entities = Vec::new();
    entities.extend(extract_types(&ctx, root)?);
    entities.extend(extract_methods(&ctx, root)?);
    entities.extend(extract_properties(&ctx, root)?);
    entities.extend(extract_fields(&ctx, root)?);

    Ok(entities)
}

/// Extract class, struct, record, interface and enum declarations
fn extract_types(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let mut entities = Vec::new();

    let query = ctx.query(
        r#"
        (class_declaration name: (identifier) @name)
        (struct_declaration name: (identifier) @name)
        (record_declaration name: (identifier) @name)
        "#,
        "class",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Class, None));

    let query = ctx.query("(interface_declaration name: (identifier) @name)", "interface")?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Interface, None));

    let query = ctx.query("(enum_declaration name: (identifier) @name)", "enum")?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Enum, None));

    Ok(entities)
}

fn extract_methods(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query(
        r#"
        (method_declaration name: (identifier) @name)
        (constructor_declaration name: (identifier) @name)
        "#,
        "method",
    )?;

    Ok(extract_symbols(ctx, root, &query, EntityKind::Method, None))
}

fn extract_properties(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query("(property_declaration name: (identifier) @name)", "property")?;
    Ok(extract_symbols(ctx, root, &query, EntityKind::Property, None))
}

/// Extract field declarations, one entity per declarator
fn extract_fields(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query(
        r#"
        (field_declaration
            (variable_declaration
                (variable_declarator) @declarator))
        "#,
        "field",
    )?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, ctx.source.as_bytes());

    let mut entities = Vec::new();

    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            let declarator = capture.node;
            // The declared name is the first identifier; later ones belong to the initializer
            let name = declarator
                .child_by_field_name("name")
                .or_else(|| declarator.named_child(0))
                .filter(|n| n.kind() == "identifier");

            if let Some(name) = name {
                entities.push(ctx.entity(name, declarator, EntityKind::Property, None));
            }
        }
    }

    Ok(entities)
}

/// Types named in a declaration's `: Base, IInterface` list
fn base_list(ctx: &ParseContext<'_>, decl: Node<'_>) -> Vec<String> {
    let mut bases = Vec::new();

    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if child.kind() != "base_list" {
            continue;
        }
        let mut list_cursor = child.walk();
        for base in child.named_children(&mut list_cursor) {
            if base.kind() == "argument_list" {
                continue;
            }
            let name = type_name(ctx.text(base).split('(').next().unwrap_or(""));
            if !name.is_empty() && !bases.contains(&name) {
                bases.push(name);
            }
        }
    }

    bases
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"namespace Billing.Accounts
{
    public interface IBalanceService : IDisposable
    {
        void Reset();
    }

    public class ResetBalances : BaseJob, IBalanceService
    {
        private readonly int _retries = 3;
        public string Name { get; set; }

        public ResetBalances() { }

        public void Reset() { }
        public void Dispose() { }
    }

    public enum Status { Active, Closed }
}
"#;

    fn find<'a>(entities: &'a [IndexedEntity], name: &str, kind: EntityKind) -> &'a IndexedEntity {
        entities
            .iter()
            .find(|e| e.name == name && e.kind == kind)
            .unwrap_or_else(|| panic!("missing {kind} {name}"))
    }

    #[test]
    fn test_parse_types_with_base_list() {
        let entities = parse("/src/ResetBalances.cs", SOURCE).unwrap();

        let class = find(&entities, "ResetBalances", EntityKind::Class);
        assert_eq!(
            class.implements,
            Some(vec!["BaseJob".to_string(), "IBalanceService".to_string()])
        );
        assert_eq!(class.line, Some(7));

        let interface = find(&entities, "IBalanceService", EntityKind::Interface);
        assert_eq!(interface.implements, Some(vec!["IDisposable".to_string()]));

        find(&entities, "Status", EntityKind::Enum);
    }

    #[test]
    fn test_parse_members() {
        let entities = parse("/src/ResetBalances.cs", SOURCE).unwrap();

        let resets: Vec<_> = entities
            .iter()
            .filter(|e| e.name == "Reset" && e.kind == EntityKind::Method)
            .collect();
        assert_eq!(resets.len(), 2);
        assert!(resets.iter().any(|m| m.container_name.as_deref() == Some("IBalanceService")));
        assert!(resets.iter().any(|m| m.container_name.as_deref() == Some("ResetBalances")));

        // Constructor carries the class name, inside the class
        let ctor = entities
            .iter()
            .find(|e| e.name == "ResetBalances" && e.kind == EntityKind::Method)
            .unwrap();
        assert_eq!(ctor.full_name.as_deref(), Some("ResetBalances.ResetBalances"));

        let property = find(&entities, "Name", EntityKind::Property);
        assert_eq!(property.container_name.as_deref(), Some("ResetBalances"));

        let field = find(&entities, "_retries", EntityKind::Property);
        assert_eq!(field.container_name.as_deref(), Some("ResetBalances"));
    }
}
