//! Rust language parser using Tree-sitter
//!
//! Extracts declarations from Rust source code:
//! - Functions (methods when inside `impl` or `trait` blocks)
//! - Structs and unions (as classes)
//! - Enums
//! - Traits (as interfaces)
//! - Constants and statics (properties when associated)
//! - Struct fields
//!
//! `impl Trait for Type` blocks are folded into the `implements` list of
//! `Type` when it is declared in the same file.

use anyhow::Result;
use std::collections::HashMap;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor};

use super::{ParseContext, extract_symbols, no_heritage, parse_tree, type_name};
use crate::models::{EntityKind, IndexedEntity};

const CONTAINERS: &[&str] = &["impl_item", "trait_item", "struct_item", "union_item", "enum_item"];

/// Parse Rust source code and extract declarations
pub fn parse(path: &str, source: &str) -> Result<Vec<IndexedEntity>> {
    let ctx = ParseContext {
        path,
        source,
        language: tree_sitter_rust::LANGUAGE.into(),
        containers: CONTAINERS,
        heritage: no_heritage,
    };

    let tree = parse_tree(&ctx.language, source, "Rust")?;
    let root = tree.root_node();

    let mut entities = Vec::new();
    entities.extend(extract_types(&ctx, root)?);
    entities.extend(extract_functions(&ctx, root)?);
    entities.extend(extract_constants(&ctx, root)?);
    entities.extend(extract_fields(&ctx, root)?);

    let trait_impls = extract_trait_impls(&ctx, root)?;
    for entity in &mut entities {
        if !matches!(entity.kind, EntityKind::Class | EntityKind::Enum) {
            continue;
        }
        if let Some(traits) = trait_impls.get(&entity.name) {
            let mut implements = entity.implements.take().unwrap_or_default();
            implements.extend(traits.iter().cloned());
            entity.implements = Some(implements);
        }
    }

    Ok(entities)
}

/// Extract struct, union, enum and trait definitions
fn extract_types(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let mut entities = Vec::new();

    let query = ctx.query(
        r#"
        (struct_item name: (type_identifier) @name)
        (union_item name: (type_identifier) @name)
        "#,
        "struct",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Class, None));

    let query = ctx.query("(enum_item name: (type_identifier) @name)", "enum")?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Enum, None));

    let query = ctx.query("(trait_item name: (type_identifier) @name)", "trait")?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Interface, None));

    Ok(entities)
}

/// Extract free functions, methods and trait method signatures
fn extract_functions(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query(
        r#"
        (function_item name: (identifier) @name)
        (function_signature_item name: (identifier) @name)
        "#,
        "function",
    )?;

    Ok(extract_symbols(
        ctx,
        root,
        &query,
        EntityKind::Function,
        Some(EntityKind::Method),
    ))
}

/// Extract constants and statics
fn extract_constants(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query(
        r#"
        (const_item name: (identifier) @name)
        (static_item name: (identifier) @name)
        "#,
        "const",
    )?;

    Ok(extract_symbols(
        ctx,
        root,
        &query,
        EntityKind::Variable,
        Some(EntityKind::Property),
    ))
}

/// Extract named struct fields
fn extract_fields(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query("(field_declaration name: (field_identifier) @name)", "field")?;
    Ok(extract_symbols(ctx, root, &query, EntityKind::Property, None))
}

/// Map each implementing type name to the traits it implements
fn extract_trait_impls(
    ctx: &ParseContext<'_>,
    root: Node<'_>,
) -> Result<HashMap<String, Vec<String>>> {
    let query = ctx.query(
        r#"
        (impl_item
            trait: (_) @trait
            type: (_) @type)
        "#,
        "impl",
    )?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, ctx.source.as_bytes());

    let mut impls: HashMap<String, Vec<String>> = HashMap::new();

    while let Some(match_) = matches.next() {
        let mut trait_name = None;
        let mut type_name_text = None;

        for capture in match_.captures {
            let capture_name: &str = query.capture_names()[capture.index as usize];
            match capture_name {
                "trait" => trait_name = Some(type_name(ctx.text(capture.node))),
                "type" => type_name_text = Some(type_name(ctx.text(capture.node))),
                _ => {}
            }
        }

        if let (Some(trait_name), Some(type_name)) = (trait_name, type_name_text) {
            let traits = impls.entry(type_name).or_default();
            if !traits.contains(&trait_name) {
                traits.push(trait_name);
            }
        }
    }

    Ok(impls)
}
