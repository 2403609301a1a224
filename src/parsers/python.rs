//! Python language parser using Tree-sitter
//!
//! Extracts declarations from Python source code:
//! - Functions (methods when defined in a class body)
//! - Classes, with their base classes
//! - Module-level assignments (variables)
//! - Class-level assignments (properties)

use anyhow::Result;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor};

use super::{ParseContext, extract_symbols, parse_tree, type_name};
use crate::models::{EntityKind, IndexedEntity};

const CONTAINERS: &[&str] = &["class_definition"];

/// Parse Python source code and extract declarations
pub fn parse(path: &str, source: &str) -> Result<Vec<IndexedEntity>> {
    let ctx = ParseContext {
        path,
        source,
        language: tree_sitter_python::LANGUAGE.into(),
        containers: CONTAINERS,
        heritage: base_classes,
    };

    let tree = parse_tree(&ctx.language, source, "Python")?;
    let root = tree.root_node();

    let mut entities = Vec::new();
    entities.extend(extract_classes(&ctx, root)?);
    entities.extend(extract_functions(&ctx, root)?);
    entities.extend(extract_assignments(&ctx, root)?);

    Ok(entities)
}

fn extract_classes(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query("(class_definition name: (identifier) @name)", "class")?;
    Ok(extract_symbols(ctx, root, &query, EntityKind::Class, None))
}

/// Extract function definitions; functions in a class body are methods
fn extract_functions(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query("(function_definition name: (identifier) @name)", "function")?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, ctx.source.as_bytes());

    let mut entities = Vec::new();

    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            let Some(decl) = capture.node.parent() else {
                continue;
            };
            // Helpers nested in a function body are not navigation targets
            if is_nested_function(decl) {
                continue;
            }
            entities.push(ctx.entity(
                capture.node,
                decl,
                EntityKind::Function,
                Some(EntityKind::Method),
            ));
        }
    }

    Ok(entities)
}

/// Extract module-level variables and class-level attributes
fn extract_assignments(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let mut entities = Vec::new();

    let query = ctx.query(
        r#"
        (module
            (expression_statement
                (assignment
                    left: (identifier) @name)))
        "#,
        "variable",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Variable, None));

    let query = ctx.query(
        r#"
        (class_definition
            body: (block
                (expression_statement
                    (assignment
                        left: (identifier) @name))))
        "#,
        "class attribute",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Property, None));

    Ok(entities)
}

/// Whether a function is defined inside another function's body
fn is_nested_function(decl: Node<'_>) -> bool {
    let mut current = decl.parent();
    while let Some(node) = current {
        match node.kind() {
            "function_definition" => return true,
            "class_definition" => return false,
            _ => current = node.parent(),
        }
    }
    false
}

/// Base classes listed in a class definition's argument list
fn base_classes(ctx: &ParseContext<'_>, decl: Node<'_>) -> Vec<String> {
    let Some(superclasses) = decl.child_by_field_name("superclasses") else {
        return Vec::new();
    };

    let mut bases = Vec::new();
    let mut cursor = superclasses.walk();
    for node in superclasses.named_children(&mut cursor) {
        // Skip keyword arguments such as `metaclass=ABCMeta`
        if matches!(node.kind(), "identifier" | "attribute" | "subscript") {
            let name = type_name(ctx.text(node).split('[').next().unwrap_or(""));
            if !name.is_empty() {
                bases.push(name);
            }
        }
    }
    bases
}
