//! TypeScript/JavaScript language parser using Tree-sitter
//!
//! Extracts declarations from TypeScript and JavaScript source code:
//! - Functions (declarations, generators, and top-level arrow functions)
//! - Classes (regular and abstract), with `extends`/`implements` heritage
//! - Interfaces and their members
//! - Enums
//! - Methods and class fields
//! - Top-level variables and constants
//!
//! TypeScript files use the TypeScript grammar; `.tsx` and JavaScript files
//! use the TSX grammar, which accepts plain JS and JSX.

use anyhow::Result;
use tree_sitter::Node;

use super::{ParseContext, SourceLanguage, extract_symbols, parse_tree, type_name};
use crate::models::{EntityKind, IndexedEntity};

const CONTAINERS: &[&str] = &[
    "class_declaration",
    "abstract_class_declaration",
    "class",
    "interface_declaration",
];

/// Parse TypeScript/JavaScript source code and extract declarations
pub fn parse(path: &str, source: &str, language: SourceLanguage) -> Result<Vec<IndexedEntity>> {
    let grammar = match language {
        SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
        SourceLanguage::Tsx | SourceLanguage::JavaScript => tree_sitter_typescript::LANGUAGE_TSX,
        other => anyhow::bail!("Unsupported language: {:?}", other),
    };

    let ctx = ParseContext {
        path,
        source,
        language: grammar.into(),
        containers: CONTAINERS,
        heritage: class_heritage,
    };

    let tree = parse_tree(&ctx.language, source, "TypeScript/JavaScript")?;
    let root = tree.root_node();

    let mut entities = Vec::new();
    entities.extend(extract_types(&ctx, root)?);
    entities.extend(extract_functions(&ctx, root)?);
    entities.extend(extract_members(&ctx, root)?);
    entities.extend(extract_variables(&ctx, root));

    Ok(entities)
}

/// Extract class, interface and enum declarations
fn extract_types(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let mut entities = Vec::new();

    let query = ctx.query(
        r#"
        (class_declaration name: (type_identifier) @name)
        (abstract_class_declaration name: (type_identifier) @name)
        "#,
        "class",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Class, None));

    let query = ctx.query(
        "(interface_declaration name: (type_identifier) @name)",
        "interface",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Interface, None));

    let query = ctx.query("(enum_declaration name: (identifier) @name)", "enum")?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Enum, None));

    Ok(entities)
}

/// Extract function declarations (including generators)
fn extract_functions(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let query = ctx.query(
        r#"
        (function_declaration name: (identifier) @name)
        (generator_function_declaration name: (identifier) @name)
        "#,
        "function",
    )?;

    Ok(extract_symbols(ctx, root, &query, EntityKind::Function, None))
}

/// Extract methods, class fields and interface members
fn extract_members(ctx: &ParseContext<'_>, root: Node<'_>) -> Result<Vec<IndexedEntity>> {
    let mut entities = Vec::new();

    let query = ctx.query(
        r#"
        (method_definition name: (_) @name)
        (method_signature name: (_) @name)
        "#,
        "method",
    )?;
    entities.extend(extract_symbols(
        ctx,
        root,
        &query,
        EntityKind::Method,
        Some(EntityKind::Method),
    ));

    let query = ctx.query(
        r#"
        (public_field_definition name: (_) @name)
        (property_signature name: (_) @name)
        "#,
        "property",
    )?;
    entities.extend(extract_symbols(ctx, root, &query, EntityKind::Property, None));

    Ok(entities)
}

/// Extract top-level `const`/`let`/`var` bindings
///
/// Bindings initialized with an arrow function or function expression are
/// functions. Bindings inside function bodies are not indexed.
fn extract_variables(ctx: &ParseContext<'_>, root: Node<'_>) -> Vec<IndexedEntity> {
    let mut entities = Vec::new();

    let mut statements = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "lexical_declaration" | "variable_declaration" => statements.push(child),
            "export_statement" => {
                if let Some(decl) = child.child_by_field_name("declaration") {
                    if matches!(decl.kind(), "lexical_declaration" | "variable_declaration") {
                        statements.push(decl);
                    }
                }
            }
            _ => {}
        }
    }

    for statement in statements {
        let mut cursor = statement.walk();
        for declarator in statement.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name.kind() != "identifier" {
                // Destructuring patterns
                continue;
            }

            let is_function = declarator
                .child_by_field_name("value")
                .is_some_and(|v| matches!(v.kind(), "arrow_function" | "function_expression" | "function"));
            let kind = if is_function {
                EntityKind::Function
            } else {
                EntityKind::Variable
            };

            entities.push(ctx.entity(name, declarator, kind, None));
        }
    }

    entities
}

/// Supertypes from `extends` and `implements` clauses
fn class_heritage(ctx: &ParseContext<'_>, decl: Node<'_>) -> Vec<String> {
    let mut supertypes = Vec::new();

    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        match child.kind() {
            // Classes: class_heritage > (extends_clause | implements_clause)
            "class_heritage" => {
                let mut heritage_cursor = child.walk();
                for clause in child.named_children(&mut heritage_cursor) {
                    collect_clause_types(ctx, clause, &mut supertypes);
                }
            }
            // Interfaces: extends_type_clause directly under the declaration
            "extends_type_clause" => collect_clause_types(ctx, child, &mut supertypes),
            _ => {}
        }
    }

    supertypes
}

fn collect_clause_types(ctx: &ParseContext<'_>, clause: Node<'_>, out: &mut Vec<String>) {
    let mut cursor = clause.walk();
    for node in clause.named_children(&mut cursor) {
        if node.kind() == "type_arguments" {
            continue;
        }
        let name = type_name(ctx.text(node));
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
}
