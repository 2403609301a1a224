//! User-facing output utilities for clean, colored terminal messages
//!
//! Kept separate from logging so that messages meant for the user carry no
//! timestamps, levels or module paths.

use owo_colors::OwoColorize;
use std::path::Path;

use crate::models::{EntityKind, ScoredEntity};

/// Display a warning message to the user in yellow with padding
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Display an error message to the user in red with padding
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}

/// Display an informational message to the user in default color with padding
pub fn info(message: &str) {
    eprintln!("\n{}\n", message);
}

/// Print one search hit: kind, qualified name, location relative to the root
///
/// ```text
///   Class     Billing.ResetBalances   src/ResetBalances.cs:7  (1.30)
/// ```
pub fn result_line(result: &ScoredEntity, root: &Path) {
    let entity = &result.entity;
    let name = entity.full_name.as_deref().unwrap_or(&entity.name);

    println!(
        "  {:<9} {}  {}  {}",
        kind_label(entity.kind),
        name.bold(),
        location(entity, root).dimmed(),
        format!("({:.2})", result.score).dimmed()
    );
}

fn kind_label(kind: EntityKind) -> String {
    let label = format!("{:<9}", kind.to_string());
    match kind {
        EntityKind::Class | EntityKind::Interface | EntityKind::Enum => label.cyan().to_string(),
        EntityKind::Function | EntityKind::Method => label.green().to_string(),
        EntityKind::Property | EntityKind::Variable => label.blue().to_string(),
        EntityKind::File => label.yellow().to_string(),
        EntityKind::Command => label.magenta().to_string(),
        EntityKind::Text | EntityKind::Endpoint => label,
    }
}

/// `path:line` relative to the workspace root, one-based line; the command id for commands
fn location(entity: &crate::models::IndexedEntity, root: &Path) -> String {
    if entity.file_path.is_empty() {
        return entity.command_id.clone().unwrap_or_default();
    }

    let path = Path::new(&entity.file_path);
    let relative = path.strip_prefix(root).unwrap_or(path).display().to_string();
    match entity.line {
        Some(line) => format!("{}:{}", relative, line + 1),
        None => relative,
    }
}
