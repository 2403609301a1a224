//! Configuration loading from `.navdex/config.toml`

use anyhow::{Context, Result};
use std::path::Path;

use crate::cache::{CACHE_DIR, CONFIG_TOML};
use crate::models::IndexConfig;

/// Load the `[index]` table of `<cache_dir>/config.toml`
///
/// A missing file or a missing `[index]` table yields the defaults. Keys absent
/// from the table keep their default values. A malformed file is an error.
pub fn load_config(cache_dir: &Path) -> Result<IndexConfig> {
    let config_path = cache_dir.join(CONFIG_TOML);

    if !config_path.exists() {
        log::debug!("No config.toml found, using default index config");
        return Ok(IndexConfig::default());
    }

    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    parse_config(&config_str)
}

/// Load the config for a workspace root (`<root>/.navdex/config.toml`)
pub fn load_workspace_config(root: &Path) -> Result<IndexConfig> {
    load_config(&root.join(CACHE_DIR))
}

fn parse_config(config_str: &str) -> Result<IndexConfig> {
    let toml_value: toml::Value =
        toml::from_str(config_str).context("Failed to parse config.toml")?;

    let Some(index_table) = toml_value.get("index") else {
        log::debug!("No [index] section in config.toml, using defaults");
        return Ok(IndexConfig::default());
    };

    let mut config: IndexConfig = index_table
        .clone()
        .try_into()
        .context("Failed to parse [index] section")?;

    if !(0.0..=1.0).contains(&config.activity_weight) {
        log::warn!(
            "activity_weight {} out of range, clamping to [0, 1]",
            config.activity_weight
        );
        config.activity_weight = config.activity_weight.clamp(0.0, 1.0);
    }
    config.registration_concurrency = config.registration_concurrency.max(1);
    config.extraction_concurrency = config.extraction_concurrency.max(1);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();
        assert_eq!(config.extraction_concurrency, 50);
        assert_eq!(config.registration_concurrency, 100);
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config = parse_config(
            r#"
[index]
extensions = ["rs"]
extraction_concurrency = 8
"#,
        )
        .unwrap();

        assert_eq!(config.extensions, vec!["rs".to_string()]);
        assert_eq!(config.extraction_concurrency, 8);
        assert_eq!(config.registration_concurrency, 100);
        assert!(config.enable_acronym_match);
    }

    #[test]
    fn test_missing_index_table() {
        let config = parse_config("[other]\nkey = 1\n").unwrap();
        assert_eq!(config.watch_debounce_ms, 300);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = parse_config(
            "[index]\nactivity_weight = 4.0\nextraction_concurrency = 0\n",
        )
        .unwrap();
        assert_eq!(config.activity_weight, 1.0);
        assert_eq!(config.extraction_concurrency, 1);
    }

    #[test]
    fn test_malformed_file_is_error() {
        assert!(parse_config("[index\nbroken").is_err());
        assert!(parse_config("[index]\nextensions = 5\n").is_err());
    }

    #[test]
    fn test_default_file_written_by_cache_parses() {
        let temp = TempDir::new().unwrap();
        let _cache = crate::cache::CacheStore::open(temp.path()).unwrap();
        let config = load_workspace_config(temp.path()).unwrap();
        assert!(config.has_indexed_extension(Path::new("a.cs")));
    }
}
