//! Failure types of the indexing pipeline

use thiserror::Error;

/// Contained failures of the indexing pipeline
///
/// None of these abort a run. They are logged where they occur and counted in
/// the run's [`IndexStats`](crate::models::IndexStats).
#[derive(Error, Debug)]
pub enum PipelineFailure {
    /// One file's extraction errored; the file is skipped and its prior cache record kept
    #[error("Extraction failed for {path}: {source:#}")]
    Extraction {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// A file-listing strategy was unavailable; the next strategy is tried
    #[error("File discovery via {strategy} failed: {source:#}")]
    Discovery {
        strategy: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Cache load or save failed; indexing proceeds with an empty or unsaved cache
    #[error("Cache {operation} failed: {source:#}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineFailure {
    pub fn extraction(path: impl Into<String>, source: anyhow::Error) -> Self {
        PipelineFailure::Extraction {
            path: path.into(),
            source,
        }
    }

    pub fn discovery(strategy: &'static str, source: anyhow::Error) -> Self {
        PipelineFailure::Discovery { strategy, source }
    }

    pub fn persistence(operation: &'static str, source: anyhow::Error) -> Self {
        PipelineFailure::Persistence { operation, source }
    }

    /// Log the failure at warn level
    pub fn log(&self) {
        log::warn!("{}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context_chain() {
        let err = anyhow::anyhow!("disk full").context("Failed to write cache.db");
        let failure = PipelineFailure::persistence("save", err);
        assert_eq!(
            failure.to_string(),
            "Cache save failed: Failed to write cache.db: disk full"
        );
    }

    #[test]
    fn test_extraction_names_the_file() {
        let failure = PipelineFailure::extraction("/w/a.rs", anyhow::anyhow!("timeout"));
        assert_eq!(failure.to_string(), "Extraction failed for /w/a.rs: timeout");
    }
}
