//! Matching and scoring engine
//!
//! `search` runs up to three matching passes over a scope's projection and
//! merges them into one ranked list:
//!
//! 1. Fuzzy subsequence matching against `name`, and against `full_name` with a
//!    0.9 penalty (always).
//! 2. Acronym matching against the hump string (when enabled and the fuzzy
//!    pass returned fewer than `max_results / 2` hits).
//! 3. Typo tolerance by edit distance (when the query is longer than three
//!    characters and no hit scored 0.95 or better).
//!
//! Passes merge by entity id; the first pass to produce an entity keeps its
//! score. Kind boosts and optional usage-recency blending are applied last.
//!
//! `burst_search` is the near-zero-cost exact/prefix pass used for the first
//! paint while `search` is still running.

pub mod acronym;
pub mod fuzzy;
pub mod typo;

use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use crate::activity::ActivityProvider;
use crate::models::{IndexConfig, Scope, ScoredEntity};
use crate::store::{IndexStore, PreparedEntity};

/// Penalty applied to matches on the qualified name
const FULL_NAME_PENALTY: f64 = 0.9;
/// Top scores at or above this suppress the typo pass
const NEAR_PERFECT_SCORE: f64 = 0.95;
/// Queries must be longer than this to attempt typo tolerance
const TYPO_MIN_QUERY_LEN: usize = 3;
/// Projections smaller than this are scored on the calling thread
const PARALLEL_THRESHOLD: usize = 4096;

/// Intermediate hit: index into the projection plus pre-boost score
#[derive(Debug, Clone, Copy)]
struct Hit {
    index: usize,
    score: f64,
}

/// Search configuration derived from [`IndexConfig`]
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Blend weight for activity scores, in `[0, 1]`
    pub activity_weight: f64,
    /// Rank every typo candidate before capping instead of stopping early
    pub typo_collect_all: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for SearchOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            activity_weight: config.activity_weight.clamp(0.0, 1.0),
            typo_collect_all: config.typo_collect_all,
        }
    }
}

/// Query front-end over an [`IndexStore`]
pub struct SearchEngine {
    store: Arc<IndexStore>,
    activity: Option<Arc<dyn ActivityProvider>>,
    options: SearchOptions,
}

impl SearchEngine {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self {
            store,
            activity: None,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Enable usage-recency blending
    pub fn with_activity(mut self, activity: Arc<dyn ActivityProvider>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Ranked search combining fuzzy, acronym and typo passes
    pub fn search(
        &self,
        query: &str,
        scope: Scope,
        max_results: usize,
        enable_acronym_match: bool,
    ) -> Vec<ScoredEntity> {
        let query = query.trim();
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let snapshot = self.store.snapshot();
        let candidates = snapshot.scope(scope);
        let query_chars = fuzzy::prepare_query(query);

        let mut hits = fuzzy_pass(&query_chars, candidates);
        let mut seen: HashSet<usize> = hits.iter().map(|h| h.index).collect();
        log::trace!("fuzzy pass: {} hits for {:?}", hits.len(), query);

        if enable_acronym_match && hits.len() * 2 < max_results {
            let acronym_hits = acronym_pass(&query.to_uppercase(), candidates);
            log::trace!("acronym pass: {} hits", acronym_hits.len());
            merge_hits(&mut hits, &mut seen, acronym_hits);
        }

        let top_score = hits.iter().map(|h| h.score).fold(0.0, f64::max);
        if query_chars.len() > TYPO_MIN_QUERY_LEN && top_score < NEAR_PERFECT_SCORE {
            let typo_hits = typo_pass(
                &query_chars,
                candidates,
                &seen,
                max_results,
                self.options.typo_collect_all,
            );
            log::trace!("typo pass: {} hits", typo_hits.len());
            merge_hits(&mut hits, &mut seen, typo_hits);
        }

        let mut results: Vec<ScoredEntity> = hits
            .into_iter()
            .map(|hit| {
                let prepared = &candidates[hit.index];
                ScoredEntity {
                    entity: (*prepared.entity).clone(),
                    score: hit.score * prepared.entity.kind.boost(),
                }
            })
            .collect();

        sort_by_score(&mut results);
        self.blend_activity(&mut results);
        results.truncate(max_results);
        results
    }

    /// Exact/prefix-only pass against `name`
    ///
    /// Exact matches always rank ahead of prefix matches, so an entity whose
    /// name equals the query is returned whenever fewer than `max_results`
    /// entities share that name.
    pub fn burst_search(&self, query: &str, scope: Scope, max_results: usize) -> Vec<ScoredEntity> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let snapshot = self.store.snapshot();
        let query_len = query.chars().count() as f64;

        let mut exact = Vec::new();
        let mut prefix = Vec::new();
        for prepared in snapshot.scope(scope) {
            let boost = prepared.entity.kind.boost();
            if prepared.name_lower == query {
                exact.push(scored(prepared, boost));
            } else if prepared.name_lower.starts_with(&query) {
                let coverage = query_len / prepared.name_lower.chars().count() as f64;
                prefix.push(scored(prepared, (0.5 + 0.5 * coverage) * boost));
            }
        }

        sort_by_score(&mut exact);
        self.blend_activity(&mut exact);
        sort_by_score(&mut prefix);
        self.blend_activity(&mut prefix);

        exact.extend(prefix);
        exact.truncate(max_results);
        exact
    }

    /// Blend in usage recency and re-sort
    fn blend_activity(&self, results: &mut [ScoredEntity]) {
        let Some(activity) = &self.activity else {
            return;
        };
        let weight = self.options.activity_weight;
        if weight <= 0.0 {
            return;
        }

        let mut changed = false;
        for result in results.iter_mut() {
            let activity_score = activity.activity_score(&result.entity.id).clamp(0.0, 1.0);
            if activity_score > 0.0 {
                result.score = result.score * (1.0 - weight) + activity_score * weight;
                changed = true;
            }
        }

        if changed {
            sort_by_score(results);
        }
    }
}

fn scored(prepared: &PreparedEntity, score: f64) -> ScoredEntity {
    ScoredEntity {
        entity: (*prepared.entity).clone(),
        score,
    }
}

/// Stable descending sort, so ties keep merge order
fn sort_by_score(results: &mut [ScoredEntity]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Append hits for entities not produced by an earlier pass
fn merge_hits(hits: &mut Vec<Hit>, seen: &mut HashSet<usize>, new_hits: Vec<Hit>) {
    for hit in new_hits {
        if seen.insert(hit.index) {
            hits.push(hit);
        }
    }
}

fn fuzzy_candidate(query: &[char], prepared: &PreparedEntity) -> Option<f64> {
    let name_score = fuzzy::fuzzy_score(query, &prepared.name);
    let full_score = prepared
        .full_name
        .as_ref()
        .and_then(|full| fuzzy::fuzzy_score(query, full))
        .map(|s| s * FULL_NAME_PENALTY);

    match (name_score, full_score) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn fuzzy_pass(query: &[char], candidates: &[Arc<PreparedEntity>]) -> Vec<Hit> {
    let score = |(index, prepared): (usize, &Arc<PreparedEntity>)| {
        fuzzy_candidate(query, prepared).map(|score| Hit { index, score })
    };

    // Order is preserved either way, so merge order stays deterministic
    if candidates.len() >= PARALLEL_THRESHOLD {
        candidates.par_iter().enumerate().filter_map(score).collect()
    } else {
        candidates.iter().enumerate().filter_map(score).collect()
    }
}

fn acronym_pass(query_upper: &str, candidates: &[Arc<PreparedEntity>]) -> Vec<Hit> {
    candidates
        .iter()
        .enumerate()
        .filter_map(|(index, prepared)| {
            acronym::acronym_score(query_upper, &prepared.hump).map(|score| Hit { index, score })
        })
        .collect()
}

/// Edit-distance pass over candidates not already matched
///
/// By default the scan stops as soon as `max_results` new candidates have been
/// found, in projection order, which can keep an earlier weaker match over a
/// later closer one. With `collect_all` every candidate is collected and the
/// closest `max_results` are kept.
fn typo_pass(
    query: &[char],
    candidates: &[Arc<PreparedEntity>],
    seen: &HashSet<usize>,
    max_results: usize,
    collect_all: bool,
) -> Vec<Hit> {
    let mut found: Vec<(usize, Hit)> = Vec::new();

    for (index, prepared) in candidates.iter().enumerate() {
        if seen.contains(&index) {
            continue;
        }
        if let Some((distance, score)) = typo::typo_score(query, &prepared.typo_name) {
            found.push((distance, Hit { index, score }));
            if !collect_all && found.len() >= max_results {
                break;
            }
        }
    }

    if collect_all {
        found.sort_by_key(|(distance, _)| *distance);
        found.truncate(max_results);
    }

    found.into_iter().map(|(_, hit)| hit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, IndexedEntity};
    use std::collections::HashMap;
    use std::path::Path;

    fn symbol(name: &str, kind: EntityKind) -> IndexedEntity {
        let path = format!("/src/{}.rs", kind);
        IndexedEntity::symbol("ts", &path, name, kind, None, 0, 0)
    }

    fn engine_with(items: Vec<IndexedEntity>) -> SearchEngine {
        let store = Arc::new(IndexStore::new());
        store.set_items(items);
        SearchEngine::new(store)
    }

    fn names(results: &[ScoredEntity]) -> Vec<&str> {
        results.iter().map(|r| r.entity.name.as_str()).collect()
    }

    struct FixedActivity(HashMap<String, f64>);

    impl ActivityProvider for FixedActivity {
        fn activity_score(&self, entity_id: &str) -> f64 {
            self.0.get(entity_id).copied().unwrap_or(0.0)
        }
    }

    #[test]
    fn test_empty_and_whitespace_queries() {
        let engine = engine_with(vec![symbol("Parser", EntityKind::Class)]);
        for scope in [Scope::Everything, Scope::Types, Scope::Files] {
            assert!(engine.search("", scope, 10, true).is_empty());
            assert!(engine.search("   ", scope, 10, true).is_empty());
            assert!(engine.burst_search("", scope, 10).is_empty());
            assert!(engine.burst_search("  ", scope, 10).is_empty());
        }
    }

    #[test]
    fn test_results_sorted_and_truncated() {
        let engine = engine_with(
            (0..20)
                .map(|i| symbol(&format!("handler{}", i), EntityKind::Function))
                .collect(),
        );

        let results = engine.search("handler", Scope::Everything, 5, true);
        assert_eq!(results.len(), 5);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_scope_narrows_candidates() {
        let engine = engine_with(vec![
            symbol("Parser", EntityKind::Class),
            symbol("parse", EntityKind::Function),
            IndexedEntity::file(Path::new("/src/parser.rs")),
        ]);

        let types = engine.search("pars", Scope::Types, 10, true);
        assert_eq!(names(&types), vec!["Parser"]);

        let files = engine.search("pars", Scope::Files, 10, true);
        assert_eq!(names(&files), vec!["parser.rs"]);

        let everything = engine.search("pars", Scope::Everything, 10, true);
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn test_kind_boost_breaks_equal_raw_scores() {
        let engine = engine_with(vec![
            symbol("account", EntityKind::Variable),
            symbol("account", EntityKind::Class),
        ]);

        let results = engine.search("account", Scope::Everything, 10, false);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entity.kind, EntityKind::Class);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_full_name_match_is_penalized() {
        let mut qualified =
            IndexedEntity::symbol("ts", "/a.rs", "load", EntityKind::Method, Some("Config".into()), 0, 0);
        qualified.id = "qualified".to_string();
        let engine = engine_with(vec![qualified]);

        let results = engine.search("configload", Scope::Everything, 10, false);
        assert_eq!(results.len(), 1);
        assert!(results[0].score <= 0.9 * EntityKind::Method.boost() + 1e-9);
    }

    #[test]
    fn test_acronym_merge_keeps_fuzzy_score() {
        // "UPS" is also a subsequence of the name; the acronym pass must not
        // overwrite the score the fuzzy pass already produced.
        let engine = engine_with(vec![symbol("UserProfileService", EntityKind::Class)]);
        let with_acronym = engine.search("UPS", Scope::Everything, 10, true);
        let fuzzy_only = engine.search("UPS", Scope::Everything, 10, false);

        assert_eq!(with_acronym.len(), 1);
        assert!((with_acronym[0].score - fuzzy_only[0].score).abs() < 1e-9);
    }

    #[test]
    fn test_acronym_pass_scores_leading_match() {
        let engine = engine_with(vec![symbol("getUserName", EntityKind::Function)]);
        let snapshot = engine.store().snapshot();

        let hits = acronym_pass("GUN", snapshot.scope(Scope::Everything));
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_acronym_pass_runs_below_half_of_odd_limit() {
        // Two fuzzy hits against a limit of five is still under half
        let engine = engine_with(vec![
            symbol("Unusual", EntityKind::Class),
            symbol("Ubuntu", EntityKind::Class),
            symbol("UserProfile", EntityKind::Class),
        ]);

        let results = engine.search("UU", Scope::Everything, 5, true);
        assert_eq!(results.len(), 3);
        assert!(results.iter().any(|r| r.entity.name == "UserProfile"));

        let fuzzy_only = engine.search("UU", Scope::Everything, 5, false);
        assert_eq!(fuzzy_only.len(), 2);
    }

    #[test]
    fn test_acronym_pass_runs_with_single_result_limit() {
        let engine = engine_with(vec![symbol("UserProfile", EntityKind::Class)]);
        let results = engine.search("UU", Scope::Everything, 1, true);
        assert_eq!(names(&results), vec!["UserProfile"]);
    }

    #[test]
    fn test_empty_scope_returns_nothing() {
        let engine = engine_with(vec![symbol("Parser", EntityKind::Class)]);
        assert!(engine.search("Parser", Scope::Commands, 10, true).is_empty());
        assert!(engine.burst_search("Parser", Scope::Files, 10).is_empty());
    }

    #[test]
    fn test_typo_tolerance_on_file_names() {
        let engine = engine_with(vec![
            IndexedEntity::file(Path::new("/work/ResetBalances.cs")),
            symbol("Unrelated", EntityKind::Class),
        ]);

        let results = engine.search("ReserBalances", Scope::Everything, 10, true);
        assert_eq!(names(&results), vec!["ResetBalances.cs"]);
        let expected = (1.0 - 1.0 / 14.0) * 0.85 * EntityKind::File.boost();
        assert!((results[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_typo_pass_skipped_for_short_queries() {
        let engine = engine_with(vec![symbol("pasr", EntityKind::Function)]);
        assert_eq!(engine.search("pars", Scope::Everything, 10, false).len(), 1);
        // Three characters: no typo tolerance
        assert!(engine.search("psa", Scope::Everything, 10, false).is_empty());
    }

    #[test]
    fn test_typo_pass_suppressed_by_near_perfect_match() {
        let engine = engine_with(vec![
            symbol("render", EntityKind::Function),
            symbol("rendre", EntityKind::Method),
        ]);

        let results = engine.search("render", Scope::Everything, 10, false);
        assert_eq!(names(&results), vec!["render"]);
    }

    // "cxrtsyzq" is two edits from the query, "cartsyzq" only one, and the
    // weaker candidate comes first in projection order.
    fn typo_ordering_items() -> Vec<IndexedEntity> {
        vec![
            symbol("cxrtsyzq", EntityKind::Function),
            symbol("cartsyzq", EntityKind::Method),
        ]
    }

    #[test]
    fn test_typo_early_exit_keeps_first_found() {
        let engine = engine_with(typo_ordering_items());

        let results = engine.search("cartsyzz", Scope::Everything, 1, false);
        assert_eq!(names(&results), vec!["cxrtsyzq"]);
    }

    #[test]
    fn test_typo_collect_all_prefers_closest() {
        let engine = engine_with(typo_ordering_items()).with_options(SearchOptions {
            activity_weight: 0.0,
            typo_collect_all: true,
        });

        let results = engine.search("cartsyzz", Scope::Everything, 1, false);
        assert_eq!(names(&results), vec!["cartsyzq"]);
    }

    #[test]
    fn test_burst_search_exact_and_prefix() {
        let engine = engine_with(vec![
            symbol("ParserFactory", EntityKind::Class),
            symbol("parser", EntityKind::Variable),
            symbol("Tokenizer", EntityKind::Class),
        ]);

        let results = engine.burst_search("Parser", Scope::Everything, 10);
        assert_eq!(names(&results), vec!["parser", "ParserFactory"]);
    }

    #[test]
    fn test_burst_search_exact_survives_cap() {
        let mut items: Vec<IndexedEntity> = (0..10)
            .map(|i| symbol(&format!("configBuilder{}", i), EntityKind::Class))
            .collect();
        items.push(symbol("config", EntityKind::Variable));
        let engine = engine_with(items);

        let results = engine.burst_search("CONFIG", Scope::Everything, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].entity.name, "config");
    }

    #[test]
    fn test_activity_blending_reorders() {
        let store = Arc::new(IndexStore::new());
        let class = symbol("widget", EntityKind::Class);
        let variable = symbol("widget", EntityKind::Variable);
        let class_id = class.id.clone();
        let variable_id = variable.id.clone();
        store.set_items(vec![class, variable]);

        let mut scores = HashMap::new();
        scores.insert(variable_id.clone(), 1.0);
        scores.insert(class_id, 0.1);
        let engine = SearchEngine::new(store)
            .with_options(SearchOptions {
                activity_weight: 0.5,
                typo_collect_all: false,
            })
            .with_activity(Arc::new(FixedActivity(scores)));

        let results = engine.search("widget", Scope::Everything, 10, false);
        assert_eq!(results[0].entity.id, variable_id);
        // 0.9 * 0.5 + 1.0 * 0.5 vs 1.3 * 0.5 + 0.1 * 0.5
        assert!((results[0].score - 0.95).abs() < 1e-9);
        assert!((results[1].score - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let engine = engine_with(vec![symbol("Parser", EntityKind::Class)]);
        assert!(engine.search("zzzz", Scope::Everything, 10, true).is_empty());
        assert!(engine.search("Parser", Scope::Commands, 0, true).is_empty());
    }
}
