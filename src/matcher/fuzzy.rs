//! Subsequence fuzzy scoring
//!
//! A query matches a target when every query character appears in the target
//! in order. Matches earn a base point per character plus a bonus for landing
//! on the first character, on a word boundary, or directly after the previous
//! matched character. The raw score is divided by the best achievable raw score
//! for the query length and scaled by how much of the target the query covers,
//! so an exact match scores exactly 1.0.

/// Bonus for matching the first query character at target position 0
const START_BONUS: f64 = 2.0;
/// Bonus for a match directly after the previous match
const CONSECUTIVE_BONUS: f64 = 1.5;
/// Bonus for a match on a word boundary (after a separator or at a camel hump)
const BOUNDARY_BONUS: f64 = 1.0;
/// Share of the normalized score that depends on target coverage
const COVERAGE_WEIGHT: f64 = 0.1;

/// Lowercased characters of a string with word-boundary flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedText {
    pub chars: Vec<char>,
    pub boundaries: Vec<bool>,
}

impl PreparedText {
    pub fn new(text: &str) -> Self {
        let original: Vec<char> = text.chars().collect();
        let mut chars = Vec::with_capacity(original.len());
        let mut boundaries = Vec::with_capacity(original.len());

        for (i, &c) in original.iter().enumerate() {
            let boundary = match i.checked_sub(1).map(|p| original[p]) {
                None => true,
                Some(prev) => {
                    is_separator(prev)
                        || (c.is_uppercase() && prev.is_lowercase())
                        || (c.is_alphanumeric() && prev.is_numeric() != c.is_numeric())
                }
            };
            // Multi-char lowercase forms keep only the first char to stay index-aligned
            chars.push(c.to_lowercase().next().unwrap_or(c));
            boundaries.push(boundary);
        }

        Self { chars, boundaries }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '.' | '/' | '\\' | ' ' | ':' | '<' | '>' | '(' | ')')
}

/// Lowercase a query into match-ready characters
pub fn prepare_query(query: &str) -> Vec<char> {
    query
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Best achievable raw score for a query of `len` characters
fn max_raw_score(len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    (1.0 + START_BONUS) + (len - 1) as f64 * (1.0 + CONSECUTIVE_BONUS)
}

/// Raw score of a greedy forward match starting at `start`
fn score_from(query: &[char], target: &PreparedText, start: usize) -> Option<f64> {
    let mut raw = 0.0;
    let mut prev: Option<usize> = None;
    let mut pos = start;

    for (qi, &qc) in query.iter().enumerate() {
        let found = (pos..target.len()).find(|&i| target.chars[i] == qc)?;

        let bonus = if qi == 0 && found == 0 {
            START_BONUS
        } else if prev.is_some_and(|p| p + 1 == found) {
            CONSECUTIVE_BONUS
        } else if target.boundaries[found] {
            BOUNDARY_BONUS
        } else {
            0.0
        };

        raw += 1.0 + bonus;
        prev = Some(found);
        pos = found + 1;
    }

    Some(raw)
}

/// Normalized subsequence score in `[0, 1]`, or `None` when the query does not match
pub fn fuzzy_score(query: &[char], target: &PreparedText) -> Option<f64> {
    if query.is_empty() || query.len() > target.len() {
        return None;
    }

    // Try every start position of the first query char and keep the best run
    let best = (0..=target.len() - query.len())
        .filter(|&i| target.chars[i] == query[0])
        .filter_map(|i| score_from(query, target, i))
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))?;

    let coverage = query.len() as f64 / target.len() as f64;
    let normalized = (best / max_raw_score(query.len())).min(1.0);

    Some(normalized * (1.0 - COVERAGE_WEIGHT + COVERAGE_WEIGHT * coverage))
}
