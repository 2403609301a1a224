//! Typo tolerance via Damerau–Levenshtein distance
//!
//! Uses the optimal-string-alignment variant: insertion, deletion, substitution
//! and transposition of two adjacent characters each cost 1.

use crate::models::IndexedEntity;

/// Fixed discount of typo matches relative to fuzzy matches
const TYPO_WEIGHT: f64 = 0.85;

/// Lowercased name to compare against, with the extension stripped for files
pub fn typo_target(entity: &IndexedEntity) -> String {
    let name = if entity.is_file() {
        match entity.name.rfind('.') {
            Some(dot) if dot > 0 => &entity.name[..dot],
            _ => entity.name.as_str(),
        }
    } else {
        entity.name.as_str()
    };
    name.to_lowercase()
}

/// Maximum edit distance accepted for a query of `query_len` characters
pub fn allowed_distance(query_len: usize) -> usize {
    if query_len > 7 { 2 } else { 1 }
}

/// Damerau–Levenshtein (optimal string alignment) distance
pub fn damerau_levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    distance_chars(&a, &b)
}

fn distance_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Three rolling rows: i-2, i-1, i
    let mut two_back: Vec<usize> = vec![0; b.len() + 1];
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);

            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(two_back[j - 2] + 1);
            }
            curr[j] = best;
        }
        std::mem::swap(&mut two_back, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Score a lowercased query against a lowercased candidate
///
/// Returns `(distance, score)` when the candidate is within the allowed distance.
/// Candidates whose length differs by more than the allowed distance are
/// rejected before any distance is computed.
pub fn typo_score(query_lower: &[char], candidate_lower: &str) -> Option<(usize, f64)> {
    let allowed = allowed_distance(query_lower.len());
    let candidate: Vec<char> = candidate_lower.chars().collect();

    if query_lower.len().abs_diff(candidate.len()) > allowed {
        return None;
    }

    let distance = distance_chars(query_lower, &candidate);
    if distance > allowed {
        return None;
    }

    let score = (1.0 - distance as f64 / (query_lower.len() + 1) as f64) * TYPO_WEIGHT;
    Some((distance, score))
}
