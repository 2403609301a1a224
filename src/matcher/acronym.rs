//! Acronym ("hump") matching
//!
//! A name's hump string is its first character followed by every uppercase
//! letter in it, uppercased. `UserProfileService` yields `UUPS` (the leading
//! capital counts twice), `getUserName` yields `GUN`.

/// Multiplier applied when the query matches at the start of the hump string
const LEADING_BOOST: f64 = 1.5;
/// Fixed discount of acronym matches relative to fuzzy matches
const ACRONYM_WEIGHT: f64 = 0.8;

/// Build the uppercased hump string of a name
pub fn hump_string(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut hump: String = first.to_uppercase().collect();
    hump.extend(name.chars().filter(|c| c.is_uppercase()));
    hump
}

/// Score an uppercased query against a precomputed hump string
///
/// The query must be a contiguous substring of the hump string.
pub fn acronym_score(query_upper: &str, hump: &str) -> Option<f64> {
    if query_upper.is_empty() || hump.is_empty() {
        return None;
    }

    let position = hump.find(query_upper)?;
    let query_len = query_upper.chars().count() as f64;
    let hump_len = hump.chars().count() as f64;
    let position_boost = if position == 0 { LEADING_BOOST } else { 1.0 };

    Some((query_len / hump_len) * position_boost * ACRONYM_WEIGHT)
}
