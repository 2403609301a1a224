//! Usage-recency tracking
//!
//! Search results can be blended with how often and how recently an entity
//! was opened. [`ActivityTracker`] is the in-process implementation; embedders
//! with their own history can implement [`ActivityProvider`] directly.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Half-life of an access, in hours (7 days)
const HALF_LIFE_HOURS: f64 = 24.0 * 7.0;

/// Source of usage-recency scores
pub trait ActivityProvider: Send + Sync {
    /// Score in `[0, 1]`; 0 means no recorded activity
    fn activity_score(&self, entity_id: &str) -> f64;
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    count: u32,
    last_access: DateTime<Utc>,
}

/// Frecency tracker keyed by entity id
#[derive(Debug, Default)]
pub struct ActivityTracker {
    entries: Mutex<HashMap<String, Activity>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an entity was opened now
    pub fn record_access(&self, entity_id: &str) {
        self.record_access_at(entity_id, Utc::now());
    }

    pub fn record_access_at(&self, entity_id: &str, at: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(entity_id.to_string()).or_insert(Activity {
            count: 0,
            last_access: at,
        });
        entry.count = entry.count.saturating_add(1);
        entry.last_access = entry.last_access.max(at);
    }

    /// Forget an entity, e.g. after its file was deleted
    pub fn forget(&self, entity_id: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id);
    }

    /// Score as of `now`: `count / (count + 1)`, halved every seven days
    pub fn score_at(&self, entity_id: &str, now: DateTime<Utc>) -> f64 {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(activity) = entries.get(entity_id) else {
            return 0.0;
        };

        let count = f64::from(activity.count);
        let age_hours = (now - activity.last_access).num_seconds().max(0) as f64 / 3600.0;
        let decay = 0.5f64.powf(age_hours / HALF_LIFE_HOURS);

        (count / (count + 1.0) * decay).clamp(0.0, 1.0)
    }
}

impl ActivityProvider for ActivityTracker {
    fn activity_score(&self, entity_id: &str) -> f64 {
        self.score_at(entity_id, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_unknown_entity_scores_zero() {
        let tracker = ActivityTracker::new();
        assert_eq!(tracker.activity_score("file:/nope"), 0.0);
    }

    #[test]
    fn test_frequency_raises_score() {
        let tracker = ActivityTracker::new();
        let now = Utc::now();

        tracker.record_access_at("a", now);
        let once = tracker.score_at("a", now);
        tracker.record_access_at("a", now);
        tracker.record_access_at("a", now);
        let thrice = tracker.score_at("a", now);

        assert!((once - 0.5).abs() < 1e-9);
        assert!((thrice - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_score_decays_with_age() {
        let tracker = ActivityTracker::new();
        let then = Utc::now();
        tracker.record_access_at("a", then);

        let week_later = tracker.score_at("a", then + Duration::days(7));
        assert!((week_later - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_forget() {
        let tracker = ActivityTracker::new();
        tracker.record_access("a");
        assert!(tracker.activity_score("a") > 0.0);

        tracker.forget("a");
        assert_eq!(tracker.activity_score("a"), 0.0);
    }
}
