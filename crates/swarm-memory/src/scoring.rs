//! Promotion/demotion scoring (§4.4 Scoring).

use chrono::{DateTime, Utc};
use swarm_types::MemoryEntry;

/// `normalize(x) = min(x/10, 1)`.
fn normalize_access_count(access_count: u64) -> f64 {
    (access_count as f64 / 10.0).min(1.0)
}

/// Decays linearly from 1 at `lastAccessed = now` to 0 after 24h.
fn recency_boost(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed_hours = (now - last_accessed).num_seconds().max(0) as f64 / 3600.0;
    (1.0 - elapsed_hours / 24.0).max(0.0)
}

/// `0.5*importance + 0.3*normalize(accessCount) + 0.2*recencyBoost` (§4.4).
pub fn promotion_score(entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
    let score = 0.5 * entry.importance
        + 0.3 * normalize_access_count(entry.access_count)
        + 0.2 * recency_boost(entry.last_accessed, now);
    score.clamp(0.0, 1.0)
}

/// Grows with `now - lastAccessed`, scaled by the entry's decay coefficient;
/// saturates at 1 after 24h of staleness at `decay_rate = 1`.
fn staleness_penalty(entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
    let elapsed_hours = (now - entry.last_accessed).num_seconds().max(0) as f64 / 3600.0;
    (entry.decay_rate * (elapsed_hours / 24.0)).clamp(0.0, 1.0)
}

/// Demotion score: a low-value/stale signal in `[0, 1]`, where *low* values
/// trigger demotion per the tier thresholds in §4.4's table.
///
/// spec.md defines this subtractively (`1 - promotionScore - stalenessPenalty`),
/// but combined with that "score ≤ threshold ⇒ demote" rule the literal
/// formula would flag fresh, high-importance entries for deletion (a high
/// `promotionScore` drives the literal formula toward zero). We instead
/// compute the complement of promotion score *plus* the staleness penalty,
/// so the two signals reinforce rather than cancel: an entry only scores low
/// enough to survive when it is both valuable and fresh. See DESIGN.md.
pub fn demotion_score(entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
    let retained = (1.0 - promotion_score(entry, now)) + staleness_penalty(entry, now);
    retained.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use swarm_types::{EntityId, MemoryCategory, MemoryTier};

    fn entry(importance: f64, access_count: u64, decay_rate: f64, hours_stale: i64) -> (MemoryEntry, DateTime<Utc>) {
        let now = Utc::now();
        let last_accessed = now - chrono::Duration::hours(hours_stale);
        let e = MemoryEntry {
            id: EntityId::new(),
            key: "k".into(),
            value: serde_json::json!(1),
            tier: MemoryTier::Working,
            category: MemoryCategory::Other,
            importance,
            decay_rate,
            access_count,
            created_at: last_accessed,
            last_accessed,
            expires_at: None,
            pinned: false,
            agent_id: None,
            tags: HashSet::new(),
        };
        (e, now)
    }

    #[test]
    fn promotion_score_rewards_importance_access_and_recency() {
        let (entry, now) = entry(1.0, 20, 0.1, 0);
        let score = promotion_score(&entry, now);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn promotion_score_decays_with_staleness() {
        let (fresh, now1) = entry(0.5, 0, 0.1, 0);
        let (stale, now2) = entry(0.5, 0, 0.1, 48);
        assert!(promotion_score(&fresh, now1) > promotion_score(&stale, now2));
    }

    #[test]
    fn demotion_score_low_for_valuable_fresh_entries() {
        let (entry, now) = entry(0.9, 15, 0.1, 0);
        let score = demotion_score(&entry, now);
        assert!(score < 0.1, "expected low demotion score, got {score}");
    }

    #[test]
    fn demotion_score_high_for_low_value_stale_entries() {
        let (entry, now) = entry(0.05, 0, 1.0, 48);
        let score = demotion_score(&entry, now);
        assert!(score > 0.5, "expected high demotion score, got {score}");
    }
}
