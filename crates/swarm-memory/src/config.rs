//! Tier configuration and its documented defaults (§4.4 Tier configuration).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-tier configuration: capacity bound, default TTL, and the score
/// thresholds that drive automatic promotion/demotion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Maximum number of entries this tier holds; `None` means unbounded
    /// (the persistent tier).
    pub max_entries: Option<usize>,
    /// Default time-to-live applied when a stored entry doesn't specify one;
    /// `None` means entries never expire by default (the persistent tier).
    pub default_ttl: Option<Duration>,
    /// Promotion score at or above which an entry is promoted to the next
    /// tier; `None` for the persistent tier, which has no higher tier.
    pub promotion_threshold: Option<f64>,
    /// Demotion score at or below which an entry is demoted (or, for the
    /// working tier, deleted outright).
    pub demotion_threshold: f64,
}

/// The three tiers' configuration, with the defaults spec.md §4.4 documents
/// as contracts: "an implementer may expose overrides but the defaults
/// above are what tests and external expectations assume."
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Working-tier configuration.
    pub working: TierConfig,
    /// Episodic-tier configuration.
    pub episodic: TierConfig,
    /// Persistent-tier configuration.
    pub persistent: TierConfig,
    /// How often the cooperative maintenance pass should run by default.
    pub maintenance_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working: TierConfig {
                max_entries: Some(100),
                default_ttl: Some(Duration::from_secs(5 * 60)),
                promotion_threshold: Some(0.7),
                demotion_threshold: 0.1,
            },
            episodic: TierConfig {
                max_entries: Some(1000),
                default_ttl: Some(Duration::from_secs(24 * 60 * 60)),
                promotion_threshold: Some(0.85),
                demotion_threshold: 0.2,
            },
            persistent: TierConfig {
                max_entries: None,
                default_ttl: None,
                promotion_threshold: None,
                demotion_threshold: 0.1,
            },
            maintenance_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = MemoryConfig::default();
        assert_eq!(cfg.working.max_entries, Some(100));
        assert_eq!(cfg.episodic.max_entries, Some(1000));
        assert_eq!(cfg.persistent.max_entries, None);
        assert_eq!(cfg.working.promotion_threshold, Some(0.7));
        assert_eq!(cfg.episodic.promotion_threshold, Some(0.85));
        assert_eq!(cfg.persistent.promotion_threshold, None);
        assert_eq!(cfg.working.demotion_threshold, 0.1);
        assert_eq!(cfg.episodic.demotion_threshold, 0.2);
        assert_eq!(cfg.persistent.demotion_threshold, 0.1);
    }
}
