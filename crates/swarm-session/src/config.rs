//! Session configuration and its documented defaults (§3 Session, §4.1).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default checkpoint interval for auto-checkpointing (§4.1 Auto-checkpointing).
pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default number of checkpoints retained per session (§8 Checkpoint retention).
pub const DEFAULT_MAX_CHECKPOINTS: usize = 20;

/// Per-session configuration (§3 Session "configuration").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of agents this session may hold.
    pub max_agents: usize,
    /// Maximum concurrent tasks across the session (advisory; per-agent
    /// bounds live on `Agent::max_concurrent_tasks`).
    pub max_concurrent_tasks: usize,
    /// Interval between auto-checkpoint firings.
    pub checkpoint_interval: Duration,
    /// Whether the auto-checkpoint timer is enabled.
    pub auto_checkpoint: bool,
    /// Whether checkpoints and terminal snapshots are written to
    /// persistence, or kept in memory only.
    pub persist_to_disk: bool,
    /// Maximum number of checkpoints retained; oldest are evicted first.
    pub max_checkpoints: usize,
}

impl SessionConfig {
    /// Construct a configuration with `max_agents` and every other field at
    /// its documented default.
    pub fn new(max_agents: usize) -> Self {
        Self {
            max_agents,
            max_concurrent_tasks: max_agents.max(1) * 3,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            auto_checkpoint: false,
            persist_to_disk: true,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
        }
    }

    /// Enable auto-checkpointing at `interval`.
    pub fn with_auto_checkpoint(mut self, interval: Duration) -> Self {
        self.auto_checkpoint = true;
        self.checkpoint_interval = interval;
        self
    }

    /// Override `persist_to_disk`.
    pub fn with_persist_to_disk(mut self, persist: bool) -> Self {
        self.persist_to_disk = persist;
        self
    }

    /// Override `max_checkpoints`.
    pub fn with_max_checkpoints(mut self, n: usize) -> Self {
        self.max_checkpoints = n;
        self
    }

    /// Whether this configuration is valid (§4.1 CreateSession: "Fails with
    /// `INVALID_CONFIG` if `maxAgents <= 0`").
    pub fn is_valid(&self) -> bool {
        self.max_agents > 0
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_agents_is_invalid() {
        let cfg = SessionConfig::new(0);
        assert!(!cfg.is_valid());
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = SessionConfig::default();
        assert!(!cfg.auto_checkpoint);
        assert!(cfg.persist_to_disk);
        assert_eq!(cfg.max_checkpoints, DEFAULT_MAX_CHECKPOINTS);
        assert_eq!(cfg.checkpoint_interval, DEFAULT_CHECKPOINT_INTERVAL);
    }
}
