#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-memory** – C3, Tiered Memory (§4.4).
//!
//! A per-session working/episodic/persistent cache. Entries are scored at
//! store/retrieve/maintenance time and migrate tiers automatically; pinned
//! entries are exempt from every automatic removal path. Persistence for the
//! persistent tier goes through `swarm_store::ObjectStore`, mirroring how
//! `toka-store-semantic` layers scoring logic over `toka-store-core`'s
//! storage abstraction rather than owning storage itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swarm_store::ObjectStore;
use swarm_types::{EntityId, MemoryCategory, MemoryEntry, MemoryTier};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub mod config;
pub mod scoring;

pub use config::{MemoryConfig, TierConfig};

/// Errors the tiered memory surfaces.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoryError {
    /// The persistence backend rejected a read or write.
    #[error("memory persistence error: {0}")]
    Storage(String),
}

/// Parameters for [`TieredMemory::store`] (§4.4 Store operation).
#[derive(Debug, Clone, Default)]
pub struct StoreParams {
    /// The entry's key (unique within its tier).
    pub key: String,
    /// The opaque value.
    pub value: serde_json::Value,
    /// Target tier; defaults to working.
    pub tier: Option<MemoryTier>,
    /// Category; defaults to other.
    pub category: Option<MemoryCategory>,
    /// Importance in `[0, 1]`; defaults to 0.5.
    pub importance: Option<f64>,
    /// Time-to-live; defaults to the target tier's default TTL.
    pub ttl: Option<Duration>,
    /// Free-form tags.
    pub tags: HashSet<String>,
    /// Owning agent, if any.
    pub agent_id: Option<EntityId>,
    /// Whether the entry should be pinned (never evicted/expired/demoted).
    pub is_pinned: bool,
}

/// Filter for [`TieredMemory::search`] (§4.4 Search operation). All
/// populated fields combine conjunctively; `tags` matches AND-wise.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to one tier; `None` searches all three.
    pub tier: Option<MemoryTier>,
    /// Restrict to one category.
    pub category: Option<MemoryCategory>,
    /// Restrict to entries owned by this agent.
    pub agent_id: Option<EntityId>,
    /// Every tag here must be present on the entry.
    pub tags: HashSet<String>,
    /// Minimum importance.
    pub min_importance: Option<f64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Per-tier summary statistics (§4.4 Stats operation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TierStats {
    /// Number of entries.
    pub count: usize,
    /// Approximate serialized size, in bytes.
    pub size_bytes: usize,
    /// Average importance across entries in the tier.
    pub avg_importance: f64,
    /// Average access count across entries in the tier.
    pub avg_access_count: f64,
    /// Oldest `createdAt` in the tier, if any.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest `createdAt` in the tier, if any.
    pub newest: Option<DateTime<Utc>>,
}

/// Aggregate statistics across all three tiers plus a combined total row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryStats {
    /// Working-tier stats.
    pub working: TierStats,
    /// Episodic-tier stats.
    pub episodic: TierStats,
    /// Persistent-tier stats.
    pub persistent: TierStats,
    /// Combined stats across all tiers.
    pub total: TierStats,
}

/// What the maintenance pass did, for logging/metrics by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceReport {
    /// Entries removed because they expired.
    pub expired_removed: usize,
    /// Entries auto-promoted to a higher tier.
    pub auto_promoted: usize,
    /// Entries auto-demoted to a lower tier.
    pub auto_demoted: usize,
    /// Entries deleted outright by demotion-from-working.
    pub auto_deleted: usize,
}

#[derive(Default)]
struct TierState {
    entries: HashMap<String, MemoryEntry>,
}

/// The three-tier memory cache (§3 Memory Entry, §4.4).
pub struct TieredMemory {
    store: Arc<dyn ObjectStore>,
    config: MemoryConfig,
    working: RwLock<TierState>,
    episodic: RwLock<TierState>,
    persistent: RwLock<TierState>,
}

fn persistent_doc_key(id: EntityId) -> String {
    format!("memory:{id}")
}

impl TieredMemory {
    /// Construct a tiered memory cache backed by `store` for the persistent
    /// tier, using the documented default tier configuration.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, MemoryConfig::default())
    }

    /// Construct with an explicit tier configuration (tests and callers that
    /// need non-default bounds).
    pub fn with_config(store: Arc<dyn ObjectStore>, config: MemoryConfig) -> Self {
        Self {
            store,
            config,
            working: RwLock::new(TierState::default()),
            episodic: RwLock::new(TierState::default()),
            persistent: RwLock::new(TierState::default()),
        }
    }

    fn tier_state(&self, tier: MemoryTier) -> &RwLock<TierState> {
        match tier {
            MemoryTier::Working => &self.working,
            MemoryTier::Episodic => &self.episodic,
            MemoryTier::Persistent => &self.persistent,
        }
    }

    fn tier_config(&self, tier: MemoryTier) -> &TierConfig {
        match tier {
            MemoryTier::Working => &self.config.working,
            MemoryTier::Episodic => &self.config.episodic,
            MemoryTier::Persistent => &self.config.persistent,
        }
    }

    fn next_tier(tier: MemoryTier) -> Option<MemoryTier> {
        match tier {
            MemoryTier::Working => Some(MemoryTier::Episodic),
            MemoryTier::Episodic => Some(MemoryTier::Persistent),
            MemoryTier::Persistent => None,
        }
    }

    fn prev_tier(tier: MemoryTier) -> Option<MemoryTier> {
        match tier {
            MemoryTier::Working => None,
            MemoryTier::Episodic => Some(MemoryTier::Working),
            MemoryTier::Persistent => Some(MemoryTier::Episodic),
        }
    }

    /// Store a new entry (§4.4 Store). Evicts the lowest-scored non-pinned
    /// entry if the target tier is at capacity; if every entry is pinned,
    /// insertion still succeeds and the tier temporarily exceeds its bound.
    pub async fn store(&self, params: StoreParams) -> Result<MemoryEntry, MemoryError> {
        let tier = params.tier.unwrap_or(MemoryTier::Working);
        let now = Utc::now();
        let tier_cfg = self.tier_config(tier);
        let ttl = params.ttl.or(tier_cfg.default_ttl);

        let entry = MemoryEntry {
            id: EntityId::new(),
            key: params.key.clone(),
            value: params.value,
            tier,
            category: params.category.unwrap_or(MemoryCategory::Other),
            importance: params.importance.unwrap_or(0.5),
            decay_rate: 0.1,
            access_count: 0,
            created_at: now,
            last_accessed: now,
            expires_at: ttl.and_then(|d| chrono::Duration::from_std(d).ok()).map(|d| now + d),
            pinned: params.is_pinned,
            agent_id: params.agent_id,
            tags: params.tags,
        };

        let mut state = self.tier_state(tier).write().await;
        if let Some(max) = tier_cfg.max_entries {
            if state.entries.len() >= max && !state.entries.contains_key(&entry.key) {
                let victim = state
                    .entries
                    .values()
                    .filter(|e| !e.pinned)
                    .min_by(|a, b| {
                        scoring::promotion_score(a, now)
                            .partial_cmp(&scoring::promotion_score(b, now))
                            .unwrap()
                    })
                    .map(|e| e.key.clone());
                match victim {
                    Some(key) => {
                        debug!(tier = ?tier, key, "evicting lowest-scored entry to make room");
                        state.entries.remove(&key);
                    }
                    None => {
                        warn!(tier = ?tier, "tier at capacity with no evictable entry; exceeding soft bound");
                    }
                }
            }
        }
        state.entries.insert(entry.key.clone(), entry.clone());
        drop(state);

        if tier == MemoryTier::Persistent {
            self.persist(&entry).await?;
        }

        Ok(entry)
    }

    async fn persist(&self, entry: &MemoryEntry) -> Result<(), MemoryError> {
        let doc = serde_json::to_value(entry).map_err(|e| MemoryError::Storage(e.to_string()))?;
        self.store
            .put(&persistent_doc_key(entry.id), doc)
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))
    }

    async fn unpersist(&self, id: EntityId) -> Result<(), MemoryError> {
        self.store
            .delete(&persistent_doc_key(id))
            .await
            .map(|_| ())
            .map_err(|e| MemoryError::Storage(e.to_string()))
    }

    /// Retrieve a value by key (§4.4 Retrieve). When `tier` is omitted,
    /// searches working → episodic → persistent in order. Bumps access
    /// bookkeeping and immediately promotes the entry if its updated
    /// promotion score crosses the target tier's threshold.
    pub async fn retrieve(&self, key: &str, tier: Option<MemoryTier>) -> Option<serde_json::Value> {
        let search_order = tier
            .map(|t| vec![t])
            .unwrap_or_else(|| vec![MemoryTier::Working, MemoryTier::Episodic, MemoryTier::Persistent]);

        for t in search_order {
            let now = Utc::now();
            let mut state = self.tier_state(t).write().await;
            let Some(entry) = state.entries.get_mut(key) else {
                continue;
            };
            if entry.is_expired(now) {
                state.entries.remove(key);
                continue;
            }
            entry.access_count += 1;
            entry.last_accessed = now;
            let value = entry.value.clone();
            let should_promote = t != MemoryTier::Persistent
                && self
                    .tier_config(t)
                    .promotion_threshold
                    .is_some_and(|threshold| scoring::promotion_score(entry, now) >= threshold);
            drop(state);

            if should_promote {
                self.promote(key, t).await;
            }
            return Some(value);
        }
        None
    }

    /// Search across tiers by filter (§4.4 Search), ranked by
    /// `0.7*importance + 0.3*normalize(accessCount)` descending.
    pub async fn search(&self, filter: SearchFilter) -> Vec<MemoryEntry> {
        let tiers = filter
            .tier
            .map(|t| vec![t])
            .unwrap_or_else(|| vec![MemoryTier::Working, MemoryTier::Episodic, MemoryTier::Persistent]);

        let mut results = Vec::new();
        let now = Utc::now();
        for t in tiers {
            let state = self.tier_state(t).read().await;
            for entry in state.entries.values() {
                if entry.is_expired(now) {
                    continue;
                }
                if let Some(cat) = filter.category {
                    if entry.category != cat {
                        continue;
                    }
                }
                if let Some(agent_id) = filter.agent_id {
                    if entry.agent_id != Some(agent_id) {
                        continue;
                    }
                }
                if !filter.tags.is_subset(&entry.tags) {
                    continue;
                }
                if let Some(min_importance) = filter.min_importance {
                    if entry.importance < min_importance {
                        continue;
                    }
                }
                results.push(entry.clone());
            }
        }

        results.sort_by(|a, b| {
            let score_a = 0.7 * a.importance + 0.3 * (a.access_count as f64 / 10.0).min(1.0);
            let score_b = 0.7 * b.importance + 0.3 * (b.access_count as f64 / 10.0).min(1.0);
            score_b.partial_cmp(&score_a).unwrap()
        });
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        results
    }

    /// Delete an entry (§4.4 Delete). When `tier` is omitted, deletes from
    /// every tier; returns whether anything was removed.
    pub async fn delete(&self, key: &str, tier: Option<MemoryTier>) -> bool {
        let tiers = tier
            .map(|t| vec![t])
            .unwrap_or_else(|| vec![MemoryTier::Working, MemoryTier::Episodic, MemoryTier::Persistent]);
        let mut removed_any = false;
        for t in tiers {
            let removed_id = {
                let mut state = self.tier_state(t).write().await;
                state.entries.remove(key).map(|e| e.id)
            };
            if let Some(id) = removed_id {
                removed_any = true;
                if t == MemoryTier::Persistent {
                    let _ = self.unpersist(id).await;
                }
            }
        }
        removed_any
    }

    /// Promote an entry to the next-higher tier (§4.4 Promote). Fails
    /// (returns `false`) for persistent-tier entries or missing keys.
    pub async fn promote(&self, key: &str, from_tier: MemoryTier) -> bool {
        let Some(to_tier) = Self::next_tier(from_tier) else {
            return false;
        };
        let Some(mut entry) = ({
            let mut state = self.tier_state(from_tier).write().await;
            state.entries.remove(key)
        }) else {
            return false;
        };
        entry.importance = (entry.importance * 1.2).min(1.0);
        entry.tier = to_tier;
        debug!(key, from = ?from_tier, to = ?to_tier, "promoting memory entry");

        let mut to_state = self.tier_state(to_tier).write().await;
        to_state.entries.insert(key.to_string(), entry.clone());
        drop(to_state);

        if to_tier == MemoryTier::Persistent {
            let _ = self.persist(&entry).await;
        }
        true
    }

    /// Demote an entry to the next-lower tier, or delete it outright if
    /// demoted from working (§4.4 Demote). Refuses pinned entries.
    pub async fn demote(&self, key: &str, from_tier: MemoryTier) -> bool {
        let is_pinned = {
            let state = self.tier_state(from_tier).read().await;
            match state.entries.get(key) {
                Some(e) => e.pinned,
                None => return false,
            }
        };
        if is_pinned {
            return false;
        }

        if from_tier == MemoryTier::Working {
            let mut state = self.tier_state(from_tier).write().await;
            return state.entries.remove(key).is_some();
        }

        let Some(to_tier) = Self::prev_tier(from_tier) else {
            return false;
        };
        let Some(mut entry) = ({
            let mut state = self.tier_state(from_tier).write().await;
            state.entries.remove(key)
        }) else {
            return false;
        };
        if from_tier == MemoryTier::Persistent {
            let _ = self.unpersist(entry.id).await;
        }
        entry.importance *= 0.8;
        entry.tier = to_tier;
        debug!(key, from = ?from_tier, to = ?to_tier, "demoting memory entry");
        let mut to_state = self.tier_state(to_tier).write().await;
        to_state.entries.insert(key.to_string(), entry);
        true
    }

    /// Clear one tier, or every tier when `tier` is `None`; persistent-tier
    /// clears also remove the on-disk artifacts.
    pub async fn clear(&self, tier: Option<MemoryTier>) {
        let tiers = tier
            .map(|t| vec![t])
            .unwrap_or_else(|| vec![MemoryTier::Working, MemoryTier::Episodic, MemoryTier::Persistent]);
        for t in tiers {
            let ids: Vec<EntityId> = {
                let mut state = self.tier_state(t).write().await;
                let ids = state.entries.values().map(|e| e.id).collect();
                state.entries.clear();
                ids
            };
            if t == MemoryTier::Persistent {
                for id in ids {
                    let _ = self.unpersist(id).await;
                }
            }
        }
    }

    async fn tier_stats(&self, tier: MemoryTier) -> TierStats {
        let state = self.tier_state(tier).read().await;
        let count = state.entries.len();
        if count == 0 {
            return TierStats::default();
        }
        let mut size_bytes = 0usize;
        let mut sum_importance = 0.0;
        let mut sum_access = 0.0;
        let mut oldest = None;
        let mut newest = None;
        for entry in state.entries.values() {
            size_bytes += serde_json::to_vec(entry).map(|v| v.len()).unwrap_or(0);
            sum_importance += entry.importance;
            sum_access += entry.access_count as f64;
            oldest = Some(oldest.map_or(entry.created_at, |o: DateTime<Utc>| o.min(entry.created_at)));
            newest = Some(newest.map_or(entry.created_at, |n: DateTime<Utc>| n.max(entry.created_at)));
        }
        TierStats {
            count,
            size_bytes,
            avg_importance: sum_importance / count as f64,
            avg_access_count: sum_access / count as f64,
            oldest,
            newest,
        }
    }

    /// Per-tier statistics plus a combined total row (§4.4 Stats).
    pub async fn stats(&self) -> MemoryStats {
        let working = self.tier_stats(MemoryTier::Working).await;
        let episodic = self.tier_stats(MemoryTier::Episodic).await;
        let persistent = self.tier_stats(MemoryTier::Persistent).await;

        let count = working.count + episodic.count + persistent.count;
        let total = if count == 0 {
            TierStats::default()
        } else {
            TierStats {
                count,
                size_bytes: working.size_bytes + episodic.size_bytes + persistent.size_bytes,
                avg_importance: (working.avg_importance * working.count as f64
                    + episodic.avg_importance * episodic.count as f64
                    + persistent.avg_importance * persistent.count as f64)
                    / count as f64,
                avg_access_count: (working.avg_access_count * working.count as f64
                    + episodic.avg_access_count * episodic.count as f64
                    + persistent.avg_access_count * persistent.count as f64)
                    / count as f64,
                oldest: [working.oldest, episodic.oldest, persistent.oldest]
                    .into_iter()
                    .flatten()
                    .min(),
                newest: [working.newest, episodic.newest, persistent.newest]
                    .into_iter()
                    .flatten()
                    .max(),
            }
        };

        MemoryStats {
            working,
            episodic,
            persistent,
            total,
        }
    }

    /// One cooperative maintenance pass (§4.4 Maintenance loop): expires,
    /// auto-promotes, and auto-demotes/deletes non-pinned entries.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();
        for tier in [MemoryTier::Working, MemoryTier::Episodic, MemoryTier::Persistent] {
            self.maintain_tier(tier, &mut report).await;
        }
        report
    }

    async fn maintain_tier(&self, tier: MemoryTier, report: &mut MaintenanceReport) {
        let now = Utc::now();
        let cfg = *self.tier_config(tier);

        let candidates: Vec<(String, bool, bool)> = {
            let state = self.tier_state(tier).read().await;
            state
                .entries
                .values()
                .filter(|e| !e.pinned)
                .map(|e| {
                    if e.is_expired(now) {
                        return (e.key.clone(), true, false);
                    }
                    let promote = cfg
                        .promotion_threshold
                        .is_some_and(|t| scoring::promotion_score(e, now) >= t);
                    // `demotion_score` runs high for stale/low-value entries (see
                    // scoring.rs); the config's `demotion_threshold` is spec.md's
                    // literal "score <= threshold" cutoff on the *complementary*
                    // scale, so the trigger here is the mirror image: >= (1 - threshold).
                    let demote = !promote
                        && scoring::demotion_score(e, now) >= 1.0 - cfg.demotion_threshold;
                    (e.key.clone(), false, promote || demote)
                })
                .collect()
        };

        for (key, expired, actionable) in candidates {
            if expired {
                if self.delete(&key, Some(tier)).await {
                    report.expired_removed += 1;
                }
                continue;
            }
            if !actionable {
                continue;
            }
            let should_promote = {
                let state = self.tier_state(tier).read().await;
                match state.entries.get(&key) {
                    Some(e) => cfg
                        .promotion_threshold
                        .is_some_and(|t| scoring::promotion_score(e, now) >= t),
                    None => continue,
                }
            };
            if should_promote {
                if self.promote(&key, tier).await {
                    report.auto_promoted += 1;
                }
            } else if tier == MemoryTier::Working {
                if self.demote(&key, tier).await {
                    report.auto_deleted += 1;
                }
            } else if self.demote(&key, tier).await {
                report.auto_demoted += 1;
            }
        }
    }

    /// Spawn a background task that runs [`TieredMemory::run_maintenance`]
    /// on a fixed interval, mirroring the session manager's auto-checkpoint
    /// timer. Intended to be awaited/aborted by the owning session.
    pub fn spawn_maintenance_loop(mem: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let report = mem.run_maintenance().await;
                debug!(?report, "memory maintenance pass complete");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_store::InMemoryStore;

    fn memory() -> TieredMemory {
        TieredMemory::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips_value() {
        let mem = memory();
        mem.store(StoreParams {
            key: "k".into(),
            value: serde_json::json!({"x": 1}),
            ..Default::default()
        })
        .await
        .unwrap();

        let value = mem.retrieve("k", None).await.unwrap();
        assert_eq!(value["x"], 1);
    }

    #[tokio::test]
    async fn repeated_retrieval_promotes_out_of_working_tier() {
        let mem = memory();
        mem.store(StoreParams {
            key: "k".into(),
            value: serde_json::json!(1),
            importance: Some(0.9),
            tier: Some(MemoryTier::Working),
            ..Default::default()
        })
        .await
        .unwrap();

        for _ in 0..3 {
            mem.retrieve("k", None).await;
        }

        assert!(mem.retrieve("k", Some(MemoryTier::Working)).await.is_none());
        assert!(
            mem.retrieve("k", Some(MemoryTier::Episodic)).await.is_some()
                || mem.retrieve("k", Some(MemoryTier::Persistent)).await.is_some()
        );
    }

    #[tokio::test]
    async fn pinned_entries_survive_low_scores() {
        let mem = memory();
        mem.store(StoreParams {
            key: "k".into(),
            value: serde_json::json!(1),
            importance: Some(0.01),
            is_pinned: true,
            ..Default::default()
        })
        .await
        .unwrap();

        let report = mem.run_maintenance().await;
        assert_eq!(report.auto_deleted, 0);
        assert!(mem.retrieve("k", Some(MemoryTier::Working)).await.is_some());
    }

    #[tokio::test]
    async fn freshly_stored_low_importance_entry_survives_one_pass() {
        // recencyBoost = 1 right after Store, which keeps demotion_score below
        // the trigger regardless of importance — demotion is a function of
        // staleness accumulating over time, not of importance alone.
        let mem = memory();
        mem.store(StoreParams {
            key: "k".into(),
            value: serde_json::json!(1),
            importance: Some(0.0),
            ..Default::default()
        })
        .await
        .unwrap();

        let report = mem.run_maintenance().await;
        assert_eq!(report.auto_deleted, 0);
        assert!(mem.retrieve("k", Some(MemoryTier::Working)).await.is_some());
    }

    #[tokio::test]
    async fn eviction_makes_room_when_tier_is_full() {
        let mem = TieredMemory::with_config(
            Arc::new(InMemoryStore::new()),
            MemoryConfig {
                working: TierConfig {
                    max_entries: Some(1),
                    ..MemoryConfig::default().working
                },
                ..MemoryConfig::default()
            },
        );
        mem.store(StoreParams {
            key: "first".into(),
            value: serde_json::json!(1),
            importance: Some(0.1),
            ..Default::default()
        })
        .await
        .unwrap();
        mem.store(StoreParams {
            key: "second".into(),
            value: serde_json::json!(2),
            importance: Some(0.9),
            ..Default::default()
        })
        .await
        .unwrap();

        assert!(mem.retrieve("first", Some(MemoryTier::Working)).await.is_none());
        assert!(mem.retrieve("second", Some(MemoryTier::Working)).await.is_some());
    }

    #[tokio::test]
    async fn delete_without_tier_removes_from_all_tiers() {
        let mem = memory();
        mem.store(StoreParams {
            key: "k".into(),
            value: serde_json::json!(1),
            ..Default::default()
        })
        .await
        .unwrap();
        mem.promote("k", MemoryTier::Working).await;

        assert!(mem.delete("k", None).await);
        assert!(mem.retrieve("k", None).await.is_none());
    }

    #[tokio::test]
    async fn demote_from_working_deletes_outright() {
        let mem = memory();
        mem.store(StoreParams {
            key: "k".into(),
            value: serde_json::json!(1),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(mem.demote("k", MemoryTier::Working).await);
        assert!(mem.retrieve("k", None).await.is_none());
    }

    #[tokio::test]
    async fn search_orders_by_importance_and_access_count() {
        let mem = memory();
        mem.store(StoreParams {
            key: "low".into(),
            value: serde_json::json!(1),
            importance: Some(0.2),
            ..Default::default()
        })
        .await
        .unwrap();
        mem.store(StoreParams {
            key: "high".into(),
            value: serde_json::json!(2),
            importance: Some(0.9),
            ..Default::default()
        })
        .await
        .unwrap();

        let results = mem.search(SearchFilter::default()).await;
        assert_eq!(results[0].key, "high");
    }
}
