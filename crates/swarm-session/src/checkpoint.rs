//! Checkpoint snapshots and the on-disk artifact format (§3 Checkpoint, §6
//! Checkpoint artifact format).
//!
//! A checkpoint is a deep, self-contained snapshot of a session's mutable
//! state sufficient to reconstruct it without consulting any earlier
//! checkpoint. [`CurrentState`] is that snapshot; [`Checkpoint`] wraps it
//! with an identifier, reason, and timestamp; [`CheckpointArtifact`] is the
//! whole-session document persisted under `<storageRoot>/<sessionId>.json`
//! (§6), of which the checkpoint list is one field.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use swarm_types::{Agent, EntityId, Task};

use crate::config::SessionConfig;
use crate::SessionStatus;

/// Encode a timestamp in the normalized string form §6 requires: fixed
/// millisecond precision, UTC, RFC 3339 — lexicographic comparison on this
/// encoding agrees with chronological order.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a timestamp produced by [`encode_timestamp`].
pub fn decode_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// The session's deep, reconstructible state at one instant (§3 Session
/// "current state snapshot"; §6 `currentState`).
///
/// Map-valued fields (`activeAgents`, `workingMemory`) are carried as
/// ordered `Vec` of pairs rather than `HashMap`, which both preserves
/// insertion order and satisfies §6's "serialized as ordered arrays of
/// `[key, value]` pairs" requirement without a custom (de)serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Every agent currently bound to the session, keyed by ID.
    pub active_agents: Vec<(EntityId, Agent)>,
    /// Tasks currently running or pending (not yet completed/failed/cancelled).
    pub active_tasks: Vec<Task>,
    /// Tasks waiting for a worker, in FIFO arrival order.
    pub task_queue: Vec<Task>,
    /// IDs of tasks that reached `completed`.
    pub completed_tasks: Vec<EntityId>,
    /// IDs of tasks that reached `failed`.
    pub failed_tasks: Vec<EntityId>,
    /// Lightweight key/value overlay distinct from the full tiered memory
    /// cache (`swarm_memory::TieredMemory`), carried directly in the
    /// checkpoint for quick restore without replaying tier maintenance.
    pub working_memory: Vec<(String, serde_json::Value)>,
    /// Arbitrary shared state visible to every agent in the session.
    pub shared_context: HashMap<String, serde_json::Value>,
    /// Opaque topology-variant configuration (layer count, coordinator id, ...).
    pub topology_config: serde_json::Value,
    /// Planned next steps, opaque to the core.
    pub next_actions: Vec<String>,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self {
            active_agents: Vec::new(),
            active_tasks: Vec::new(),
            task_queue: Vec::new(),
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            working_memory: Vec::new(),
            shared_context: HashMap::new(),
            topology_config: serde_json::Value::Null,
            next_actions: Vec::new(),
        }
    }
}

/// A self-contained snapshot sufficient to reconstruct a session (§3 Checkpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier.
    pub id: EntityId,
    /// The session this checkpoint belongs to.
    pub session_id: EntityId,
    /// When the checkpoint was taken.
    pub timestamp: DateTime<Utc>,
    /// Why it was taken (`"manual"`, `"auto"`, `"pause"`, `"terminate: ..."`, ...).
    pub reason: String,
    /// The deep state snapshot.
    pub snapshot: CurrentState,
    /// Caller-supplied metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Checkpoint {
    /// Construct a new checkpoint over `snapshot`.
    pub fn new(
        session_id: EntityId,
        reason: impl Into<String>,
        snapshot: CurrentState,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            session_id,
            timestamp: Utc::now(),
            reason: reason.into(),
            snapshot,
            metadata,
        }
    }
}

/// The whole-session document persisted under `<storageRoot>/<sessionId>.json`
/// (§6 Checkpoint artifact format). Every field here must be present in the
/// serialized document; `completed_at` is the only optional one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointArtifact {
    /// Session identifier.
    pub id: EntityId,
    /// Owning project identifier.
    pub project_id: String,
    /// Human-readable session name.
    pub name: String,
    /// Chosen topology variant name.
    pub topology: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Every agent bound to the session (ordered pairs, per `CurrentState`).
    pub agents: Vec<(EntityId, Agent)>,
    /// The live state snapshot at write time.
    pub current_state: CurrentState,
    /// The session's retained checkpoint history.
    pub checkpoints: Vec<Checkpoint>,
    /// Count of tasks that have reached `completed`.
    pub tasks_completed: u64,
    /// Count of tasks ever added to the session.
    pub tasks_total: u64,
    /// Normalized start timestamp.
    pub started_at: String,
    /// Normalized last-active timestamp.
    pub last_active_at: String,
    /// Normalized completion timestamp, once terminated.
    pub completed_at: Option<String>,
    /// Session configuration.
    pub config: SessionConfig,
    /// Caller-supplied session metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips() {
        let now = Utc::now();
        let encoded = encode_timestamp(now);
        let decoded = decode_timestamp(&encoded).unwrap();
        assert_eq!(decoded.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn timestamp_encoding_preserves_lexicographic_order() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(5);
        let a = encode_timestamp(earlier);
        let b = encode_timestamp(later);
        assert!(a < b);
    }

    #[test]
    fn current_state_defaults_are_empty() {
        let state = CurrentState::default();
        assert!(state.active_agents.is_empty());
        assert!(state.shared_context.is_empty());
        assert_eq!(state.topology_config, serde_json::Value::Null);
    }
}
