#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-types** – Shared data model for the agent swarm orchestration runtime.
//!
//! This crate defines the types that flow between every other crate in the
//! workspace: agents, tasks, messages, memory entries, and the closed set of
//! error codes the runtime surfaces to callers. It intentionally carries no
//! behavior — `swarm-pool`, `swarm-topology`, `swarm-memory`, `swarm-llm`, and
//! `swarm-session` each own the logic that operates on these types.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::SwarmError;

/// Unique identifier for any entity in the swarm (agent, task, message, session, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//─────────────────────────────
//  Agents
//─────────────────────────────

/// The closed set of symbolic agent types (§3 Data Model, Agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    /// System design and requirements analysis.
    Architect,
    /// Code review and standards enforcement.
    Review,
    /// Implementation and refactoring.
    Implementation,
    /// Unit/integration/regression testing.
    Testing,
    /// Research and information gathering.
    Research,
    /// Documentation authoring.
    Documentation,
    /// Error analysis and root-cause investigation.
    Debugger,
}

impl AgentType {
    /// Default capability set for this agent type (§6 Agent-type capability defaults).
    pub fn default_capabilities(&self) -> HashSet<String> {
        let caps: &[&str] = match self {
            AgentType::Research => &["web-search", "data-analysis", "summarization"],
            AgentType::Architect => &[
                "system-design",
                "pattern-recognition",
                "requirements-analysis",
            ],
            AgentType::Implementation => &["coding", "refactoring", "api-design"],
            AgentType::Testing => &[
                "unit-testing",
                "integration-testing",
                "regression-testing",
            ],
            AgentType::Review => &[
                "code-review",
                "quality-analysis",
                "standards-enforcement",
            ],
            AgentType::Documentation => &["api-docs", "user-guides", "changelogs"],
            AgentType::Debugger => &["error-analysis", "stack-tracing", "root-cause"],
        };
        caps.iter().map(|s| s.to_string()).collect()
    }

    /// Default resource limits for this agent type (§4.3 "resource limits
    /// derived from the agent type"). Documentation and review agents read
    /// and critique rather than execute, so they get a lighter tier;
    /// architect and research agents carry larger contexts and make
    /// outbound calls, so they get a heavier one; the rest use the
    /// baseline [`ResourceLimits::default`].
    pub fn default_resource_limits(&self) -> ResourceLimits {
        match self {
            AgentType::Documentation | AgentType::Review => ResourceLimits {
                max_memory_bytes: 256 * 1024 * 1024,
                max_cpu_time_ms: 30_000,
                max_disk_bytes: 512 * 1024 * 1024,
                max_network_calls: 20,
                max_file_handles: 32,
                execution_timeout_ms: 120_000,
            },
            AgentType::Architect | AgentType::Research => ResourceLimits {
                max_memory_bytes: 1024 * 1024 * 1024,
                max_cpu_time_ms: 120_000,
                max_disk_bytes: 1024 * 1024 * 1024,
                max_network_calls: 200,
                max_file_handles: 64,
                execution_timeout_ms: 600_000,
            },
            AgentType::Implementation | AgentType::Testing | AgentType::Debugger => {
                ResourceLimits::default()
            }
        }
    }
}

/// Agent lifecycle status (§3 Data Model, Agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent record created but not yet accepting tasks.
    Initializing,
    /// Agent has no in-flight tasks and can accept more.
    Idle,
    /// Agent has at least one in-flight task.
    Busy,
    /// Agent encountered an unrecoverable error.
    Error,
    /// Agent has been permanently removed from service.
    Terminated,
}

/// Resource limits declared for an agent (§3, §6 Agent-type capability defaults).
///
/// Values are numeric (bytes, milliseconds, counts); human-readable strings
/// such as `"100MB"` or `"5m"` are parsed into this record at the pool
/// boundary (see `swarm-pool::resource`), never carried past it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum resident memory, in bytes.
    pub max_memory_bytes: u64,
    /// Maximum cumulative CPU time, in milliseconds.
    pub max_cpu_time_ms: u64,
    /// Maximum disk usage, in bytes.
    pub max_disk_bytes: u64,
    /// Maximum network calls per task.
    pub max_network_calls: u32,
    /// Maximum simultaneously open file handles.
    pub max_file_handles: u32,
    /// Maximum wall-clock execution time for one task, in milliseconds.
    pub execution_timeout_ms: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 512 * 1024 * 1024,
            max_cpu_time_ms: 60_000,
            max_disk_bytes: 1024 * 1024 * 1024,
            max_network_calls: 100,
            max_file_handles: 64,
            execution_timeout_ms: 300_000,
        }
    }
}

/// Historical performance record for one task type executed by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// The task type this record summarizes.
    pub task_type: String,
    /// Fraction of attempts that succeeded, in `[0, 1]`.
    pub success_rate: f64,
    /// Average execution time, in milliseconds.
    pub average_execution_time_ms: f64,
    /// Average quality score across completed tasks, in `[0, 1]`.
    pub quality_score: f64,
    /// Number of samples this average is derived from.
    pub sample_count: u64,
}

impl PerformanceMetric {
    /// A fresh, empty record for a task type with no history.
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            success_rate: 0.0,
            average_execution_time_ms: 0.0,
            quality_score: 0.0,
            sample_count: 0,
        }
    }

    /// Fold in one more completed-task observation.
    pub fn record(&mut self, success: bool, execution_time_ms: f64, quality_score: f64) {
        let n = self.sample_count as f64;
        let success_val = if success { 1.0 } else { 0.0 };
        self.success_rate = (self.success_rate * n + success_val) / (n + 1.0);
        self.average_execution_time_ms =
            (self.average_execution_time_ms * n + execution_time_ms) / (n + 1.0);
        self.quality_score = (self.quality_score * n + quality_score) / (n + 1.0);
        self.sample_count += 1;
    }
}

/// Opaque learning data the core persists but never interprets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningData {
    /// Success/failure pattern observations, opaque to the core.
    pub patterns: Vec<serde_json::Value>,
    /// Skills the agent has learned, opaque to the core.
    pub learned_skills: Vec<String>,
}

/// A long-lived actor with a fixed type and capability set (§3 Data Model, Agent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: EntityId,
    /// Symbolic type, drawn from the closed [`AgentType`] set.
    pub agent_type: AgentType,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Declared capabilities.
    pub capabilities: HashSet<String>,
    /// Maximum number of tasks this agent may run concurrently.
    pub max_concurrent_tasks: usize,
    /// Declared resource limits.
    pub resource_limits: ResourceLimits,
    /// Performance history, keyed implicitly by `task_type` within the vec.
    pub performance_metrics: Vec<PerformanceMetric>,
    /// In-flight task identifiers, in assignment order.
    pub current_tasks: Vec<EntityId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-active timestamp; monotonically non-decreasing per agent.
    pub last_active: DateTime<Utc>,
    /// Opaque learning data.
    pub learning_data: LearningData,
}

impl Agent {
    /// Construct a new agent of `agent_type` with its type's default
    /// capabilities and resource limits.
    pub fn new(agent_type: AgentType, max_concurrent_tasks: usize) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            agent_type,
            status: AgentStatus::Initializing,
            capabilities: agent_type.default_capabilities(),
            max_concurrent_tasks,
            resource_limits: agent_type.default_resource_limits(),
            performance_metrics: Vec::new(),
            current_tasks: Vec::new(),
            created_at: now,
            last_active: now,
            learning_data: LearningData::default(),
        }
    }

    /// Whether the agent has spare capacity for another task.
    pub fn has_capacity(&self) -> bool {
        self.current_tasks.len() < self.max_concurrent_tasks
    }

    /// Performance metric for `task_type`, if any history exists.
    pub fn metric_for(&self, task_type: &str) -> Option<&PerformanceMetric> {
        self.performance_metrics
            .iter()
            .find(|m| m.task_type == task_type)
    }

    /// Touch `last_active`, enforcing monotonicity.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_active {
            self.last_active = now;
        }
    }
}

//─────────────────────────────
//  Tasks
//─────────────────────────────

/// Task lifecycle status (§3 Data Model, Task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Currently executing on exactly one agent.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Withdrawn before completion.
    Cancelled,
}

/// A unit of work routed to exactly one agent at a time (§3 Data Model, Task).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: EntityId,
    /// Symbolic task type (matched against agent types by the topology/pool).
    pub task_type: String,
    /// Free-form description.
    pub description: String,
    /// Priority; higher is more urgent.
    pub priority: i32,
    /// Current status.
    pub status: TaskStatus,
    /// Other task IDs this task depends on.
    pub dependencies: HashSet<EntityId>,
    /// Measured execution time, once known.
    pub execution_time_ms: Option<u64>,
    /// Error message, if the task failed.
    pub error_message: Option<String>,
    /// Quality score assigned on completion, in `[0, 1]`.
    pub quality_score: Option<f64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start timestamp, once dispatched.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp, once finished (successfully or not).
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Construct a new pending task.
    pub fn new(task_type: impl Into<String>, description: impl Into<String>, priority: i32) -> Self {
        Self {
            id: EntityId::new(),
            task_type: task_type.into(),
            description: description.into(),
            priority,
            status: TaskStatus::Pending,
            dependencies: HashSet::new(),
            execution_time_ms: None,
            error_message: None,
            quality_score: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

//─────────────────────────────
//  Messages
//─────────────────────────────

/// Message type (§3 Data Model, Message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Delegates a task from one agent/coordinator to another.
    TaskDelegation,
    /// General coordination chatter.
    Coordination,
    /// Status/progress update.
    StatusUpdate,
    /// Shares learned knowledge between agents.
    KnowledgeShare,
    /// Reports an error condition.
    Error,
}

/// A routed message between agents, or a broadcast when `recipient` is `None`
/// (§3 Data Model, Message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: EntityId,
    /// Sending agent.
    pub sender: EntityId,
    /// Recipient agent; `None` means broadcast.
    pub recipient: Option<EntityId>,
    /// Message type.
    pub message_type: MessageType,
    /// Priority, `0` (lowest) to `4` (highest).
    pub priority: u8,
    /// Send timestamp.
    pub timestamp: DateTime<Utc>,
    /// Correlation identifier linking related messages (e.g. request/response).
    pub correlation_id: EntityId,
    /// Opaque payload.
    pub content: serde_json::Value,
    /// Optional delivery timeout, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Number of delivery retries attempted so far.
    pub retry_count: u32,
    /// Maximum retries before the message is abandoned.
    pub max_retries: u32,
    /// Whether the sender expects a response.
    pub requires_response: bool,
}

impl Message {
    /// Construct a new message with default retry/timeout settings.
    pub fn new(
        sender: EntityId,
        recipient: Option<EntityId>,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: EntityId::new(),
            sender,
            recipient,
            message_type,
            priority: 2,
            timestamp: Utc::now(),
            correlation_id: EntityId::new(),
            content,
            timeout_ms: None,
            retry_count: 0,
            max_retries: 3,
            requires_response: false,
        }
    }

    /// Whether this message is a broadcast (no single recipient).
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}

//─────────────────────────────
//  Memory entries
//─────────────────────────────

/// Memory tier (§3 Data Model, Memory Entry; §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Small, hot, short-TTL tier.
    Working,
    /// Medium, warm, day-scale TTL tier.
    Episodic,
    /// Unbounded, durable, no TTL tier.
    Persistent,
}

/// Memory entry category (§3 Data Model, Memory Entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    /// Task-related context or results.
    Task,
    /// General contextual information.
    Context,
    /// Learning/training signal.
    Learning,
    /// Durable knowledge.
    Knowledge,
    /// Anything not covered above.
    Other,
}

/// A single entry in the tiered memory cache (§3 Data Model, Memory Entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier.
    pub id: EntityId,
    /// Key, unique within its tier (the same key may exist in multiple tiers).
    pub key: String,
    /// Opaque value.
    pub value: serde_json::Value,
    /// Owning tier.
    pub tier: MemoryTier,
    /// Category.
    pub category: MemoryCategory,
    /// Importance, in `[0, 1]`.
    pub importance: f64,
    /// Decay rate, in `[0, 1]`.
    pub decay_rate: f64,
    /// Number of times this entry has been retrieved.
    pub access_count: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last access timestamp.
    pub last_accessed: DateTime<Utc>,
    /// Optional expiration timestamp.
    pub expires_at: Option<DateTime<Utc>>,
    /// Pinned entries are never evicted, expired, or auto-demoted.
    pub pinned: bool,
    /// Owning agent, if any.
    pub agent_id: Option<EntityId>,
    /// Free-form tags.
    pub tags: HashSet<String>,
}

impl MemoryEntry {
    /// Whether this entry is expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.pinned && self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

pub use error::ErrorCode;
