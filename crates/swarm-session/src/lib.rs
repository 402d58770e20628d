#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-session** – C6, the Session Manager (§4.1).
//!
//! A [`Session`] binds a [`swarm_topology::AnyTopology`], a
//! [`swarm_memory::TieredMemory`], a set of [`swarm_pool::Pool`]s, and
//! (optionally) a process-wide [`swarm_llm::LlmRouter`] into one unit of
//! isolation, the way `toka-orchestration::OrchestrationEngine` binds an
//! agent registry, a runtime manager, and a kernel handle into one running
//! orchestration (`toka-orchestration/src/lib.rs`). [`SessionManager`] owns
//! every session's lifetime: creation, checkpointing, pause/resume, and
//! termination, guaranteeing a session can always be rebuilt from its most
//! recent checkpoint on the persistence layer (§4.1).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use swarm_llm::LlmRouter;
use swarm_memory::{MemoryConfig, TieredMemory};
use swarm_pool::{Assignment, Pool, PoolConfig, PoolError};
use swarm_store::ObjectStore;
use swarm_topology::{
    AgentView, AnyTopology, Hierarchical, Mesh, Star, Topology, TopologyKind,
};
use swarm_types::{Agent, AgentType, EntityId, ErrorCode, SwarmError, Task, TaskStatus};

pub mod checkpoint;
pub mod config;

pub use checkpoint::{decode_timestamp, encode_timestamp, Checkpoint, CheckpointArtifact, CurrentState};
pub use config::{SessionConfig, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_MAX_CHECKPOINTS};

/// Session lifecycle status (§3 Data Model, Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session record created, not yet accepting dispatch.
    Initializing,
    /// Accepting agents, tasks, and checkpoints.
    Active,
    /// Suspended; refuses dispatch, auto-checkpoint timer cancelled.
    Paused,
    /// A checkpoint is currently being built (transient; §4.1 CreateCheckpoint).
    Checkpointing,
    /// Permanently shut down; queryable, refuses all mutation but deletion.
    Terminated,
    /// Encountered an unrecoverable error.
    Error,
}

/// Conjunctive filter for [`SessionManager::list_sessions`] (§4.1 ListSessions).
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Restrict to sessions of this project.
    pub project_id: Option<String>,
    /// Restrict to sessions with this status.
    pub status: Option<SessionStatus>,
    /// Restrict to sessions using this topology kind.
    pub topology_kind: Option<TopologyKind>,
}

impl SessionFilter {
    fn matches(&self, session: &Session) -> bool {
        self.project_id
            .as_ref()
            .map(|p| *p == session.project_id)
            .unwrap_or(true)
            && self.status.map(|s| s == session.status).unwrap_or(true)
            && self
                .topology_kind
                .map(|k| k == session.topology_kind)
                .unwrap_or(true)
    }
}

/// Priority order agent types warm up in at session startup: architects and
/// reviewers first, then implementation/testing/research/documentation, and
/// finally debuggers — the same critical→foundation→parallel-development
/// wave ordering `OrchestrationEngine::run_orchestration` sequences its
/// phases in, adapted to spec.md's agent-type set (SPEC_FULL.md
/// "Structured orchestration phases").
pub fn agent_type_priority(agent_type: AgentType) -> u8 {
    match agent_type {
        AgentType::Architect => 0,
        AgentType::Review => 1,
        AgentType::Implementation | AgentType::Testing | AgentType::Research => 2,
        AgentType::Documentation => 3,
        AgentType::Debugger => 4,
    }
}

fn agent_view(agent: &Agent) -> AgentView {
    AgentView {
        id: agent.id,
        agent_type: agent.agent_type,
        status: agent.status,
        load: agent.current_tasks.len(),
    }
}

/// Construct a fresh topology of `kind`, optionally seeded with `coordinator`
/// (only meaningful for `Star`).
fn new_topology(
    kind: TopologyKind,
    max_agents: usize,
    coordinator: Option<EntityId>,
) -> Result<AnyTopology, SwarmError> {
    match kind {
        TopologyKind::Hierarchical => Ok(AnyTopology::Hierarchical(Hierarchical::new(max_agents))),
        TopologyKind::Mesh => Ok(AnyTopology::Mesh(Mesh::new(max_agents))),
        TopologyKind::Star => {
            let star = Star::new(coordinator, max_agents)
                .map_err(|e| SwarmError::new(ErrorCode::InvalidConfig, e.to_string()))?;
            Ok(AnyTopology::Star(star))
        }
    }
}

/// Rebuild a topology deterministically from an ordered agent list (used on
/// `Resume`/load-from-disk, so the on-disk artifact never has to serialize a
/// topology's internal edge structure — see DESIGN.md "Checkpoint artifact
/// topology_config").
fn rebuild_topology(
    kind: TopologyKind,
    max_agents: usize,
    coordinator: Option<EntityId>,
    agents: &[(EntityId, Agent)],
) -> Result<AnyTopology, SwarmError> {
    if kind == TopologyKind::Star && agents.is_empty() {
        // No coordinator can be designated yet; mirror Session::new's deferred
        // construction rather than failing to rebuild an empty star session.
        return Ok(AnyTopology::Mesh(Mesh::new(0)));
    }
    let coordinator = coordinator.or_else(|| agents.first().map(|(id, _)| *id));
    let mut topology = new_topology(kind, max_agents, coordinator)?;
    for (id, agent) in agents {
        if Some(*id) == coordinator {
            continue;
        }
        topology
            .add_agent(agent_view(agent))
            .map_err(|e| SwarmError::new(ErrorCode::InvalidConfig, e.to_string()))?;
    }
    Ok(topology)
}

fn topology_config_json(kind: TopologyKind, topology: &AnyTopology) -> serde_json::Value {
    let coordinator = match (kind, topology) {
        (TopologyKind::Star, AnyTopology::Star(s)) => Some(s.coordinator_id()),
        (TopologyKind::Hierarchical, AnyTopology::Hierarchical(h)) => h.coordinator(),
        _ => None,
    };
    serde_json::json!({
        "kind": kind,
        "coordinator": coordinator,
    })
}

fn coordinator_from_config(value: &serde_json::Value) -> Option<EntityId> {
    value
        .get("coordinator")
        .cloned()
        .and_then(|v| serde_json::from_value::<Option<EntityId>>(v).ok())
        .flatten()
}

/// A bound session: a topology, a tiered memory cache, zero or more worker
/// pools, an optional shared LLM router, and the live task/agent bookkeeping
/// that [`CurrentState`] snapshots at checkpoint time (§3 Session).
pub struct Session {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning project.
    pub project_id: String,
    /// Human-readable name.
    pub name: String,
    /// Chosen topology variant.
    pub topology_kind: TopologyKind,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Session configuration.
    pub config: SessionConfig,
    topology: AnyTopology,
    /// Agents bound to the session, in insertion order (the order
    /// `CurrentState::active_agents` and `CheckpointArtifact::agents`
    /// preserve).
    agents: Vec<(EntityId, Agent)>,
    /// Tasks currently `running`.
    running_tasks: Vec<Task>,
    /// Tasks `pending`, awaiting a routable agent, in FIFO arrival order.
    pending_queue: VecDeque<Task>,
    completed_tasks: Vec<EntityId>,
    failed_tasks: Vec<EntityId>,
    working_memory: Vec<(String, serde_json::Value)>,
    shared_context: HashMap<String, serde_json::Value>,
    next_actions: Vec<String>,
    checkpoints: Vec<Checkpoint>,
    tasks_completed: u64,
    tasks_total: u64,
    started_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    metadata: HashMap<String, serde_json::Value>,
    /// Named worker pools bound to this session (C5, §4.3).
    pub pools: HashMap<String, Pool>,
    /// The session's tiered memory cache (C3, §4.4).
    pub memory: Arc<TieredMemory>,
    /// The process-wide LLM router, if this session is wired to one (C2, §4.5).
    pub router: Option<Arc<LlmRouter>>,
}

impl Session {
    fn new(
        project_id: String,
        name: String,
        topology_kind: TopologyKind,
        config: SessionConfig,
        metadata: HashMap<String, serde_json::Value>,
        store: Arc<dyn ObjectStore>,
        router: Option<Arc<LlmRouter>>,
    ) -> Result<Self, SwarmError> {
        let topology = match topology_kind {
            TopologyKind::Star => {
                // Deferred: constructed once the first agent (the coordinator) joins.
                AnyTopology::Mesh(Mesh::new(0))
            }
            other => new_topology(other, config.max_agents, None)?,
        };
        let now = Utc::now();
        Ok(Self {
            id: EntityId::new(),
            project_id,
            name,
            topology_kind,
            status: SessionStatus::Initializing,
            config,
            topology,
            agents: Vec::new(),
            running_tasks: Vec::new(),
            pending_queue: VecDeque::new(),
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            working_memory: Vec::new(),
            shared_context: HashMap::new(),
            next_actions: Vec::new(),
            checkpoints: Vec::new(),
            tasks_completed: 0,
            tasks_total: 0,
            started_at: now,
            last_active_at: now,
            completed_at: None,
            metadata,
            pools: HashMap::new(),
            memory: Arc::new(TieredMemory::with_config(store, MemoryConfig::default())),
            router,
        })
    }

    fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_active_at {
            self.last_active_at = now;
        }
    }

    fn ensure_mutable(&self) -> Result<(), SwarmError> {
        if self.status == SessionStatus::Terminated {
            return Err(SwarmError::new(
                ErrorCode::InvalidConfig,
                "session is terminated and refuses mutation",
            ));
        }
        Ok(())
    }

    fn agent_views(&self) -> Vec<AgentView> {
        self.agents.iter().map(|(_, a)| agent_view(a)).collect()
    }

    fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|(aid, _)| *aid == id).map(|(_, a)| a)
    }

    /// Add `agent` to the session (§4.1 AddAgent). Fails with
    /// `CAPACITY_EXCEEDED` once `|agents| = maxAgents`. The agent joins the
    /// topology; for a `star` session whose topology has not yet been
    /// constructed, the first agent added becomes the coordinator (§4.2
    /// Star variant: "requires a designated coordinator ID at construction").
    pub fn add_agent(&mut self, agent: Agent) -> Result<(), SwarmError> {
        self.ensure_mutable()?;
        if self.agents.len() >= self.config.max_agents {
            return Err(SwarmError::new(
                ErrorCode::CapacityExceeded,
                format!("session already holds {} agents", self.config.max_agents),
            ));
        }

        if self.topology_kind == TopologyKind::Star && self.agents.is_empty() {
            self.topology = new_topology(TopologyKind::Star, self.config.max_agents, Some(agent.id))?;
        } else {
            self.topology
                .add_agent(agent_view(&agent))
                .map_err(|e| SwarmError::new(ErrorCode::CapacityExceeded, e.to_string()))?;
        }

        self.agents.push((agent.id, agent));
        self.touch();
        Ok(())
    }

    /// Remove an agent from the session and its topology. Idempotent.
    pub fn remove_agent(&mut self, id: EntityId) {
        self.agents.retain(|(aid, _)| *aid != id);
        self.topology.remove_agent(id);
        self.touch();
    }

    /// Read-only view of one bound agent.
    pub fn agent(&self, id: EntityId) -> Option<&Agent> {
        self.agents.iter().find(|(aid, _)| *aid == id).map(|(_, a)| a)
    }

    /// Every agent bound to the session, in insertion order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().map(|(_, a)| a)
    }

    /// Add `task` to the session and, using the bound topology, attempt to
    /// route it to a matching agent immediately (§4.1 AddTask; §8 scenario
    /// 1). If no agent is currently routable the task is appended to the
    /// FIFO pending queue and drained opportunistically by
    /// [`Session::update_task_status`] completions.
    pub fn add_task(&mut self, mut task: Task) -> Result<(), SwarmError> {
        self.ensure_mutable()?;
        self.tasks_total += 1;
        task.status = TaskStatus::Pending;
        self.dispatch_or_queue(task);
        self.touch();
        Ok(())
    }

    fn dispatch_or_queue(&mut self, task: Task) {
        let views = self.agent_views();
        let mut task = task;
        match self.topology.route_task(&task.task_type, &views) {
            Ok(agent_id) => {
                task.status = TaskStatus::Running;
                task.started_at = Some(Utc::now());
                let task_id = task.id;
                if let Some(agent) = self.agent_mut(agent_id) {
                    agent.current_tasks.push(task_id);
                    agent.status = swarm_types::AgentStatus::Busy;
                    agent.touch();
                }
                debug!(task = %task_id, agent = %agent_id, "task routed");
                self.running_tasks.push(task);
            }
            Err(_) => {
                debug!(task = %task.id, "no routable agent; queueing task");
                self.pending_queue.push_back(task);
            }
        }
    }

    fn drain_pending_queue(&mut self) {
        while let Some(next) = self.pending_queue.pop_front() {
            let views = self.agent_views();
            if self.topology.route_task(&next.task_type, &views).is_err() {
                self.pending_queue.push_front(next);
                break;
            }
            self.dispatch_or_queue(next);
        }
    }

    /// Transition `task_id` to `new_status` (§4.1 UpdateTaskStatus).
    /// `completed`/`failed` free the owning agent and update the session's
    /// counters; `running` is a no-op past dispatch; `cancelled` frees the
    /// owning agent without affecting the completed/failed counters (§5
    /// Cancellation: "worker transitions back to idle with the underlying
    /// task marked cancelled"); any other transition only updates the task's
    /// own status field.
    pub fn update_task_status(
        &mut self,
        task_id: EntityId,
        new_status: TaskStatus,
    ) -> Result<(), SwarmError> {
        self.ensure_mutable()?;

        let position = self.running_tasks.iter().position(|t| t.id == task_id);
        let task = if let Some(pos) = position {
            self.running_tasks.remove(pos)
        } else if let Some(pos) = self.pending_queue.iter().position(|t| t.id == task_id) {
            self.pending_queue.remove(pos).expect("position was just found")
        } else {
            return Err(SwarmError::new(
                ErrorCode::NotFound,
                format!("task {task_id} not found in session"),
            ));
        };

        let mut task = task;
        task.status = new_status;

        match new_status {
            TaskStatus::Completed => {
                task.completed_at = Some(Utc::now());
                self.free_owning_agent(task_id);
                self.completed_tasks.push(task_id);
                self.tasks_completed += 1;
            }
            TaskStatus::Failed => {
                task.completed_at = Some(Utc::now());
                self.free_owning_agent(task_id);
                self.failed_tasks.push(task_id);
            }
            TaskStatus::Cancelled => {
                self.free_owning_agent(task_id);
            }
            TaskStatus::Running => {
                self.running_tasks.push(task);
            }
            TaskStatus::Pending => {
                self.pending_queue.push_back(task);
            }
        }

        self.touch();
        if matches!(new_status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled) {
            self.drain_pending_queue();
        }
        Ok(())
    }

    fn free_owning_agent(&mut self, task_id: EntityId) {
        for (_, agent) in self.agents.iter_mut() {
            if agent.current_tasks.iter().any(|t| *t == task_id) {
                agent.current_tasks.retain(|t| *t != task_id);
                if agent.current_tasks.is_empty() {
                    agent.status = swarm_types::AgentStatus::Idle;
                }
                agent.touch();
                break;
            }
        }
    }

    /// Create and bind a new worker pool (C5, §4.3) to this session.
    pub fn create_pool(&mut self, config: PoolConfig) -> &Pool {
        let name = config.name.clone();
        let pool = Pool::new(config);
        self.pools.insert(name.clone(), pool);
        self.pools.get(&name).expect("just inserted")
    }

    /// Distribute `task` through the named pool (§4.3 Task distribution).
    pub fn distribute_via_pool(&mut self, pool_name: &str, task: Task) -> Result<Assignment, SwarmError> {
        let pool = self.pools.get_mut(pool_name).ok_or_else(|| {
            SwarmError::new(ErrorCode::NotFound, format!("pool {pool_name} not found"))
        })?;
        pool.distribute(task).map_err(map_pool_error)
    }

    /// Current, reconstructible snapshot of session state (§3 Session
    /// "current state snapshot"; §6 `currentState`).
    pub fn current_state(&self) -> CurrentState {
        CurrentState {
            active_agents: self.agents.clone(),
            active_tasks: self.running_tasks.clone(),
            task_queue: self.pending_queue.iter().cloned().collect(),
            completed_tasks: self.completed_tasks.clone(),
            failed_tasks: self.failed_tasks.clone(),
            working_memory: self.working_memory.clone(),
            shared_context: self.shared_context.clone(),
            topology_config: topology_config_json(self.topology_kind, &self.topology),
            next_actions: self.next_actions.clone(),
        }
    }

    fn restore_state(&mut self, state: CurrentState) -> Result<(), SwarmError> {
        let coordinator = coordinator_from_config(&state.topology_config);
        self.topology = rebuild_topology(
            self.topology_kind,
            self.config.max_agents,
            coordinator,
            &state.active_agents,
        )?;
        self.agents = state.active_agents;
        self.running_tasks = state.active_tasks;
        self.pending_queue = state.task_queue.into_iter().collect();
        self.completed_tasks = state.completed_tasks;
        self.failed_tasks = state.failed_tasks;
        self.working_memory = state.working_memory;
        self.shared_context = state.shared_context;
        self.next_actions = state.next_actions;
        Ok(())
    }

    fn to_artifact(&self) -> CheckpointArtifact {
        CheckpointArtifact {
            id: self.id,
            project_id: self.project_id.clone(),
            name: self.name.clone(),
            topology: format!("{:?}", self.topology_kind).to_lowercase(),
            status: self.status,
            agents: self.agents.clone(),
            current_state: self.current_state(),
            checkpoints: self.checkpoints.clone(),
            tasks_completed: self.tasks_completed,
            tasks_total: self.tasks_total,
            started_at: encode_timestamp(self.started_at),
            last_active_at: encode_timestamp(self.last_active_at),
            completed_at: self.completed_at.map(encode_timestamp),
            config: self.config.clone(),
            metadata: self.metadata.clone(),
        }
    }

    fn from_artifact(artifact: CheckpointArtifact, store: Arc<dyn ObjectStore>) -> Result<Self, SwarmError> {
        let topology_kind = match artifact.topology.as_str() {
            "mesh" => TopologyKind::Mesh,
            "star" => TopologyKind::Star,
            _ => TopologyKind::Hierarchical,
        };
        let coordinator = coordinator_from_config(&artifact.current_state.topology_config);
        let topology = rebuild_topology(
            topology_kind,
            artifact.config.max_agents,
            coordinator,
            &artifact.current_state.active_agents,
        )?;
        let started_at = decode_timestamp(&artifact.started_at)
            .map_err(|e| SwarmError::new(ErrorCode::CheckpointFailed, e.to_string()))?;
        let last_active_at = decode_timestamp(&artifact.last_active_at)
            .map_err(|e| SwarmError::new(ErrorCode::CheckpointFailed, e.to_string()))?;
        let completed_at = artifact
            .completed_at
            .map(|s| decode_timestamp(&s))
            .transpose()
            .map_err(|e| SwarmError::new(ErrorCode::CheckpointFailed, e.to_string()))?;

        Ok(Self {
            id: artifact.id,
            project_id: artifact.project_id,
            name: artifact.name,
            topology_kind,
            status: artifact.status,
            config: artifact.config,
            topology,
            agents: artifact.current_state.active_agents,
            running_tasks: artifact.current_state.active_tasks,
            pending_queue: artifact.current_state.task_queue.into_iter().collect(),
            completed_tasks: artifact.current_state.completed_tasks,
            failed_tasks: artifact.current_state.failed_tasks,
            working_memory: artifact.current_state.working_memory,
            shared_context: artifact.current_state.shared_context,
            next_actions: artifact.current_state.next_actions,
            checkpoints: artifact.checkpoints,
            tasks_completed: artifact.tasks_completed,
            tasks_total: artifact.tasks_total,
            started_at,
            last_active_at,
            completed_at,
            metadata: artifact.metadata,
            pools: HashMap::new(),
            memory: Arc::new(TieredMemory::with_config(store, MemoryConfig::default())),
            router: None,
        })
    }
}

fn map_pool_error(err: PoolError) -> SwarmError {
    match err {
        PoolError::PoolInactive => SwarmError::new(ErrorCode::PoolInactive, err.to_string()),
        PoolError::NoWorkersAvailable => SwarmError::new(ErrorCode::NoWorkersAvailable, err.to_string()),
        PoolError::WorkerBusy(_) => SwarmError::new(ErrorCode::WorkerBusy, err.to_string()),
        PoolError::NotFound(_) => SwarmError::new(ErrorCode::NotFound, err.to_string()),
    }
}

fn storage_key(session_id: EntityId) -> String {
    format!("session:{session_id}")
}

/// Owns every session's lifetime and guarantees each can be reconstructed
/// from its most recent checkpoint (§4.1). Holding a session behind its own
/// `tokio::sync::Mutex` gives checkpoint creation the "at-most-one builds at
/// a time per session" serialization the spec requires for free: the lock is
/// held for the whole snapshot-and-persist sequence.
pub struct SessionManager {
    store: Arc<dyn ObjectStore>,
    router: Option<Arc<LlmRouter>>,
    sessions: RwLock<HashMap<EntityId, Arc<Mutex<Session>>>>,
    timers: Mutex<HashMap<EntityId, tokio::task::JoinHandle<()>>>,
}

impl SessionManager {
    /// Construct a manager backed by `store`, optionally wired to a
    /// process-wide LLM router shared by every session it creates.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            router: None,
            sessions: RwLock::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a shared, process-wide LLM router (§4.5, §9 "the LLM Router's
    /// health cache and provider registry are the only process-wide mutable
    /// state"); subsequently created sessions receive a clone of this `Arc`.
    pub fn with_router(mut self, router: Arc<LlmRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Create a new session (§4.1 CreateSession). Fails with
    /// `INVALID_CONFIG` if `config.max_agents == 0`.
    pub async fn create_session(
        &self,
        project_id: impl Into<String>,
        name: impl Into<String>,
        topology_kind: TopologyKind,
        config: SessionConfig,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<EntityId, SwarmError> {
        if !config.is_valid() {
            return Err(SwarmError::new(
                ErrorCode::InvalidConfig,
                "max_agents must be > 0",
            ));
        }

        let mut session = Session::new(
            project_id.into(),
            name.into(),
            topology_kind,
            config.clone(),
            metadata,
            self.store.clone(),
            self.router.clone(),
        )?;
        session.status = SessionStatus::Active;
        let id = session.id;

        if config.persist_to_disk {
            let artifact = session.to_artifact();
            if let Err(e) = self
                .store
                .put(&storage_key(id), serde_json::to_value(&artifact).unwrap_or_default())
                .await
            {
                warn!(session = %id, error = %e, "failed to persist initial session snapshot");
            }
        }

        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());

        if config.auto_checkpoint {
            self.start_auto_checkpoint_timer(id, handle).await;
        }

        info!(session = %id, topology = ?topology_kind, "session created");
        Ok(id)
    }

    async fn start_auto_checkpoint_timer(&self, id: EntityId, handle: Arc<Mutex<Session>>) {
        let store = self.store.clone();
        let interval = {
            let session = handle.lock().await;
            session.config.checkpoint_interval
        };
        let task_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let mut session = handle.lock().await;
                if session.status != SessionStatus::Active {
                    debug!(session = %session.id, status = ?session.status, "auto-checkpoint tick skipped");
                    continue;
                }
                if let Err(e) = create_checkpoint_locked(&mut session, &store, "auto", HashMap::new()).await
                {
                    warn!(session = %session.id, error = %e, "auto-checkpoint failed");
                }
            }
        });
        self.timers.lock().await.insert(id, task_handle);
    }

    async fn cancel_timer(&self, id: EntityId) {
        if let Some(handle) = self.timers.lock().await.remove(&id) {
            handle.abort();
        }
    }

    async fn handle_for(&self, id: EntityId) -> Result<Arc<Mutex<Session>>, SwarmError> {
        if let Some(handle) = self.sessions.read().await.get(&id).cloned() {
            return Ok(handle);
        }

        // Not resident: attempt to load from persistence (§4.1 Resume:
        // "Loads the session from persistence if not currently in memory").
        let doc = self
            .store
            .get(&storage_key(id))
            .await
            .map_err(|e| SwarmError::new(ErrorCode::NotFound, e.to_string()))?
            .ok_or_else(|| SwarmError::new(ErrorCode::NotFound, format!("session {id} not found")))?;

        let artifact: CheckpointArtifact = serde_json::from_value(doc).map_err(|e| {
            SwarmError::new(
                ErrorCode::CheckpointFailed,
                format!("corrupted session snapshot: {e}"),
            )
        })?;
        let session = Session::from_artifact(artifact, self.store.clone())?;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        Ok(handle)
    }

    /// Read a session's current snapshot (§4.1 GetSession).
    pub async fn get_session(&self, id: EntityId) -> Option<SessionSnapshot> {
        let handle = self.sessions.read().await.get(&id).cloned()?;
        let session = handle.lock().await;
        Some(SessionSnapshot::from(&*session))
    }

    /// List every resident session matching `filter` conjunctively (§4.1 ListSessions).
    pub async fn list_sessions(&self, filter: &SessionFilter) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::new();
        for handle in sessions.values() {
            let session = handle.lock().await;
            if filter.matches(&session) {
                out.push(SessionSnapshot::from(&*session));
            }
        }
        out
    }

    /// Bind `agent` to `session_id` (§4.1 AddAgent).
    pub async fn add_agent(&self, session_id: EntityId, agent: Agent) -> Result<(), SwarmError> {
        let handle = self.handle_for(session_id).await?;
        let mut session = handle.lock().await;
        session.add_agent(agent)
    }

    /// Add `task` to `session_id`, attempting immediate routing (§4.1 AddTask).
    pub async fn add_task(&self, session_id: EntityId, task: Task) -> Result<(), SwarmError> {
        let handle = self.handle_for(session_id).await?;
        let mut session = handle.lock().await;
        session.add_task(task)
    }

    /// Transition a task's status within `session_id` (§4.1 UpdateTaskStatus).
    pub async fn update_task_status(
        &self,
        session_id: EntityId,
        task_id: EntityId,
        new_status: TaskStatus,
    ) -> Result<(), SwarmError> {
        let handle = self.handle_for(session_id).await?;
        let mut session = handle.lock().await;
        session.update_task_status(task_id, new_status)
    }

    /// Create a checkpoint of `session_id`'s current state (§4.1 CreateCheckpoint).
    ///
    /// On persistence failure the in-memory checkpoint is still recorded and
    /// this call still returns `Ok` (§7 "callers see success for operations
    /// that completed in memory and a separate warning for the persistence
    /// side effect") — a `tracing::warn!` is emitted instead of a surfaced
    /// error, since the checkpoint did take effect.
    pub async fn create_checkpoint(
        &self,
        session_id: EntityId,
        reason: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Checkpoint, SwarmError> {
        let handle = self.handle_for(session_id).await?;
        let mut session = handle.lock().await;
        session.ensure_mutable()?;
        create_checkpoint_locked(&mut session, &self.store, reason, metadata).await
    }

    /// Pause an active session (§4.1 Pause): snapshots a `"pause"`
    /// checkpoint, transitions to `paused`, and cancels the auto-checkpoint
    /// timer.
    pub async fn pause(&self, session_id: EntityId) -> Result<(), SwarmError> {
        let handle = self.handle_for(session_id).await?;
        {
            let mut session = handle.lock().await;
            if session.status != SessionStatus::Active {
                return Err(SwarmError::new(
                    ErrorCode::InvalidConfig,
                    "session must be active to pause",
                ));
            }
            create_checkpoint_locked(&mut session, &self.store, "pause", HashMap::new()).await?;
            session.status = SessionStatus::Paused;
        }
        self.cancel_timer(session_id).await;
        Ok(())
    }

    /// Resume a session (§4.1 Resume), optionally restoring a named
    /// checkpoint's snapshot first. Restarts auto-checkpointing if
    /// configured.
    pub async fn resume(
        &self,
        session_id: EntityId,
        checkpoint_id: Option<EntityId>,
    ) -> Result<(), SwarmError> {
        let handle = self.handle_for(session_id).await?;
        let auto_checkpoint = {
            let mut session = handle.lock().await;
            session.ensure_mutable()?;
            if let Some(checkpoint_id) = checkpoint_id {
                let snapshot = session
                    .checkpoints
                    .iter()
                    .find(|c| c.id == checkpoint_id)
                    .map(|c| c.snapshot.clone())
                    .ok_or_else(|| {
                        SwarmError::new(
                            ErrorCode::NotFound,
                            format!("checkpoint {checkpoint_id} not found"),
                        )
                    })?;
                session.restore_state(snapshot)?;
            }
            session.status = SessionStatus::Active;
            session.touch();
            session.config.auto_checkpoint
        };

        self.cancel_timer(session_id).await;
        if auto_checkpoint {
            self.start_auto_checkpoint_timer(session_id, handle).await;
        }
        Ok(())
    }

    /// Terminate a session (§4.1 Terminate): writes a terminal checkpoint,
    /// marks the session `terminated`, and cancels timers. Terminated
    /// sessions remain queryable but refuse further mutation.
    pub async fn terminate(&self, session_id: EntityId, reason: Option<String>) -> Result<(), SwarmError> {
        let handle = self.handle_for(session_id).await?;
        {
            let mut session = handle.lock().await;
            session.ensure_mutable()?;
            let label = format!("terminate: {}", reason.unwrap_or_default());
            create_checkpoint_locked(&mut session, &self.store, label, HashMap::new()).await?;
            session.status = SessionStatus::Terminated;
            session.completed_at = Some(Utc::now());
        }
        self.cancel_timer(session_id).await;
        Ok(())
    }

    /// Permanently forget a session (the one mutating operation terminal
    /// sessions still accept, §4.1 "Terminal sessions remain queryable but
    /// refuse all mutating operations except deletion").
    pub async fn delete_session(&self, session_id: EntityId) -> Result<(), SwarmError> {
        self.cancel_timer(session_id).await;
        self.sessions.write().await.remove(&session_id);
        let _ = self.store.delete(&storage_key(session_id)).await;
        Ok(())
    }

    /// Load every session the store currently holds into memory. Corrupted
    /// artifacts are logged and skipped — one bad file never prevents the
    /// rest from loading (§4.1 Failure model).
    pub async fn load_all(&self) -> usize {
        let keys = match self.store.list_keys("session:").await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list persisted sessions");
                return 0;
            }
        };

        let mut loaded = 0;
        for key in keys {
            let Some(id_str) = key.strip_prefix("session:") else {
                continue;
            };
            let Ok(uuid) = id_str.parse::<uuid::Uuid>() else {
                warn!(key, "skipping session key with unparseable id");
                continue;
            };
            match self.handle_for(EntityId(uuid)).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!(key, error = %e, "skipping corrupted session snapshot"),
            }
        }
        loaded
    }
}

async fn create_checkpoint_locked(
    session: &mut Session,
    store: &Arc<dyn ObjectStore>,
    reason: impl Into<String>,
    metadata: HashMap<String, serde_json::Value>,
) -> Result<Checkpoint, SwarmError> {
    let prior_status = session.status;
    session.status = SessionStatus::Checkpointing;

    let checkpoint = Checkpoint::new(session.id, reason, session.current_state(), metadata);
    session.checkpoints.push(checkpoint.clone());
    while session.checkpoints.len() > session.config.max_checkpoints {
        session.checkpoints.remove(0);
    }

    if session.config.persist_to_disk {
        let artifact = session.to_artifact();
        match serde_json::to_value(&artifact) {
            Ok(value) => {
                if let Err(e) = store.put(&storage_key(session.id), value).await {
                    warn!(session = %session.id, error = %e, "checkpoint persistence failed; in-memory checkpoint retained");
                }
            }
            Err(e) => warn!(session = %session.id, error = %e, "failed to serialize checkpoint artifact"),
        }
    }

    session.status = prior_status;
    debug!(session = %session.id, checkpoint = %checkpoint.id, "checkpoint created");
    Ok(checkpoint)
}

/// A read-only copy of a session's externally visible state, returned by
/// `GetSession`/`ListSessions` so callers never hold a lock across an await.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning project.
    pub project_id: String,
    /// Human-readable name.
    pub name: String,
    /// Chosen topology variant.
    pub topology_kind: TopologyKind,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Agents currently bound, in insertion order.
    pub agents: Vec<Agent>,
    /// Tasks currently running.
    pub running_tasks: Vec<Task>,
    /// Tasks waiting for a routable agent.
    pub pending_tasks: Vec<Task>,
    /// Count of tasks that reached `completed`.
    pub tasks_completed: u64,
    /// Count of tasks ever added.
    pub tasks_total: u64,
    /// Number of retained checkpoints.
    pub checkpoint_count: usize,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            project_id: session.project_id.clone(),
            name: session.name.clone(),
            topology_kind: session.topology_kind,
            status: session.status,
            agents: session.agents.iter().map(|(_, a)| a.clone()).collect(),
            running_tasks: session.running_tasks.clone(),
            pending_tasks: session.pending_queue.iter().cloned().collect(),
            tasks_completed: session.tasks_completed,
            tasks_total: session.tasks_total,
            checkpoint_count: session.checkpoints.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_store::InMemoryStore;
    use swarm_types::AgentType;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn invalid_config_rejects_zero_max_agents() {
        let mgr = manager();
        let err = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(0), HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[tokio::test]
    async fn add_agent_rejects_beyond_capacity() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(1), HashMap::new())
            .await
            .unwrap();
        mgr.add_agent(id, Agent::new(AgentType::Implementation, 3)).await.unwrap();
        let err = mgr
            .add_agent(id, Agent::new(AgentType::Implementation, 3))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CapacityExceeded);
    }

    /// §8 scenario 1: hierarchical session routes an implementation task to
    /// the implementer, leaving it busy with exactly one in-flight task.
    #[tokio::test]
    async fn scenario_hierarchical_routes_task_to_matching_agent() {
        let mgr = manager();
        let id = mgr
            .create_session(
                "p1",
                "s1",
                TopologyKind::Hierarchical,
                SessionConfig::new(3),
                HashMap::new(),
            )
            .await
            .unwrap();

        mgr.add_agent(id, Agent::new(AgentType::Architect, 3)).await.unwrap();
        mgr.add_agent(id, Agent::new(AgentType::Review, 3)).await.unwrap();
        let implementer = Agent::new(AgentType::Implementation, 3);
        let implementer_id = implementer.id;
        mgr.add_agent(id, implementer).await.unwrap();

        let task = Task::new("implementation", "build the thing", 1);
        mgr.add_task(id, task).await.unwrap();

        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.running_tasks.len(), 1);
        let implementer_state = snapshot
            .agents
            .iter()
            .find(|a| a.id == implementer_id)
            .unwrap();
        assert_eq!(implementer_state.status, swarm_types::AgentStatus::Busy);
        assert_eq!(implementer_state.current_tasks.len(), 1);
    }

    #[tokio::test]
    async fn task_without_routable_agent_is_queued() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.add_task(id, Task::new("anything", "x", 1)).await.unwrap();
        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.pending_tasks.len(), 1);
        assert_eq!(snapshot.running_tasks.len(), 0);
    }

    #[tokio::test]
    async fn completing_a_task_frees_the_agent_and_updates_counters() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.add_agent(id, Agent::new(AgentType::Implementation, 1)).await.unwrap();
        let task = Task::new("implementation", "x", 1);
        let task_id = task.id;
        mgr.add_task(id, task).await.unwrap();

        mgr.update_task_status(id, task_id, TaskStatus::Completed).await.unwrap();
        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.tasks_completed, 1);
        assert!(snapshot.agents[0].current_tasks.is_empty());
        assert_eq!(snapshot.agents[0].status, swarm_types::AgentStatus::Idle);
    }

    #[tokio::test]
    async fn checkpoint_retention_trims_to_max_checkpoints() {
        let mgr = manager();
        let config = SessionConfig::new(2).with_max_checkpoints(2);
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, config, HashMap::new())
            .await
            .unwrap();

        for _ in 0..5 {
            mgr.create_checkpoint(id, "manual", HashMap::new()).await.unwrap();
        }
        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.checkpoint_count, 2);
    }

    /// §8 "Checkpoint round-trip": resuming a checkpoint reconstructs agents,
    /// tasks, and counters field-for-field as of checkpoint time.
    #[tokio::test]
    async fn checkpoint_round_trip_restores_state() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(3), HashMap::new())
            .await
            .unwrap();
        mgr.add_agent(id, Agent::new(AgentType::Implementation, 2)).await.unwrap();
        let task = Task::new("implementation", "x", 1);
        let task_id = task.id;
        mgr.add_task(id, task).await.unwrap();

        let checkpoint = mgr.create_checkpoint(id, "manual", HashMap::new()).await.unwrap();

        // Mutate past the checkpoint.
        mgr.update_task_status(id, task_id, TaskStatus::Completed).await.unwrap();
        mgr.add_agent(id, Agent::new(AgentType::Testing, 2)).await.unwrap();

        mgr.resume(id, Some(checkpoint.id)).await.unwrap();
        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.running_tasks.len(), 1);
        assert_eq!(snapshot.tasks_completed, 0);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_through_persistence() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.pause(id).await.unwrap();
        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Paused);

        mgr.resume(id, None).await.unwrap();
        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn terminate_refuses_further_mutation_but_stays_queryable() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.terminate(id, Some("done".to_string())).await.unwrap();

        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Terminated);

        let err = mgr
            .add_agent(id, Agent::new(AgentType::Implementation, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[tokio::test]
    async fn resume_refuses_a_terminated_session() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.terminate(id, Some("done".to_string())).await.unwrap();

        let err = mgr.resume(id, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);

        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Terminated);
    }

    #[tokio::test]
    async fn terminate_is_refused_on_an_already_terminated_session() {
        let mgr = manager();
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.terminate(id, Some("first".to_string())).await.unwrap();
        let checkpoints_after_first = mgr.get_session(id).await.unwrap().checkpoint_count;

        let err = mgr
            .terminate(id, Some("second".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);

        let snapshot = mgr.get_session(id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Terminated);
        assert_eq!(snapshot.checkpoint_count, checkpoints_after_first);
    }

    /// §8 scenario 5: a 1s auto-checkpoint interval appends exactly one
    /// `"auto"` checkpoint after one interval, and none while paused.
    #[tokio::test(start_paused = true)]
    async fn scenario_auto_checkpoint_fires_on_interval_and_skips_while_paused() {
        let mgr = manager();
        let config = SessionConfig::new(2).with_auto_checkpoint(std::time::Duration::from_secs(1));
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, config, HashMap::new())
            .await
            .unwrap();

        tokio::time::advance(std::time::Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        let snapshot = mgr.get_session(id).await.unwrap();
        let auto_checkpoints = snapshot.checkpoint_count;
        assert!(auto_checkpoints >= 1);

        mgr.pause(id).await.unwrap();
        let after_pause = mgr.get_session(id).await.unwrap().checkpoint_count;

        tokio::time::advance(std::time::Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        let after_wait = mgr.get_session(id).await.unwrap().checkpoint_count;
        assert_eq!(after_pause, after_wait);
    }

    #[tokio::test]
    async fn load_all_skips_corrupted_artifacts_and_loads_the_rest() {
        let store = Arc::new(InMemoryStore::new());
        let mgr = SessionManager::new(store.clone());
        let id = mgr
            .create_session("p1", "s1", TopologyKind::Mesh, SessionConfig::new(2), HashMap::new())
            .await
            .unwrap();
        mgr.create_checkpoint(id, "manual", HashMap::new()).await.unwrap();

        store
            .put("session:not-a-real-artifact", serde_json::json!({"garbage": true}))
            .await
            .unwrap();

        let fresh = SessionManager::new(store);
        let loaded = fresh.load_all().await;
        assert_eq!(loaded, 1);
    }
}
