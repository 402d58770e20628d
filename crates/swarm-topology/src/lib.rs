#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-topology** – C4, the Topology Engine (§4.2).
//!
//! A topology is a labeled directed graph over agent IDs that the session
//! consults for routing and neighbor queries. The session owns the agent
//! records (`swarm_types::Agent`); this crate owns only the edges and
//! refers to agents by [`EntityId`], mirroring the ownership split
//! `toka-orchestration`'s dependency graph keeps between agent configs and
//! the spawn-order graph it derives from them (`dependency.rs`).
//!
//! Three variants share one [`Topology`] trait: [`hierarchical::Hierarchical`],
//! [`mesh::Mesh`], and [`star::Star`]. Dispatch across variants is a closed
//! enum ([`AnyTopology`]) rather than open `dyn` extensibility, per the
//! design note in spec.md §9 about keeping hot-path dispatch small.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use swarm_types::{AgentStatus, AgentType, EntityId};
use thiserror::Error;

pub mod hierarchical;
pub mod mesh;
pub mod star;

pub use hierarchical::Hierarchical;
pub use mesh::Mesh;
pub use star::Star;

/// Errors a topology operation can surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    /// The topology is already at its configured agent capacity.
    #[error("topology is at capacity ({max} agents)")]
    CapacityExceeded {
        /// The configured maximum.
        max: usize,
    },
    /// No agent candidate satisfies the routing request.
    #[error("no workers available for routing")]
    NoWorkersAvailable,
    /// The referenced agent is not part of this topology.
    #[error("agent {0} not found in topology")]
    NotFound(EntityId),
    /// A construction-time invariant was violated (e.g. star with no coordinator).
    #[error("invalid topology configuration: {0}")]
    InvalidConfig(String),
}

/// A read-only view of an agent's routing-relevant state, as supplied by the
/// session for one `route_task`/`calculate_metrics` call. The topology never
/// stores agent records itself (see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentView {
    /// The agent's identifier.
    pub id: EntityId,
    /// The agent's symbolic type.
    pub agent_type: AgentType,
    /// The agent's current lifecycle status.
    pub status: AgentStatus,
    /// Current in-flight task count (`|currentTasks|`).
    pub load: usize,
}

impl AgentView {
    /// Whether this agent is idle (no in-flight tasks, accepting status).
    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }
}

/// The endpoint of a routed message: a single agent, or every node that
/// receives a broadcast (§4.2 RouteMessage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteTarget {
    /// A single addressed recipient.
    Agent(EntityId),
    /// A broadcast; the literal `"broadcast"` target of the spec.
    Broadcast,
}

/// The result of a `RouteMessage`/`RouteTask` routing decision (§4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// The sending agent.
    pub from: EntityId,
    /// The routing target.
    pub to: RouteTarget,
    /// Ordered hops, including both endpoints (or, for a broadcast, every
    /// node that receives the message).
    pub hops: Vec<EntityId>,
    /// Number of hops between sender and recipient (`hops.len() - 1` for a
    /// point-to-point route).
    pub hop_count: usize,
    /// Estimated latency, in milliseconds (abstract units, per spec.md §4.2).
    pub latency_ms: f64,
}

/// Aggregate topology health metrics (§4.2 CalculateMetrics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyMetrics {
    /// `1 / avgPathLength`.
    pub efficiency: f64,
    /// Estimated average message latency, in milliseconds.
    pub message_latency_ms: f64,
    /// `1 - variance(load) / maxVariance`.
    pub load_balance: f64,
    /// Fraction of the graph that is mutually reachable (`1.0` when fully connected).
    pub connectivity: f64,
    /// Agents identified as bottlenecks (load exceeds mean by more than one stddev).
    pub bottlenecks: Vec<EntityId>,
}

/// The common contract every topology variant implements (§4.2).
pub trait Topology: Send + Sync {
    /// Add an agent to the topology's graph.
    fn add_agent(&mut self, view: AgentView) -> Result<(), TopologyError>;

    /// Remove an agent from the topology. Idempotent.
    fn remove_agent(&mut self, id: EntityId);

    /// The set of agents directly reachable from `id` in one hop.
    fn neighbors(&self, id: EntityId) -> HashSet<EntityId>;

    /// Compute a route for a message. `to = None` means broadcast.
    fn route_message(&self, from: EntityId, to: Option<EntityId>) -> Result<Path, TopologyError>;

    /// Choose an agent to run `task_type` among the given agent views.
    fn route_task(&mut self, task_type: &str, agents: &[AgentView]) -> Result<EntityId, TopologyError>;

    /// Compute aggregate health metrics over the given agent views.
    fn calculate_metrics(&self, agents: &[AgentView]) -> TopologyMetrics;

    /// Whether the topology currently satisfies its structural invariants.
    fn validate(&self) -> bool;

    /// Re-derive internal bookkeeping (coordinator election, counters, ...).
    fn reorganize(&mut self, agents: &[AgentView]);

    /// Current agent count, for capacity checks.
    fn len(&self) -> usize;

    /// Whether the topology holds no agents.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Picks an agent of matching type first, then any idle agent; ties are
/// broken by ascending load, then by the given iteration (insertion) order
/// (§4.2 common `RouteTask` contract, used verbatim by [`Hierarchical`] and
/// as the fallback rule named by the mesh/star variants' own strategies).
pub fn select_by_type_then_idle(task_type_hint: &str, agents: &[AgentView]) -> Option<EntityId> {
    let matching_idle = agents
        .iter()
        .filter(|a| a.is_idle() && agent_type_matches(a.agent_type, task_type_hint))
        .min_by_key(|a| a.load);
    if let Some(a) = matching_idle {
        return Some(a.id);
    }
    agents.iter().filter(|a| a.is_idle()).min_by_key(|a| a.load).map(|a| a.id)
}

/// Whether an agent's symbolic type matches a task-type hint string. Matching
/// is case-insensitive and tolerant of the task type being a bare keyword
/// (e.g. `"implementation"`, `"impl"`) rather than the exact enum spelling.
fn agent_type_matches(agent_type: AgentType, task_type_hint: &str) -> bool {
    let hint = task_type_hint.to_ascii_lowercase();
    let keywords: &[&str] = match agent_type {
        AgentType::Architect => &["architect", "design"],
        AgentType::Review => &["review"],
        AgentType::Implementation => &["implementation", "impl", "coding"],
        AgentType::Testing => &["testing", "test"],
        AgentType::Research => &["research"],
        AgentType::Documentation => &["documentation", "docs"],
        AgentType::Debugger => &["debug", "debugger"],
    };
    keywords.iter().any(|k| hint.contains(k))
}

/// Mean and population standard deviation of a load distribution, used by
/// every variant's `CalculateMetrics` bottleneck/load-balance computation.
pub(crate) fn load_stats(loads: &[f64]) -> (f64, f64) {
    if loads.is_empty() {
        return (0.0, 0.0);
    }
    let mean = loads.iter().sum::<f64>() / loads.len() as f64;
    let variance = loads.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / loads.len() as f64;
    (mean, variance.sqrt())
}

/// Variance of the most unbalanced possible redistribution of the same total
/// load (all of it on one agent, none on the rest). Used as the denominator
/// of `loadBalance = 1 - variance(load)/maxVariance` (§4.2), since the spec
/// names `maxVariance` without defining it further.
pub(crate) fn extreme_variance(loads: &[f64]) -> f64 {
    let n = loads.len();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = loads.iter().sum();
    let mean = total / n as f64;
    let extreme_mean_sq_dev = (total - mean).powi(2) + (n - 1) as f64 * mean.powi(2);
    extreme_mean_sq_dev / n as f64
}

/// A closed enum over the three topology variants, for callers (the session
/// manager) that need to hold "a topology" without generics or `dyn`.
pub enum AnyTopology {
    /// Layered architect/review/implementer graph.
    Hierarchical(Hierarchical),
    /// Complete graph.
    Mesh(Mesh),
    /// Hub-and-spoke graph.
    Star(Star),
}

impl Topology for AnyTopology {
    fn add_agent(&mut self, view: AgentView) -> Result<(), TopologyError> {
        match self {
            AnyTopology::Hierarchical(t) => t.add_agent(view),
            AnyTopology::Mesh(t) => t.add_agent(view),
            AnyTopology::Star(t) => t.add_agent(view),
        }
    }

    fn remove_agent(&mut self, id: EntityId) {
        match self {
            AnyTopology::Hierarchical(t) => t.remove_agent(id),
            AnyTopology::Mesh(t) => t.remove_agent(id),
            AnyTopology::Star(t) => t.remove_agent(id),
        }
    }

    fn neighbors(&self, id: EntityId) -> HashSet<EntityId> {
        match self {
            AnyTopology::Hierarchical(t) => t.neighbors(id),
            AnyTopology::Mesh(t) => t.neighbors(id),
            AnyTopology::Star(t) => t.neighbors(id),
        }
    }

    fn route_message(&self, from: EntityId, to: Option<EntityId>) -> Result<Path, TopologyError> {
        match self {
            AnyTopology::Hierarchical(t) => t.route_message(from, to),
            AnyTopology::Mesh(t) => t.route_message(from, to),
            AnyTopology::Star(t) => t.route_message(from, to),
        }
    }

    fn route_task(&mut self, task_type: &str, agents: &[AgentView]) -> Result<EntityId, TopologyError> {
        match self {
            AnyTopology::Hierarchical(t) => t.route_task(task_type, agents),
            AnyTopology::Mesh(t) => t.route_task(task_type, agents),
            AnyTopology::Star(t) => t.route_task(task_type, agents),
        }
    }

    fn calculate_metrics(&self, agents: &[AgentView]) -> TopologyMetrics {
        match self {
            AnyTopology::Hierarchical(t) => t.calculate_metrics(agents),
            AnyTopology::Mesh(t) => t.calculate_metrics(agents),
            AnyTopology::Star(t) => t.calculate_metrics(agents),
        }
    }

    fn validate(&self) -> bool {
        match self {
            AnyTopology::Hierarchical(t) => t.validate(),
            AnyTopology::Mesh(t) => t.validate(),
            AnyTopology::Star(t) => t.validate(),
        }
    }

    fn reorganize(&mut self, agents: &[AgentView]) {
        match self {
            AnyTopology::Hierarchical(t) => t.reorganize(agents),
            AnyTopology::Mesh(t) => t.reorganize(agents),
            AnyTopology::Star(t) => t.reorganize(agents),
        }
    }

    fn len(&self) -> usize {
        match self {
            AnyTopology::Hierarchical(t) => t.len(),
            AnyTopology::Mesh(t) => t.len(),
            AnyTopology::Star(t) => t.len(),
        }
    }
}

/// The kind of topology, used by the session to pick a constructor (§3 Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Layered architect/review/implementer graph.
    Hierarchical,
    /// Complete graph.
    Mesh,
    /// Hub-and-spoke graph.
    Star,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_type_then_idle_prefers_matching_type() {
        let a = AgentView {
            id: EntityId::new(),
            agent_type: AgentType::Implementation,
            status: AgentStatus::Idle,
            load: 0,
        };
        let b = AgentView {
            id: EntityId::new(),
            agent_type: AgentType::Review,
            status: AgentStatus::Idle,
            load: 0,
        };
        let chosen = select_by_type_then_idle("implementation", &[b, a]).unwrap();
        assert_eq!(chosen, a.id);
    }

    #[test]
    fn select_by_type_then_idle_falls_back_to_any_idle() {
        let a = AgentView {
            id: EntityId::new(),
            agent_type: AgentType::Review,
            status: AgentStatus::Idle,
            load: 0,
        };
        let chosen = select_by_type_then_idle("implementation", &[a]).unwrap();
        assert_eq!(chosen, a.id);
    }

    #[test]
    fn select_by_type_then_idle_none_when_no_idle() {
        let a = AgentView {
            id: EntityId::new(),
            agent_type: AgentType::Implementation,
            status: AgentStatus::Busy,
            load: 1,
        };
        assert!(select_by_type_then_idle("implementation", &[a]).is_none());
    }

    #[test]
    fn load_stats_computes_mean_and_stddev() {
        let (mean, stddev) = load_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((stddev - 2.0).abs() < 1e-9);
    }
}
