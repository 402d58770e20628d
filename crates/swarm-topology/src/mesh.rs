//! Mesh topology: complete graph, every agent reaches every other in one hop (§4.2).

use std::collections::{HashMap, HashSet};

use swarm_types::EntityId;
use tracing::debug;

use crate::{load_stats, AgentView, Path, RouteTarget, Topology, TopologyError, TopologyMetrics};

/// A complete graph: every new agent is connected to every existing agent.
/// Maintains a side counter of tasks distributed per agent, used to
/// tie-break `RouteTask` (§4.2 Mesh variant).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    max_agents: usize,
    agents: Vec<EntityId>,
    tasks_distributed: HashMap<EntityId, u64>,
}

impl Mesh {
    /// Construct an empty mesh topology.
    pub fn new(max_agents: usize) -> Self {
        Self {
            max_agents,
            agents: Vec::new(),
            tasks_distributed: HashMap::new(),
        }
    }

    /// Zero every agent's distributed-task counter.
    pub fn reset_task_distribution(&mut self) {
        for count in self.tasks_distributed.values_mut() {
            *count = 0;
        }
    }

    /// Current distribution counters, for tests/inspection.
    pub fn task_distribution(&self) -> &HashMap<EntityId, u64> {
        &self.tasks_distributed
    }
}

impl Topology for Mesh {
    fn add_agent(&mut self, view: AgentView) -> Result<(), TopologyError> {
        if self.agents.len() >= self.max_agents {
            return Err(TopologyError::CapacityExceeded { max: self.max_agents });
        }
        self.agents.push(view.id);
        self.tasks_distributed.entry(view.id).or_insert(0);
        debug!(agent = %view.id, "added agent to mesh topology");
        Ok(())
    }

    fn remove_agent(&mut self, id: EntityId) {
        self.agents.retain(|a| *a != id);
        self.tasks_distributed.remove(&id);
    }

    fn neighbors(&self, id: EntityId) -> HashSet<EntityId> {
        if !self.agents.contains(&id) {
            return HashSet::new();
        }
        self.agents.iter().filter(|a| **a != id).copied().collect()
    }

    fn route_message(&self, from: EntityId, to: Option<EntityId>) -> Result<Path, TopologyError> {
        if !self.agents.contains(&from) {
            return Err(TopologyError::NotFound(from));
        }
        let Some(to) = to else {
            let hops: Vec<EntityId> = self.agents.iter().filter(|a| **a != from).copied().collect();
            let hop_count = hops.len();
            return Ok(Path {
                from,
                to: RouteTarget::Broadcast,
                hops,
                hop_count,
                latency_ms: 10.0,
            });
        };
        if !self.agents.contains(&to) {
            return Err(TopologyError::NotFound(to));
        }
        Ok(Path {
            from,
            to: RouteTarget::Agent(to),
            hops: vec![from, to],
            hop_count: 1,
            latency_ms: 10.0,
        })
    }

    fn route_task(&mut self, _task_type: &str, agents: &[AgentView]) -> Result<EntityId, TopologyError> {
        let available: Vec<&AgentView> = agents.iter().filter(|a| a.is_idle()).collect();
        let chosen = available
            .iter()
            .min_by_key(|a| (self.tasks_distributed.get(&a.id).copied().unwrap_or(0), a.load))
            .map(|a| a.id)
            .ok_or(TopologyError::NoWorkersAvailable)?;
        *self.tasks_distributed.entry(chosen).or_insert(0) += 1;
        Ok(chosen)
    }

    fn calculate_metrics(&self, agents: &[AgentView]) -> TopologyMetrics {
        let loads: Vec<f64> = self
            .agents
            .iter()
            .filter_map(|id| agents.iter().find(|a| a.id == *id))
            .map(|a| a.load as f64)
            .collect();
        let (mean, stddev) = load_stats(&loads);
        let max_variance = crate::extreme_variance(&loads);
        let variance = stddev * stddev;
        let load_balance = if max_variance > 0.0 {
            (1.0 - variance / max_variance).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let bottlenecks: Vec<EntityId> = self
            .agents
            .iter()
            .filter_map(|id| agents.iter().find(|a| a.id == *id))
            .filter(|a| a.load as f64 > mean + stddev)
            .map(|a| a.id)
            .collect();

        TopologyMetrics {
            efficiency: 1.0,
            message_latency_ms: 10.0,
            load_balance,
            connectivity: 1.0,
            bottlenecks,
        }
    }

    fn validate(&self) -> bool {
        true
    }

    fn reorganize(&mut self, _agents: &[AgentView]) {
        self.reset_task_distribution();
    }

    fn len(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_types::{AgentStatus, AgentType};

    fn view(status: AgentStatus, load: usize) -> AgentView {
        AgentView {
            id: EntityId::new(),
            agent_type: AgentType::Implementation,
            status,
            load,
        }
    }

    #[test]
    fn route_message_is_always_one_hop() {
        let mut mesh = Mesh::new(5);
        let a = view(AgentStatus::Idle, 0);
        let b = view(AgentStatus::Idle, 0);
        mesh.add_agent(a).unwrap();
        mesh.add_agent(b).unwrap();
        let path = mesh.route_message(a.id, Some(b.id)).unwrap();
        assert_eq!(path.hop_count, 1);
        assert!((path.latency_ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn new_agent_connects_to_all_existing() {
        let mut mesh = Mesh::new(5);
        let a = view(AgentStatus::Idle, 0);
        let b = view(AgentStatus::Idle, 0);
        let c = view(AgentStatus::Idle, 0);
        mesh.add_agent(a).unwrap();
        mesh.add_agent(b).unwrap();
        mesh.add_agent(c).unwrap();
        assert_eq!(mesh.neighbors(a.id).len(), 2);
    }

    #[test]
    fn route_task_tie_breaks_by_distribution_then_load() {
        let mut mesh = Mesh::new(5);
        let a = view(AgentStatus::Idle, 0);
        let b = view(AgentStatus::Idle, 0);
        mesh.add_agent(a).unwrap();
        mesh.add_agent(b).unwrap();

        let first = mesh.route_task("x", &[a, b]).unwrap();
        assert_eq!(first, a.id);
        // a now has one distributed task; b should be chosen next.
        let second = mesh.route_task("x", &[a, b]).unwrap();
        assert_eq!(second, b.id);
    }

    #[test]
    fn reset_task_distribution_zeroes_counters() {
        let mut mesh = Mesh::new(5);
        let a = view(AgentStatus::Idle, 0);
        mesh.add_agent(a).unwrap();
        mesh.route_task("x", &[a]).unwrap();
        assert_eq!(*mesh.task_distribution().get(&a.id).unwrap(), 1);
        mesh.reset_task_distribution();
        assert_eq!(*mesh.task_distribution().get(&a.id).unwrap(), 0);
    }

    #[test]
    fn broadcast_includes_every_other_agent() {
        let mut mesh = Mesh::new(5);
        let a = view(AgentStatus::Idle, 0);
        let b = view(AgentStatus::Idle, 0);
        let c = view(AgentStatus::Idle, 0);
        mesh.add_agent(a).unwrap();
        mesh.add_agent(b).unwrap();
        mesh.add_agent(c).unwrap();
        let path = mesh.route_message(a.id, None).unwrap();
        assert_eq!(path.hop_count, 2);
        assert!(path.hops.contains(&b.id) && path.hops.contains(&c.id));
    }
}
