//! Hierarchical topology: architects → reviewers → implementers (§4.2).

use std::collections::{HashSet, VecDeque};

use swarm_types::{AgentType, EntityId};
use tracing::{debug, warn};

use crate::{
    load_stats, select_by_type_then_idle, AgentView, Path, RouteTarget, Topology,
    TopologyError, TopologyMetrics,
};

/// Layer index an agent type is placed into by default (§4.2 Hierarchical variant).
fn default_layer_for(agent_type: AgentType) -> usize {
    match agent_type {
        AgentType::Architect => 0,
        AgentType::Review => 1,
        AgentType::Implementation
        | AgentType::Testing
        | AgentType::Research
        | AgentType::Documentation
        | AgentType::Debugger => 2,
    }
}

/// A layered graph: architects at layer 0, reviewers at layer 1, implementers
/// (and testing/research/documentation/debugger agents) at layer 2. Agents
/// within a layer are fully peered; adjacent layers are fully bipartite-connected.
#[derive(Debug, Clone)]
pub struct Hierarchical {
    max_agents: usize,
    layer_count: usize,
    /// Layers in order, each holding agent IDs in insertion order.
    layers: Vec<Vec<EntityId>>,
}

impl Hierarchical {
    /// Construct an empty hierarchical topology with the conventional 3 layers.
    pub fn new(max_agents: usize) -> Self {
        Self::with_layers(max_agents, 3)
    }

    /// Construct with an explicit layer count (still only the first 3 layer
    /// slots receive agents via `default_layer_for`; extra layers stay empty
    /// until agents are placed by `reorganize` in a future revision).
    pub fn with_layers(max_agents: usize, layer_count: usize) -> Self {
        Self {
            max_agents,
            layer_count: layer_count.max(1),
            layers: vec![Vec::new(); layer_count.max(1)],
        }
    }

    /// The elected coordinator: the first agent of the top (index 0) layer.
    pub fn coordinator(&self) -> Option<EntityId> {
        self.layers.first().and_then(|l| l.first().copied())
    }

    fn layer_of(&self, id: EntityId) -> Option<usize> {
        self.layers.iter().position(|l| l.contains(&id))
    }

    fn layer_index_for(&self, agent_type: AgentType) -> usize {
        default_layer_for(agent_type).min(self.layer_count - 1)
    }

    fn all_agents(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.layers.iter().flatten().copied()
    }

    fn bfs_reachable_count(&self, start: EntityId) -> usize {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);
        while let Some(cur) = queue.pop_front() {
            for n in self.neighbors(cur) {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen.len()
    }
}

impl Topology for Hierarchical {
    fn add_agent(&mut self, view: AgentView) -> Result<(), TopologyError> {
        if self.len() >= self.max_agents {
            return Err(TopologyError::CapacityExceeded { max: self.max_agents });
        }
        let layer = self.layer_index_for(view.agent_type);
        self.layers[layer].push(view.id);
        debug!(agent = %view.id, layer, "added agent to hierarchical topology");
        Ok(())
    }

    fn remove_agent(&mut self, id: EntityId) {
        let was_coordinator = self.coordinator() == Some(id);
        for layer in &mut self.layers {
            layer.retain(|a| *a != id);
        }
        if was_coordinator {
            if let Some(new_coordinator) = self.coordinator() {
                debug!(agent = %new_coordinator, "elected new hierarchical coordinator");
            }
        }
    }

    fn neighbors(&self, id: EntityId) -> HashSet<EntityId> {
        let Some(layer) = self.layer_of(id) else {
            return HashSet::new();
        };
        let mut result = HashSet::new();
        for &peer in &self.layers[layer] {
            if peer != id {
                result.insert(peer);
            }
        }
        if layer > 0 {
            result.extend(self.layers[layer - 1].iter().copied());
        }
        if layer + 1 < self.layers.len() {
            result.extend(self.layers[layer + 1].iter().copied());
        }
        result
    }

    fn route_message(&self, from: EntityId, to: Option<EntityId>) -> Result<Path, TopologyError> {
        let from_layer = self.layer_of(from).ok_or(TopologyError::NotFound(from))?;

        let Some(to) = to else {
            let hops: Vec<EntityId> = self.all_agents().filter(|a| *a != from).collect();
            let hop_count = hops.len();
            return Ok(Path {
                from,
                to: RouteTarget::Broadcast,
                hops,
                hop_count,
                latency_ms: 10.0,
            });
        };

        let to_layer = self.layer_of(to).ok_or(TopologyError::NotFound(to))?;
        let diff = (from_layer as i64 - to_layer as i64).unsigned_abs() as usize;

        if diff <= 1 {
            return Ok(Path {
                from,
                to: RouteTarget::Agent(to),
                hops: vec![from, to],
                hop_count: 1,
                latency_ms: 10.0,
            });
        }

        // Non-adjacent layers: traverse intervening layers via their coordinator
        // (first agent of each layer), per §4.2 "via the coordinator chain".
        let (lo, hi) = if from_layer < to_layer {
            (from_layer, to_layer)
        } else {
            (to_layer, from_layer)
        };
        let mut hops = vec![from];
        for layer_idx in (lo + 1)..hi {
            if let Some(relay) = self.layers[layer_idx].first().copied() {
                hops.push(relay);
            }
        }
        hops.push(to);
        if from_layer > to_layer {
            hops.reverse();
            hops[0] = from;
            *hops.last_mut().unwrap() = to;
        }
        let hop_count = hops.len() - 1;
        Ok(Path {
            from,
            to: RouteTarget::Agent(to),
            hop_count,
            latency_ms: 10.0 * hop_count as f64,
            hops,
        })
    }

    fn route_task(&mut self, task_type: &str, agents: &[AgentView]) -> Result<EntityId, TopologyError> {
        select_by_type_then_idle(task_type, agents).ok_or(TopologyError::NoWorkersAvailable)
    }

    fn calculate_metrics(&self, agents: &[AgentView]) -> TopologyMetrics {
        let ids: Vec<EntityId> = self.all_agents().collect();
        let mut total_path_len = 0usize;
        let mut pair_count = 0usize;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let li = self.layer_of(ids[i]).unwrap_or(0);
                let lj = self.layer_of(ids[j]).unwrap_or(0);
                let diff = (li as i64 - lj as i64).unsigned_abs() as usize;
                total_path_len += diff.max(1);
                pair_count += 1;
            }
        }
        let avg_path_len = if pair_count > 0 {
            total_path_len as f64 / pair_count as f64
        } else {
            1.0
        };

        let loads: Vec<f64> = ids
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

        let bottlenecks: Vec<EntityId> = ids
            .iter()
            .zip(loads.iter())
            .filter(|(_, &load)| load > mean + stddev)
            .map(|(id, _)| *id)
            .collect();

        TopologyMetrics {
            efficiency: if avg_path_len > 0.0 { 1.0 / avg_path_len } else { 1.0 },
            message_latency_ms: 10.0 * avg_path_len,
            load_balance,
            connectivity: if self.validate() { 1.0 } else { 0.0 },
            bottlenecks,
        }
    }

    fn validate(&self) -> bool {
        let Some(top) = self.layers.first() else {
            return false;
        };
        if top.is_empty() {
            return false;
        }
        let total = self.len();
        if total == 0 {
            return false;
        }
        let start = top[0];
        if self.bfs_reachable_count(start) != total {
            warn!("hierarchical topology is not fully connected");
            return false;
        }
        true
    }

    fn reorganize(&mut self, _agents: &[AgentView]) {
        // Coordinator election is derived on demand from layer 0's head; no
        // persistent state needs recomputation here.
    }

    fn len(&self) -> usize {
        self.layers.iter().map(|l| l.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_types::AgentStatus;

    fn view(agent_type: AgentType, status: AgentStatus, load: usize) -> AgentView {
        AgentView {
            id: EntityId::new(),
            agent_type,
            status,
            load,
        }
    }

    #[test]
    fn scenario_architect_review_implementer_routes_to_implementer() {
        let mut topo = Hierarchical::new(3);
        let architect = view(AgentType::Architect, AgentStatus::Idle, 0);
        let reviewer = view(AgentType::Review, AgentStatus::Idle, 0);
        let implementer = view(AgentType::Implementation, AgentStatus::Idle, 0);
        topo.add_agent(architect).unwrap();
        topo.add_agent(reviewer).unwrap();
        topo.add_agent(implementer).unwrap();

        let chosen = topo
            .route_task("implementation", &[architect, reviewer, implementer])
            .unwrap();
        assert_eq!(chosen, implementer.id);
    }

    #[test]
    fn capacity_exceeded_when_full() {
        let mut topo = Hierarchical::new(1);
        topo.add_agent(view(AgentType::Architect, AgentStatus::Idle, 0)).unwrap();
        let err = topo
            .add_agent(view(AgentType::Review, AgentStatus::Idle, 0))
            .unwrap_err();
        assert_eq!(err, TopologyError::CapacityExceeded { max: 1 });
    }

    #[test]
    fn validate_requires_nonempty_top_layer() {
        let mut topo = Hierarchical::new(5);
        assert!(!topo.validate());
        topo.add_agent(view(AgentType::Architect, AgentStatus::Idle, 0)).unwrap();
        assert!(topo.validate());
    }

    #[test]
    fn validate_stays_true_across_add_remove_sequences() {
        let mut topo = Hierarchical::new(10);
        let a = view(AgentType::Architect, AgentStatus::Idle, 0);
        let r1 = view(AgentType::Review, AgentStatus::Idle, 0);
        let r2 = view(AgentType::Review, AgentStatus::Idle, 0);
        let i1 = view(AgentType::Implementation, AgentStatus::Idle, 0);
        topo.add_agent(a).unwrap();
        topo.add_agent(r1).unwrap();
        topo.add_agent(r2).unwrap();
        topo.add_agent(i1).unwrap();
        assert!(topo.validate());
        topo.remove_agent(r1.id);
        assert!(topo.validate());
        topo.remove_agent(i1.id);
        assert!(topo.validate());
    }

    #[test]
    fn adjacent_layer_route_is_one_hop() {
        let mut topo = Hierarchical::new(5);
        let a = view(AgentType::Architect, AgentStatus::Idle, 0);
        let r = view(AgentType::Review, AgentStatus::Idle, 0);
        topo.add_agent(a).unwrap();
        topo.add_agent(r).unwrap();
        let path = topo.route_message(a.id, Some(r.id)).unwrap();
        assert_eq!(path.hop_count, 1);
    }

    #[test]
    fn non_adjacent_layer_route_traverses_coordinator_chain() {
        let mut topo = Hierarchical::new(5);
        let a = view(AgentType::Architect, AgentStatus::Idle, 0);
        let i = view(AgentType::Implementation, AgentStatus::Idle, 0);
        topo.add_agent(a).unwrap();
        topo.add_agent(i).unwrap();
        let path = topo.route_message(a.id, Some(i.id)).unwrap();
        assert_eq!(path.hop_count, 2);
        assert_eq!(path.hops.first(), Some(&a.id));
        assert_eq!(path.hops.last(), Some(&i.id));
    }

    #[test]
    fn coordinator_reelected_after_removal() {
        let mut topo = Hierarchical::new(5);
        let a1 = view(AgentType::Architect, AgentStatus::Idle, 0);
        let a2 = view(AgentType::Architect, AgentStatus::Idle, 0);
        topo.add_agent(a1).unwrap();
        topo.add_agent(a2).unwrap();
        assert_eq!(topo.coordinator(), Some(a1.id));
        topo.remove_agent(a1.id);
        assert_eq!(topo.coordinator(), Some(a2.id));
    }
}
