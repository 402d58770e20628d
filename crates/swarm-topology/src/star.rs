//! Star topology: a coordinator hub with spokes (§4.2 Star variant).

use std::collections::HashSet;

use swarm_types::EntityId;
use tracing::{debug, info};

use crate::{load_stats, AgentView, Path, RouteTarget, Topology, TopologyError, TopologyMetrics};

/// Default multiplier for the coordinator-reelection load threshold:
/// `coordinatorLoad >= threshold × avgSpokeLoad` (§4.2 Star variant).
pub const DEFAULT_REELECTION_THRESHOLD: f64 = 5.0;

/// A hub-and-spoke graph. Construction fails without a designated
/// coordinator (§4.2: "Requires a designated coordinator ID at
/// construction; construction fails without it").
#[derive(Debug, Clone)]
pub struct Star {
    max_agents: usize,
    coordinator: EntityId,
    spokes: Vec<EntityId>,
    reelection_threshold: f64,
}

impl Star {
    /// Construct a star topology with the given coordinator. Fails with
    /// [`TopologyError::InvalidConfig`] if `coordinator` is `None`.
    pub fn new(coordinator: Option<EntityId>, max_agents: usize) -> Result<Self, TopologyError> {
        let coordinator = coordinator.ok_or_else(|| {
            TopologyError::InvalidConfig("star topology requires a coordinator id".to_string())
        })?;
        Ok(Self {
            max_agents,
            coordinator,
            spokes: Vec::new(),
            reelection_threshold: DEFAULT_REELECTION_THRESHOLD,
        })
    }

    /// Override the coordinator-reelection load multiplier (default 5.0).
    pub fn with_reelection_threshold(mut self, threshold: f64) -> Self {
        self.reelection_threshold = threshold;
        self
    }

    /// The current coordinator.
    pub fn coordinator_id(&self) -> EntityId {
        self.coordinator
    }

    /// The current spokes, in insertion order.
    pub fn spokes(&self) -> &[EntityId] {
        &self.spokes
    }
}

impl Topology for Star {
    fn add_agent(&mut self, view: AgentView) -> Result<(), TopologyError> {
        if view.id == self.coordinator {
            return Ok(());
        }
        if self.len() >= self.max_agents {
            return Err(TopologyError::CapacityExceeded { max: self.max_agents });
        }
        self.spokes.push(view.id);
        debug!(agent = %view.id, "added spoke to star topology");
        Ok(())
    }

    fn remove_agent(&mut self, id: EntityId) {
        if id == self.coordinator {
            if !self.spokes.is_empty() {
                let new_coordinator = self.spokes.remove(0);
                info!(agent = %new_coordinator, "elected new star coordinator after removal");
                self.coordinator = new_coordinator;
            }
            return;
        }
        self.spokes.retain(|s| *s != id);
    }

    fn neighbors(&self, id: EntityId) -> HashSet<EntityId> {
        if id == self.coordinator {
            return self.spokes.iter().copied().collect();
        }
        if self.spokes.contains(&id) {
            return std::iter::once(self.coordinator).collect();
        }
        HashSet::new()
    }

    fn route_message(&self, from: EntityId, to: Option<EntityId>) -> Result<Path, TopologyError> {
        let from_is_coordinator = from == self.coordinator;
        if !from_is_coordinator && !self.spokes.contains(&from) {
            return Err(TopologyError::NotFound(from));
        }

        let Some(to) = to else {
            return if from_is_coordinator {
                let hops = self.spokes.clone();
                let hop_count = 1;
                Ok(Path {
                    from,
                    to: RouteTarget::Broadcast,
                    hops,
                    hop_count,
                    latency_ms: 10.0,
                })
            } else {
                let mut hops = vec![self.coordinator];
                hops.extend(self.spokes.iter().filter(|s| **s != from).copied());
                Ok(Path {
                    from,
                    to: RouteTarget::Broadcast,
                    hops,
                    hop_count: 2,
                    latency_ms: 20.0,
                })
            };
        };

        let to_is_coordinator = to == self.coordinator;
        if !to_is_coordinator && !self.spokes.contains(&to) {
            return Err(TopologyError::NotFound(to));
        }

        if from_is_coordinator || to_is_coordinator {
            return Ok(Path {
                from,
                to: RouteTarget::Agent(to),
                hops: vec![from, to],
                hop_count: 1,
                latency_ms: 10.0,
            });
        }

        // spoke -> spoke always routes via the coordinator.
        Ok(Path {
            from,
            to: RouteTarget::Agent(to),
            hops: vec![from, self.coordinator, to],
            hop_count: 2,
            latency_ms: 20.0,
        })
    }

    fn route_task(&mut self, _task_type: &str, agents: &[AgentView]) -> Result<EntityId, TopologyError> {
        let idle_spoke = self
            .spokes
            .iter()
            .filter_map(|id| agents.iter().find(|a| a.id == *id))
            .filter(|a| a.is_idle())
            .min_by_key(|a| a.load)
            .map(|a| a.id);
        if let Some(id) = idle_spoke {
            return Ok(id);
        }
        if agents.iter().any(|a| a.id == self.coordinator) {
            return Ok(self.coordinator);
        }
        Err(TopologyError::NoWorkersAvailable)
    }

    fn calculate_metrics(&self, agents: &[AgentView]) -> TopologyMetrics {
        let spoke_count = self.spokes.len();
        let pair_count = spoke_count + spoke_count * spoke_count.saturating_sub(1);
        let total_path_len = spoke_count + 2 * spoke_count * spoke_count.saturating_sub(1);
        let avg_path_len = if pair_count > 0 {
            total_path_len as f64 / pair_count as f64
        } else {
            1.0
        };

        let loads: Vec<f64> = std::iter::once(self.coordinator)
            .chain(self.spokes.iter().copied())
            .filter_map(|id| agents.iter().find(|a| a.id == id))
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

        // The coordinator is always reported as a bottleneck (§4.2 Star variant, §8).
        let mut bottlenecks = vec![self.coordinator];
        bottlenecks.extend(
            self.spokes
                .iter()
                .filter_map(|id| agents.iter().find(|a| a.id == *id))
                .filter(|a| a.load as f64 > mean + stddev)
                .map(|a| a.id),
        );
        bottlenecks.dedup();

        TopologyMetrics {
            efficiency: if avg_path_len > 0.0 { 1.0 / avg_path_len } else { 1.0 },
            message_latency_ms: 10.0 * avg_path_len,
            load_balance,
            connectivity: 1.0,
            bottlenecks,
        }
    }

    fn validate(&self) -> bool {
        true
    }

    fn reorganize(&mut self, agents: &[AgentView]) {
        if self.spokes.is_empty() {
            return;
        }
        let Some(coordinator_view) = agents.iter().find(|a| a.id == self.coordinator) else {
            return;
        };
        let spoke_loads: Vec<f64> = self
            .spokes
            .iter()
            .filter_map(|id| agents.iter().find(|a| a.id == *id))
            .map(|a| a.load as f64)
            .collect();
        if spoke_loads.is_empty() {
            return;
        }
        let avg_spoke_load = spoke_loads.iter().sum::<f64>() / spoke_loads.len() as f64;
        if avg_spoke_load <= 0.0 {
            return;
        }
        if (coordinator_view.load as f64) < self.reelection_threshold * avg_spoke_load {
            return;
        }
        let candidate = self
            .spokes
            .iter()
            .filter_map(|id| agents.iter().find(|a| a.id == *id))
            .min_by_key(|a| a.load);
        if let Some(candidate) = candidate {
            if (candidate.load as f64) < coordinator_view.load as f64 {
                info!(
                    old = %self.coordinator,
                    new = %candidate.id,
                    "re-electing overloaded star coordinator"
                );
                self.spokes.retain(|s| *s != candidate.id);
                self.spokes.push(self.coordinator);
                self.coordinator = candidate.id;
            }
        }
    }

    fn len(&self) -> usize {
        self.spokes.len() + 1
    }
}
