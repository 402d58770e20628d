#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-pool** – C5, Worker Spawner / Pool (§4.3).
//!
//! A pool owns a set of agents sharing a type, a FIFO overflow queue, and a
//! load-balance [`strategy`]. `Distribute`/`Complete` bookkeeping and
//! `AutoScale` mirror how `toka-agent-runtime`'s executor tracks one agent's
//! task lifecycle (`executor.rs`, `task.rs`), generalized here to a pool of
//! many interchangeable agents of the same type.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use swarm_types::{Agent, AgentStatus, AgentType, EntityId, PerformanceMetric, Task};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod resource;
pub mod spawner;
pub mod strategy;

pub use strategy::LoadBalanceStrategy;

/// Default per-worker concurrent-task capacity for newly spawned agents.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;

/// Fallback estimated completion time for a task type with no execution history (§4.3).
pub const DEFAULT_ESTIMATED_COMPLETION_MS: u64 = 60_000;

/// Errors a pool operation can surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    /// The pool is not accepting dispatch (`PoolStatus != Active`).
    #[error("pool is not active")]
    PoolInactive,
    /// No worker could accept the task; it was queued instead.
    #[error("no workers available; task queued")]
    NoWorkersAvailable,
    /// The referenced worker has in-flight tasks and cannot be removed.
    #[error("worker {0} is busy")]
    WorkerBusy(EntityId),
    /// The referenced worker or task does not exist in this pool.
    #[error("{0} not found in pool")]
    NotFound(EntityId),
}

/// Pool lifecycle status (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Accepting `Distribute` calls.
    Active,
    /// Temporarily not accepting dispatch.
    Paused,
    /// Permanently shut down; refuses all dispatch.
    Terminated,
}

/// Configuration for a [`Pool`] (§4.3 Pool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Human-readable pool name.
    pub name: String,
    /// The symbolic agent type every worker in this pool shares.
    pub agent_type: AgentType,
    /// Minimum worker count, maintained by auto-scaling. Default 1.
    pub min_workers: usize,
    /// Maximum worker count auto-scaling will grow to. Default 10.
    pub max_workers: usize,
    /// Load-balance strategy used by `Distribute`. Default least-loaded.
    pub strategy: LoadBalanceStrategy,
}

impl PoolConfig {
    /// Construct a configuration with the documented defaults
    /// (`minWorkers=1`, `maxWorkers=10`, strategy=least-loaded).
    pub fn new(name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            name: name.into(),
            agent_type,
            min_workers: 1,
            max_workers: 10,
            strategy: LoadBalanceStrategy::default(),
        }
    }

    /// Override `min_workers`.
    pub fn with_min_workers(mut self, n: usize) -> Self {
        self.min_workers = n;
        self
    }

    /// Override `max_workers`.
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    /// Override the load-balance strategy.
    pub fn with_strategy(mut self, strategy: LoadBalanceStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// The result of a successful `Distribute` call (§4.3 Task distribution).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// The worker the task was assigned to.
    pub worker_id: EntityId,
    /// The assigned task's identifier.
    pub task_id: EntityId,
    /// When the assignment was made.
    pub assigned_at: DateTime<Utc>,
    /// Estimated completion time, in milliseconds.
    pub estimated_completion_ms: u64,
}

/// Running pool-level statistics (§4.3 Completion).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    /// Successfully completed tasks.
    pub total_tasks_processed: u64,
    /// Failed tasks.
    pub total_tasks_failed: u64,
    /// Running mean of task execution time, in milliseconds, across
    /// both successes and failures.
    pub avg_task_time_ms: f64,
}

/// What auto-scaling did on one `AutoScale` call (§4.3 Auto-scaling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoScaleAction {
    /// No scaling action was needed.
    None,
    /// A new worker was spawned.
    ScaledUp(EntityId),
    /// An idle worker was removed.
    ScaledDown(EntityId),
}

struct InFlight {
    worker_id: EntityId,
    task_type: String,
}

/// A pool of interchangeable agents sharing a type and a dispatch strategy
/// (§4.3 Pool).
pub struct Pool {
    config: PoolConfig,
    status: PoolStatus,
    workers: HashMap<EntityId, Agent>,
    /// Insertion order, authoritative for round-robin and tie-breaks.
    order: Vec<EntityId>,
    queue: VecDeque<Task>,
    round_robin_cursor: usize,
    stats: PoolStats,
    in_flight: HashMap<EntityId, InFlight>,
}

impl Pool {
    /// Construct a pool and immediately spawn `min_workers` agents with
    /// default capabilities and resource limits for `config.agent_type`
    /// (§4.3 "On creation, the pool immediately spawns minWorkers agents").
    pub fn new(config: PoolConfig) -> Self {
        let min_workers = config.min_workers;
        let mut pool = Self {
            config,
            status: PoolStatus::Active,
            workers: HashMap::new(),
            order: Vec::new(),
            queue: VecDeque::new(),
            round_robin_cursor: 0,
            stats: PoolStats::default(),
            in_flight: HashMap::new(),
        };
        for _ in 0..min_workers {
            pool.spawn_worker();
        }
        info!(pool = %pool.config.name, workers = pool.workers.len(), "pool created");
        pool
    }

    /// The pool's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Current lifecycle status.
    pub fn status(&self) -> PoolStatus {
        self.status
    }

    /// Current worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Read-only view of one worker.
    pub fn worker(&self, id: EntityId) -> Option<&Agent> {
        self.workers.get(&id)
    }

    /// Current queue depth (tasks waiting for a free worker).
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Current running statistics.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Spawn one additional worker with default capabilities/resource
    /// limits for the pool's agent type, regardless of `max_workers`
    /// (callers driving elastic growth should consult `AutoScale` instead).
    pub fn spawn_worker(&mut self) -> EntityId {
        let mut agent = Agent::new(self.config.agent_type, DEFAULT_MAX_CONCURRENT_TASKS);
        agent.status = AgentStatus::Idle;
        let id = agent.id;
        self.workers.insert(id, agent);
        self.order.push(id);
        debug!(pool = %self.config.name, worker = %id, "spawned worker");
        id
    }

    fn worker_views(&self) -> Vec<Agent> {
        self.order
            .iter()
            .filter_map(|id| self.workers.get(id).cloned())
            .collect()
    }

    /// Distribute a task to a worker by the pool's configured strategy
    /// (§4.3 Task distribution). On success, the task joins the worker's
    /// `currentTasks` and the worker transitions to `busy`. When every
    /// worker is at capacity, the task is queued and `NoWorkersAvailable`
    /// is returned; the queue drains opportunistically on every
    /// `Complete`.
    pub fn distribute(&mut self, task: Task) -> Result<Assignment, PoolError> {
        if self.status != PoolStatus::Active {
            return Err(PoolError::PoolInactive);
        }

        let views = self.worker_views();
        let chosen = strategy::select(
            self.config.strategy,
            &views,
            &mut self.round_robin_cursor,
            &task.task_type,
        );

        let Some(worker_id) = chosen else {
            debug!(pool = %self.config.name, task = %task.id, "no worker available; queueing task");
            self.queue.push_back(task);
            return Err(PoolError::NoWorkersAvailable);
        };

        let estimated_completion_ms = self
            .workers
            .get(&worker_id)
            .and_then(|w| w.metric_for(&task.task_type))
            .map(|m| m.average_execution_time_ms.round() as u64)
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_ESTIMATED_COMPLETION_MS);

        let task_id = task.id;
        let task_type = task.task_type.clone();
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.current_tasks.push(task_id);
            worker.status = AgentStatus::Busy;
            worker.touch();
        }
        self.in_flight.insert(
            task_id,
            InFlight {
                worker_id,
                task_type,
            },
        );

        debug!(pool = %self.config.name, worker = %worker_id, task = %task_id, "distributed task");
        Ok(Assignment {
            worker_id,
            task_id,
            assigned_at: Utc::now(),
            estimated_completion_ms,
        })
    }

    /// Record a task's completion (§4.3 Completion). Transitions the owning
    /// worker back to `idle` once empty, updates pool counters and the
    /// running mean task time, and opportunistically drains the queue.
    pub fn complete(
        &mut self,
        task_id: EntityId,
        success: bool,
        execution_time_ms: Option<u64>,
    ) -> Result<(), PoolError> {
        let Some(InFlight {
            worker_id,
            task_type,
        }) = self.in_flight.remove(&task_id)
        else {
            return Err(PoolError::NotFound(task_id));
        };

        let quality_score = if success { 1.0 } else { 0.0 };
        let exec_ms = execution_time_ms.unwrap_or(0) as f64;

        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.current_tasks.retain(|t| *t != task_id);
            if worker.current_tasks.is_empty() {
                worker.status = AgentStatus::Idle;
            }
            worker.touch();
            match worker.performance_metrics.iter_mut().find(|m| m.task_type == task_type) {
                Some(metric) => metric.record(success, exec_ms, quality_score),
                None => {
                    let mut metric = PerformanceMetric::new(task_type);
                    metric.record(success, exec_ms, quality_score);
                    worker.performance_metrics.push(metric);
                }
            }
        }

        let n = (self.stats.total_tasks_processed + self.stats.total_tasks_failed) as f64;
        self.stats.avg_task_time_ms = (self.stats.avg_task_time_ms * n + exec_ms) / (n + 1.0);
        if success {
            self.stats.total_tasks_processed += 1;
        } else {
            self.stats.total_tasks_failed += 1;
        }

        debug!(pool = %self.config.name, task = %task_id, success, "task completed");
        self.drain_queue();
        Ok(())
    }

    fn drain_queue(&mut self) {
        while let Some(next) = self.queue.pop_front() {
            match self.distribute(next) {
                Ok(_) => continue,
                Err(PoolError::NoWorkersAvailable) => break,
                Err(_) => break,
            }
        }
    }

    /// Remove a worker. Fails with `WorkerBusy` if it has in-flight tasks
    /// (§4.3 Auto-scaling: "Busy workers are never removed").
    pub fn remove_worker(&mut self, id: EntityId) -> Result<(), PoolError> {
        let worker = self.workers.get(&id).ok_or(PoolError::NotFound(id))?;
        if !worker.current_tasks.is_empty() {
            return Err(PoolError::WorkerBusy(id));
        }
        self.workers.remove(&id);
        self.order.retain(|w| *w != id);
        debug!(pool = %self.config.name, worker = %id, "removed worker");
        Ok(())
    }

    /// Compute and apply one auto-scaling decision (§4.3 Auto-scaling).
    /// `utilization = tasksInFlight / (|workers| * maxPerWorker)`: spawns
    /// one worker above 0.8 utilization (below `max_workers`), removes one
    /// idle worker (oldest `lastActive`) below 0.2 utilization (above
    /// `min_workers`).
    pub fn auto_scale(&mut self) -> AutoScaleAction {
        let worker_count = self.workers.len();
        if worker_count == 0 {
            return AutoScaleAction::None;
        }
        let in_flight: usize = self.workers.values().map(|w| w.current_tasks.len()).sum();
        let capacity = (worker_count * DEFAULT_MAX_CONCURRENT_TASKS).max(1);
        let utilization = in_flight as f64 / capacity as f64;

        if utilization > 0.8 && worker_count < self.config.max_workers {
            let id = self.spawn_worker();
            info!(pool = %self.config.name, worker = %id, utilization, "scaled up");
            return AutoScaleAction::ScaledUp(id);
        }

        if utilization < 0.2 && worker_count > self.config.min_workers {
            let victim = self
                .order
                .iter()
                .filter_map(|id| self.workers.get(id))
                .filter(|w| w.current_tasks.is_empty())
                .min_by_key(|w| w.last_active)
                .map(|w| w.id);
            if let Some(id) = victim {
                let _ = self.remove_worker(id);
                info!(pool = %self.config.name, worker = %id, utilization, "scaled down");
                return AutoScaleAction::ScaledDown(id);
            }
        }

        AutoScaleAction::None
    }

    /// Pause the pool; it stops accepting `Distribute` until resumed.
    pub fn pause(&mut self) {
        self.status = PoolStatus::Paused;
    }

    /// Resume a paused pool.
    pub fn resume(&mut self) {
        if self.status == PoolStatus::Paused {
            self.status = PoolStatus::Active;
        }
    }

    /// Terminate the pool (§4.3 Termination): clears every worker and
    /// refuses all further distribution.
    pub fn terminate(&mut self) {
        self.status = PoolStatus::Terminated;
        self.workers.clear();
        self.order.clear();
        self.queue.clear();
        self.in_flight.clear();
        warn!(pool = %self.config.name, "pool terminated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(task_type: &str) -> Task {
        Task::new(task_type, "do the thing", 1)
    }

    #[test]
    fn creation_spawns_min_workers() {
        let pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation).with_min_workers(2));
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn scenario_least_loaded_distribution_and_completion() {
        let mut pool = Pool::new(
            PoolConfig::new("impl", AgentType::Implementation)
                .with_min_workers(2)
                .with_strategy(LoadBalanceStrategy::LeastLoaded),
        );
        let workers: Vec<EntityId> = pool.order.clone();
        let w1 = workers[0];
        let w2 = workers[1];

        let a1 = pool.distribute(task("t1")).unwrap();
        assert_eq!(a1.worker_id, w1);
        let a2 = pool.distribute(task("t2")).unwrap();
        assert_eq!(a2.worker_id, w2);

        let a3 = pool.distribute(task("t3")).unwrap();
        assert!(a3.worker_id == w1 || a3.worker_id == w2);

        pool.complete(a1.task_id, true, Some(500)).unwrap();
        let a4 = pool.distribute(task("t4")).unwrap();
        assert_eq!(a4.worker_id, w1);
    }

    #[test]
    fn distribute_queues_when_all_workers_at_capacity() {
        let mut pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation).with_min_workers(1));
        for i in 0..DEFAULT_MAX_CONCURRENT_TASKS {
            pool.distribute(task(&format!("t{i}"))).unwrap();
        }
        let err = pool.distribute(task("overflow")).unwrap_err();
        assert_eq!(err, PoolError::NoWorkersAvailable);
        assert_eq!(pool.queue_len(), 1);
    }

    #[test]
    fn completion_drains_queue() {
        let mut pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation).with_min_workers(1));
        let mut assignments = Vec::new();
        for i in 0..DEFAULT_MAX_CONCURRENT_TASKS {
            assignments.push(pool.distribute(task(&format!("t{i}"))).unwrap());
        }
        let overflow = task("overflow");
        let overflow_id = overflow.id;
        assert!(pool.distribute(overflow).is_err());
        assert_eq!(pool.queue_len(), 1);

        pool.complete(assignments[0].task_id, true, Some(100)).unwrap();
        assert_eq!(pool.queue_len(), 0);
        assert!(pool.worker(assignments[0].worker_id).unwrap().current_tasks.contains(&overflow_id));
    }

    #[test]
    fn distribute_rejected_when_pool_inactive() {
        let mut pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation));
        pool.pause();
        assert_eq!(pool.distribute(task("t")).unwrap_err(), PoolError::PoolInactive);
    }

    #[test]
    fn remove_worker_fails_when_busy() {
        let mut pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation).with_min_workers(1));
        let worker_id = pool.order[0];
        pool.distribute(task("t")).unwrap();
        assert_eq!(
            pool.remove_worker(worker_id).unwrap_err(),
            PoolError::WorkerBusy(worker_id)
        );
    }

    #[test]
    fn auto_scale_grows_when_saturated() {
        let mut pool = Pool::new(
            PoolConfig::new("impl", AgentType::Implementation)
                .with_min_workers(1)
                .with_max_workers(3),
        );
        for i in 0..DEFAULT_MAX_CONCURRENT_TASKS {
            pool.distribute(task(&format!("t{i}"))).unwrap();
        }
        assert!(matches!(pool.auto_scale(), AutoScaleAction::ScaledUp(_)));
    }

    #[test]
    fn auto_scale_never_removes_below_min_workers() {
        let mut pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation).with_min_workers(2));
        assert_eq!(pool.auto_scale(), AutoScaleAction::None);
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn terminate_clears_workers_and_refuses_dispatch() {
        let mut pool = Pool::new(PoolConfig::new("impl", AgentType::Implementation));
        pool.terminate();
        assert_eq!(pool.worker_count(), 0);
        assert_eq!(pool.distribute(task("t")).unwrap_err(), PoolError::PoolInactive);
    }
}
