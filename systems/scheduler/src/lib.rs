//! Priority-driven agent production and lifecycle management.
//!
//! The scheduler owns a set of registered [`Task`]s and, each tick and
//! for each visible colony, recovers agents that lost their watchers,
//! drives every live agent through its task logic, polls the tasks for
//! new spawn demand and drains at most one request from the head of the
//! colony's priority queue into an actual production attempt.

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

pub mod queue;
pub mod task;
pub mod watcher;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use colony_core::{
    AgentId, AgentTags, ColonyName, ColonyState, Host, ProduceStatus, Role, StructureId,
    StructureKind,
};
use colony_system_allocator::compose;
use colony_world::WorldCache;

pub use crate::queue::SortableQueue;
pub use crate::task::{Task, TaskContext};
pub use crate::watcher::{AgentSnapshot, LifecycleWatcher};

/// One queued demand for an agent of some role.
#[derive(Debug, Clone, Copy)]
struct SpawnRequest {
    /// Index of the requesting task in the registration order.
    task: usize,
    /// Value of the role's request counter when this request was issued.
    id: u32,
    /// Rank frozen at enqueue time.
    rank: i32,
}

/// Ordering key for spawn requests. Every negative rank maps to the
/// same maximal key, so negative-ranked requests beat all others and
/// keep arrival order among themselves.
fn rank_key(rank: i32) -> (u8, i32) {
    if rank < 0 {
        (0, 0)
    } else {
        (1, rank)
    }
}

fn compare_requests(left: &SpawnRequest, right: &SpawnRequest) -> Ordering {
    rank_key(left.rank).cmp(&rank_key(right.rank))
}

/// Per-colony scheduling state.
struct ColonyScheduler {
    queue: SortableQueue<SpawnRequest>,
    watchers: BTreeMap<AgentId, LifecycleWatcher>,
    counters: BTreeMap<Role, u32>,
}

impl ColonyScheduler {
    fn new(counters: BTreeMap<Role, u32>) -> Self {
        Self {
            queue: SortableQueue::new(),
            watchers: BTreeMap::new(),
            counters,
        }
    }
}

/// Drives registered tasks across every colony the host exposes.
pub struct Scheduler<H: Host> {
    tasks: Vec<Box<dyn Task<H>>>,
    colonies: BTreeMap<ColonyName, ColonyScheduler>,
    faults_observed: u64,
}

impl<H: Host> Scheduler<H> {
    /// Creates a scheduler with no registered tasks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            colonies: BTreeMap::new(),
            faults_observed: 0,
        }
    }

    /// Registers a task. Registration order is the tiebreaker between
    /// requests of equal rank, so register the most important tasks
    /// first.
    pub fn register(&mut self, task: Box<dyn Task<H>>) {
        self.tasks.push(task);
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn-boundary faults contained so far. A faulting spawn check
    /// is logged and counted here; at the polling step it reads as no
    /// demand, and at the queue head it marks the request satisfied so
    /// a broken task cannot wedge the colony.
    #[must_use]
    pub const fn faults_observed(&self) -> u64 {
        self.faults_observed
    }

    /// Whether the scheduler has started managing the colony.
    #[must_use]
    pub fn is_colony_known(&self, colony: &ColonyName) -> bool {
        self.colonies.contains_key(colony)
    }

    /// Live watchers currently attached to agents of the colony.
    #[must_use]
    pub fn watcher_count(&self, colony: &ColonyName) -> usize {
        self.colonies
            .get(colony)
            .map_or(0, |record| record.watchers.len())
    }

    /// Requests of the given role still sitting in the colony's queue.
    #[must_use]
    pub fn pending_requests(&self, colony: &ColonyName, role: &Role) -> usize {
        let Some(record) = self.colonies.get(colony) else {
            return 0;
        };
        record
            .queue
            .iter()
            .filter(|request| self.tasks[request.task].role() == *role)
            .count()
    }

    /// Runs one full scheduling pass over every visible colony.
    pub fn tick(&mut self, host: &mut H, cache: &mut WorldCache) {
        let tick = host.tick();
        for colony in host.colonies() {
            cache.refresh(host, &colony);
            self.process_colony(host, cache, &colony, tick);
        }
    }

    fn process_colony(
        &mut self,
        host: &mut H,
        cache: &mut WorldCache,
        colony: &ColonyName,
        tick: u64,
    ) {
        let facility = cache
            .structures(host, colony, &[StructureKind::Facility])
            .into_iter()
            .map(|record| record.id)
            .next();

        if !self.colonies.contains_key(colony) {
            // A colony only comes under management once a production
            // facility is sighted in it.
            if facility.is_none() {
                return;
            }
            let counters = host
                .colony_state(colony)
                .map(|state| state.request_counters)
                .unwrap_or_default();
            let mut store = ColonyScheduler::new(BTreeMap::new());
            // Counters persist across restarts but queued requests do
            // not; each restored counter is turned back into a live
            // request so its role cannot be starved by a counter with
            // nothing left to drain. Counters whose role matches no
            // registered task are dropped.
            for (role, issued) in counters {
                let Some(task) = self
                    .tasks
                    .iter()
                    .position(|task| task.role() == role)
                else {
                    log::warn!(
                        "dropping persisted counter for unknown role {}",
                        role.as_str()
                    );
                    continue;
                };
                store.queue.push(SpawnRequest {
                    task,
                    id: issued,
                    rank: self.tasks[task].rank(),
                });
                let _ = store.counters.insert(role, issued);
            }
            let _ = self.colonies.insert(colony.clone(), store);
            log::info!("managing colony {}", colony.as_str());
        }

        self.recover_agents(host, cache, colony, tick);
        self.run_watchers(host, cache, colony, tick);
        self.refresh_live_counts(host, cache, colony);
        let mut dirty = self.enqueue_requests(host, cache, colony, tick);
        if let Some(facility) = facility {
            dirty |= self.drain_queue(host, cache, colony, facility, tick);
        }
        if dirty {
            self.persist_counters(host, colony);
        }
    }

    /// Adopts agents that carry tags but have no watcher, as happens
    /// for every live agent right after a process restart. Agents still
    /// materializing are left for a later tick so setup sees a finished
    /// body.
    fn recover_agents(
        &mut self,
        host: &mut H,
        cache: &mut WorldCache,
        colony: &ColonyName,
        tick: u64,
    ) {
        let records = cache.agents(host, colony, None);
        for record in records {
            if record.materializing || self.has_watcher(record.id) {
                continue;
            }
            let Some(tags) = host.agent_tags(record.id) else {
                continue;
            };
            let Some(task_index) = self
                .tasks
                .iter()
                .position(|task| task.role() == tags.role)
            else {
                log::warn!(
                    "agent {} carries unknown role {}",
                    record.name,
                    tags.role.as_str()
                );
                continue;
            };
            let Self {
                tasks, colonies, ..
            } = self;
            let watcher = {
                let mut ctx = TaskContext {
                    host,
                    cache,
                    colony,
                    tick,
                };
                LifecycleWatcher::wrap(
                    &record,
                    tags.role.clone(),
                    task_index,
                    tasks[task_index].as_mut(),
                    &mut ctx,
                )
            };
            if let Some(store) = colonies.get_mut(colony) {
                let _ = store.watchers.insert(record.id, watcher);
            }
        }
    }

    fn has_watcher(&self, id: AgentId) -> bool {
        self.colonies
            .values()
            .any(|record| record.watchers.contains_key(&id))
    }

    /// Runs every watcher of the colony exactly once. Watchers whose
    /// agent no longer exists fire their cleanup, are dropped and take
    /// the agent's orphaned tags with them.
    fn run_watchers(
        &mut self,
        host: &mut H,
        cache: &mut WorldCache,
        colony: &ColonyName,
        tick: u64,
    ) {
        let Self {
            tasks, colonies, ..
        } = self;
        let Some(store) = colonies.get_mut(colony) else {
            return;
        };
        let mut dead = Vec::new();
        for (id, watcher) in store.watchers.iter_mut() {
            let task = tasks[watcher.task_index()].as_mut();
            let mut ctx = TaskContext {
                host,
                cache,
                colony,
                tick,
            };
            if !watcher.on_run(task, &mut ctx) {
                dead.push(*id);
            }
        }
        for id in dead {
            let _ = store.watchers.remove(&id);
            host.remove_agent_tags(id);
        }
    }

    /// Counts live tagged agents per role and writes the counts into
    /// the tasks, so spawn checks and the cap gate see the same
    /// numbers.
    fn refresh_live_counts(&mut self, host: &mut H, cache: &mut WorldCache, colony: &ColonyName) {
        for task in &mut self.tasks {
            let role = task.role();
            let live = cache.agents(host, colony, Some(&role)).len();
            task.set_live_count(live);
        }
    }

    /// Polls every task in registration order and queues a request for
    /// each task that wants an agent and still has an open slot under
    /// its cap. Returns whether any counter changed.
    fn enqueue_requests(
        &mut self,
        host: &mut H,
        cache: &mut WorldCache,
        colony: &ColonyName,
        tick: u64,
    ) -> bool {
        let Self {
            tasks,
            colonies,
            faults_observed,
        } = self;
        let Some(store) = colonies.get_mut(colony) else {
            return false;
        };
        let mut dirty = false;
        for (index, task) in tasks.iter_mut().enumerate() {
            let wants_agent = {
                let mut ctx = TaskContext {
                    host,
                    cache,
                    colony,
                    tick,
                };
                task.spawn_check(&mut ctx)
            };
            let role = task.role();
            match wants_agent {
                Ok(true) => {
                    let issued = store.counters.entry(role).or_insert(0);
                    let open_slots = task.cap().saturating_sub(task.live_count());
                    if (*issued as usize) < open_slots {
                        *issued += 1;
                        store.queue.push(SpawnRequest {
                            task: index,
                            id: *issued,
                            rank: task.rank(),
                        });
                        dirty = true;
                    }
                }
                Ok(false) => {}
                Err(fault) => {
                    log::warn!(
                        "spawn check fault for role {}: {fault}",
                        role.as_str()
                    );
                    *faults_observed += 1;
                }
            }
        }
        store.queue.sort_by(compare_requests);
        dirty
    }

    /// Attempts to satisfy the head request of the colony's queue, then
    /// decides whether the head is complete and can be popped. At most
    /// one production attempt is made per colony per tick. Returns
    /// whether any counter changed.
    fn drain_queue(
        &mut self,
        host: &mut H,
        cache: &mut WorldCache,
        colony: &ColonyName,
        facility: StructureId,
        tick: u64,
    ) -> bool {
        let Self {
            tasks,
            colonies,
            faults_observed,
        } = self;
        let Some(store) = colonies.get_mut(colony) else {
            return false;
        };
        let Some(request) = store.queue.peek().copied() else {
            return false;
        };
        let task = tasks[request.task].as_mut();
        let role = task.role();

        // A request leaves the queue only once its task stops asking
        // for agents; while it still asks, one production attempt is
        // made. A faulting check counts as satisfied so a broken task
        // cannot wedge the queue head forever.
        let complete = {
            let mut ctx = TaskContext {
                host,
                cache,
                colony,
                tick,
            };
            match task.spawn_check(&mut ctx) {
                Ok(wants_agent) => !wants_agent,
                Err(fault) => {
                    log::warn!(
                        "spawn check fault for role {}: {fault}",
                        role.as_str()
                    );
                    *faults_observed += 1;
                    true
                }
            }
        };
        if !complete {
            let body = compose(&task.skeleton(), host.energy_budget(colony));
            if body.is_empty() {
                log::trace!(
                    "budget too low for any {} body in {}",
                    role.as_str(),
                    colony.as_str()
                );
            } else {
                let name = format!("{}-{}-{}", role.as_str(), colony.as_str(), tick);
                let tags = AgentTags::initial(role.clone(), colony.clone());
                match host.produce_agent(facility, &body, &name, tags) {
                    ProduceStatus::Produced => {
                        log::debug!("producing {} in {}", name, colony.as_str());
                    }
                    status => {
                        log::trace!(
                            "production of {} deferred in {}: {status:?}",
                            role.as_str(),
                            colony.as_str()
                        );
                    }
                }
            }
            return false;
        }

        let last_issued = store.counters.get(&role).copied() == Some(request.id);
        let _ = store.queue.pop();
        if last_issued {
            let _ = store.counters.remove(&role);
            true
        } else {
            // A stale id means newer requests for the role were issued
            // after this one; the counter stays until the newest one
            // completes.
            false
        }
    }

    fn persist_counters(&self, host: &mut H, colony: &ColonyName) {
        let Some(store) = self.colonies.get(colony) else {
            return;
        };
        let state = ColonyState {
            request_counters: store.counters.clone(),
        };
        host.store_colony_state(colony, &state);
    }
}

impl<H: Host> Default for Scheduler<H> {
    fn default() -> Self {
        Self::new()
    }
}
