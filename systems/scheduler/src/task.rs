//! Contract between the scheduler and the behaviours it manages.
//!
//! A [`Task`] describes one agent role: how many agents the role wants,
//! which body to request, and what those agents do while alive. The
//! scheduler owns the registered tasks and drives them through
//! [`TaskContext`] handles each tick.

use colony_core::{AgentRecord, BodyTemplate, ColonyName, Host, Role, TaskFault};
use colony_world::WorldCache;

use crate::watcher::AgentSnapshot;

/// Per-call view handed to task callbacks.
///
/// Borrows the host and the world cache mutably so a task can both read
/// cached state and issue commands through the host.
pub struct TaskContext<'a, H: Host> {
    /// Authoritative environment.
    pub host: &'a mut H,
    /// Cached world state, already refreshed for the current tick.
    pub cache: &'a mut WorldCache,
    /// Colony the callback is being evaluated for.
    pub colony: &'a ColonyName,
    /// Tick at which the callback runs.
    pub tick: u64,
}

/// A role-specific behaviour registered with the scheduler.
///
/// Registration order doubles as the tiebreaker between requests of
/// equal rank, so callers should register their most important tasks
/// first.
pub trait Task<H: Host> {
    /// Role tag stamped on every agent this task produces.
    fn role(&self) -> Role;

    /// Queue rank for this task's spawn requests. Lower values drain
    /// first; any negative value outranks every non-negative one.
    fn rank(&self) -> i32;

    /// Maximum number of live agents this task may hold at once.
    fn cap(&self) -> usize;

    /// Live agents currently attributed to this task, as counted by the
    /// scheduler at the start of the tick.
    fn live_count(&self) -> usize;

    /// Overwrites the live count. Called by the scheduler only.
    fn set_live_count(&mut self, count: usize);

    /// Ideal body composition for this role. The scheduler shrinks it
    /// to whatever the colony's energy budget allows.
    fn skeleton(&self) -> BodyTemplate;

    /// Whether the task wants another agent right now. Must not depend
    /// on call count: asking twice in the same tick has to give the
    /// same answer.
    fn spawn_check(&mut self, ctx: &mut TaskContext<'_, H>) -> Result<bool, TaskFault>;

    /// One-time setup when an agent first comes under management,
    /// including again after a scheduler restart. Must be safe to call
    /// a second time for the same agent.
    fn start_logic(&mut self, ctx: &mut TaskContext<'_, H>, agent: &AgentRecord)
        -> Result<(), TaskFault>;

    /// Per-tick behaviour for one live agent.
    fn run_logic(&mut self, ctx: &mut TaskContext<'_, H>, agent: &AgentRecord)
        -> Result<(), TaskFault>;

    /// Cleanup after an agent has ceased to exist. Only the snapshot
    /// taken at wrap time is available; the agent itself is gone.
    fn destroy_logic(&mut self, snapshot: &AgentSnapshot) -> Result<(), TaskFault>;
}
