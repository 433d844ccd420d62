//! Lifecycle tracking for individual agents.
//!
//! A [`LifecycleWatcher`] is created the moment an agent comes under
//! management and lives exactly as long as the agent does. Each tick it
//! either resolves the agent and runs its task logic, or detects that
//! the agent is gone and fires the task's cleanup exactly once.

use colony_core::{AgentId, AgentRecord, ColonyName, Host, Identity, Role};

use crate::task::{Task, TaskContext};

/// Identifying facts about an agent, captured when its watcher was
/// created. Survives the agent so cleanup still knows who it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Stable agent id.
    pub id: AgentId,
    /// Name the agent was produced under.
    pub name: String,
    /// Colony the agent belonged to when the watcher was created.
    pub origin_colony: ColonyName,
    /// Player that owned the agent.
    pub owner: Identity,
    /// Role the agent was serving.
    pub role: Role,
}

/// Tracks one agent from adoption to cleanup.
#[derive(Debug)]
pub struct LifecycleWatcher {
    snapshot: AgentSnapshot,
    current_colony: ColonyName,
    task_index: usize,
}

impl LifecycleWatcher {
    /// Wraps a live agent, snapshotting its identity and running the
    /// task's one-time setup. A setup fault is logged and contained;
    /// the watcher is created regardless.
    pub fn wrap<H: Host>(
        record: &AgentRecord,
        role: Role,
        task_index: usize,
        task: &mut dyn Task<H>,
        ctx: &mut TaskContext<'_, H>,
    ) -> Self {
        let snapshot = AgentSnapshot {
            id: record.id,
            name: record.name.clone(),
            origin_colony: record.colony.clone(),
            owner: record.owner.clone(),
            role,
        };
        let watcher = Self {
            current_colony: record.colony.clone(),
            task_index,
            snapshot,
        };
        if let Err(fault) = task.start_logic(ctx, record) {
            log::warn!(
                "setup fault for agent {} ({}): {fault}",
                record.name,
                watcher.snapshot.role.as_str()
            );
        }
        watcher
    }

    /// Drives the watched agent for one tick.
    ///
    /// Resolves the agent by id through the host. If it still exists
    /// its task logic runs (skipped while the agent is materializing)
    /// and `true` comes back. If it is gone the task's cleanup fires
    /// with the stored snapshot and `false` signals the watcher should
    /// be dropped.
    pub fn on_run<H: Host>(
        &mut self,
        task: &mut dyn Task<H>,
        ctx: &mut TaskContext<'_, H>,
    ) -> bool {
        match ctx.host.agent(self.snapshot.id) {
            Some(record) => {
                if !record.materializing {
                    self.current_colony = record.colony.clone();
                    if let Err(fault) = task.run_logic(ctx, &record) {
                        log::warn!(
                            "run fault for agent {} ({}): {fault}",
                            record.name,
                            self.snapshot.role.as_str()
                        );
                    }
                }
                true
            }
            None => {
                if let Err(fault) = task.destroy_logic(&self.snapshot) {
                    log::warn!(
                        "cleanup fault for agent {} ({}): {fault}",
                        self.snapshot.name,
                        self.snapshot.role.as_str()
                    );
                }
                false
            }
        }
    }

    /// Identity captured at wrap time.
    #[must_use]
    pub fn snapshot(&self) -> &AgentSnapshot {
        &self.snapshot
    }

    /// Colony the agent was last seen in.
    #[must_use]
    pub fn current_colony(&self) -> &ColonyName {
        &self.current_colony
    }

    /// Index of the task that owns this agent.
    #[must_use]
    pub const fn task_index(&self) -> usize {
        self.task_index
    }
}
