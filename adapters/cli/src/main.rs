#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a simulated colony end to end.
//!
//! Boots a demonstration colony on the simulated host, registers a
//! worker and a sentry role, and drives the scheduler for a fixed
//! number of ticks while printing a per-tick population summary.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use colony_core::{
    AgentRecord, BodyTemplate, ColonyName, Energy, Host, Identity, PartKind, Role,
    StructureKind, TaskFault,
};
use colony_system_allocator::compose;
use colony_system_scheduler::{AgentSnapshot, Scheduler, Task, TaskContext};
use colony_world::sim::SimHost;
use colony_world::{CacheConfig, WorldCache};

/// Command-line arguments for the colony simulation.
#[derive(Debug, Parser)]
#[command(name = "colony", about = "Runs a simulated colony for a fixed number of ticks")]
struct Args {
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 40)]
    ticks: u64,

    /// Energy capacity and per-tick regeneration of the demo colony.
    #[arg(long, default_value_t = 550)]
    agent_budget: u32,

    /// Prints per-agent scheduling detail instead of the summary only.
    #[arg(long)]
    verbose: bool,
}

/// Gathers energy from resource nodes and hauls it home.
struct WorkerTask {
    role: Role,
    cap: usize,
    live: usize,
}

impl WorkerTask {
    fn new(cap: usize) -> Self {
        Self {
            role: Role::new("worker"),
            cap,
            live: 0,
        }
    }
}

impl Task<SimHost> for WorkerTask {
    fn role(&self) -> Role {
        self.role.clone()
    }

    fn rank(&self) -> i32 {
        1
    }

    fn cap(&self) -> usize {
        self.cap
    }

    fn live_count(&self) -> usize {
        self.live
    }

    fn set_live_count(&mut self, count: usize) {
        self.live = count;
    }

    fn skeleton(&self) -> BodyTemplate {
        BodyTemplate::new()
            .with(PartKind::Work, 3)
            .with(PartKind::Carry, 4)
            .with(PartKind::Move, 4)
    }

    fn spawn_check(&mut self, _ctx: &mut TaskContext<'_, SimHost>) -> Result<bool, TaskFault> {
        Ok(self.live < self.cap)
    }

    fn start_logic(
        &mut self,
        ctx: &mut TaskContext<'_, SimHost>,
        agent: &AgentRecord,
    ) -> Result<(), TaskFault> {
        log::info!("worker {} reporting for duty", agent.name);
        // Pin each worker to a concrete node so repeated setup calls
        // after a restart land on the same assignment.
        let mut tags = ctx
            .host
            .agent_tags(agent.id)
            .ok_or_else(|| TaskFault::MissingObject {
                id: agent.name.clone(),
            })?;
        if tags.assigned_target.is_none() {
            let nodes = ctx.cache.resource_nodes(ctx.host, ctx.colony);
            tags.assigned_target = nodes
                .first()
                .map(|node| node.id.get().to_string());
            ctx.host.set_agent_tags(agent.id, tags);
        }
        Ok(())
    }

    fn run_logic(
        &mut self,
        ctx: &mut TaskContext<'_, SimHost>,
        agent: &AgentRecord,
    ) -> Result<(), TaskFault> {
        let mut tags = ctx
            .host
            .agent_tags(agent.id)
            .ok_or_else(|| TaskFault::MissingObject {
                id: agent.name.clone(),
            })?;
        // Release the node claim near end of life so a successor can
        // take it over without waiting for the tag sweep.
        if agent.lifespan < 50 && tags.assigned_target.is_some() {
            log::info!("worker {} releasing its node claim", agent.name);
            tags.assigned_target = None;
            ctx.host.set_agent_tags(agent.id, tags);
            return Ok(());
        }
        match &tags.assigned_target {
            Some(target) => log::debug!("worker {} gathering at node {target}", agent.name),
            None => log::debug!("worker {} idle, no node assigned", agent.name),
        }
        Ok(())
    }

    fn destroy_logic(&mut self, snapshot: &AgentSnapshot) -> Result<(), TaskFault> {
        log::info!("worker {} expired", snapshot.name);
        Ok(())
    }
}

/// Stands guard and is only requested while hostiles are present.
struct SentryTask {
    role: Role,
    cap: usize,
    live: usize,
}

impl SentryTask {
    fn new(cap: usize) -> Self {
        Self {
            role: Role::new("sentry"),
            cap,
            live: 0,
        }
    }
}

impl Task<SimHost> for SentryTask {
    fn role(&self) -> Role {
        self.role.clone()
    }

    fn rank(&self) -> i32 {
        // Defence outranks every economic request.
        -1
    }

    fn cap(&self) -> usize {
        self.cap
    }

    fn live_count(&self) -> usize {
        self.live
    }

    fn set_live_count(&mut self, count: usize) {
        self.live = count;
    }

    fn skeleton(&self) -> BodyTemplate {
        BodyTemplate::new()
            .with(PartKind::Tough, 2)
            .with(PartKind::Attack, 3)
            .with(PartKind::Move, 3)
    }

    fn spawn_check(&mut self, ctx: &mut TaskContext<'_, SimHost>) -> Result<bool, TaskFault> {
        let threatened = ctx.cache.is_under_attack(ctx.host, ctx.colony);
        Ok(threatened && self.live < self.cap)
    }

    fn start_logic(
        &mut self,
        _ctx: &mut TaskContext<'_, SimHost>,
        agent: &AgentRecord,
    ) -> Result<(), TaskFault> {
        log::info!("sentry {} on watch", agent.name);
        Ok(())
    }

    fn run_logic(
        &mut self,
        ctx: &mut TaskContext<'_, SimHost>,
        agent: &AgentRecord,
    ) -> Result<(), TaskFault> {
        let hostiles = ctx
            .cache
            .hostile_agents(ctx.host, ctx.colony, &[PartKind::Attack]);
        match hostiles.first() {
            Some(raider) => log::debug!("sentry {} engaging {}", agent.name, raider.name),
            None => log::debug!("sentry {} patrolling", agent.name),
        }
        Ok(())
    }

    fn destroy_logic(&mut self, snapshot: &AgentSnapshot) -> Result<(), TaskFault> {
        log::info!("sentry {} expired", snapshot.name);
        Ok(())
    }
}

/// Builds the demonstration colony: one production facility, a few
/// extensions, two resource nodes and an energy pool sized from the
/// requested budget.
fn build_demo_world(colony: &ColonyName, owner: &Identity, budget: Energy) -> SimHost {
    let mut host = SimHost::new();
    host.add_colony(colony.clone(), owner.clone(), budget, budget);
    host.set_energy(colony, budget);
    let _ = host.add_structure(colony, StructureKind::Facility, Some(owner.clone()));
    for _ in 0..4 {
        let _ = host.add_structure(colony, StructureKind::Extension, Some(owner.clone()));
    }
    let _ = host.add_structure(colony, StructureKind::Container, None);
    let _ = host.add_resource_node(colony, Energy::new(3_000));
    let _ = host.add_resource_node(colony, Energy::new(3_000));
    host
}

fn print_summary(
    host: &SimHost,
    cache: &mut WorldCache,
    scheduler: &Scheduler<SimHost>,
    colony: &ColonyName,
    tick: u64,
) {
    let workers = cache.agents(host, colony, Some(&Role::new("worker"))).len();
    let sentries = cache.agents(host, colony, Some(&Role::new("sentry"))).len();
    let hostiles = cache.hostile_agents(host, colony, &[]).len();
    let pending = scheduler.pending_requests(colony, &Role::new("worker"))
        + scheduler.pending_requests(colony, &Role::new("sentry"));
    println!(
        "tick {tick:>3} | workers {workers} | sentries {sentries} | hostiles {hostiles} \
         | queued {pending} | energy {}",
        host.energy_budget(colony).get()
    );
}

/// Entry point for the colony command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let owner = Identity::new("overmind");
    let colony = ColonyName::new("north");
    let budget = Energy::new(args.agent_budget);
    let mut host = build_demo_world(&colony, &owner, budget);
    let mut cache = WorldCache::new(CacheConfig::new(owner));
    let mut scheduler = Scheduler::new();
    scheduler.register(Box::new(WorkerTask::new(3)));
    scheduler.register(Box::new(SentryTask::new(2)));

    let worker_body = compose(&WorkerTask::new(3).skeleton(), budget);
    println!(
        "budget {} affords a {}-part worker body",
        budget.get(),
        worker_body.len()
    );

    let raider_arrival = args.ticks / 2;
    for tick in 0..args.ticks {
        scheduler.tick(&mut host, &mut cache);
        print_summary(&host, &mut cache, &scheduler, &colony, tick);
        if tick == raider_arrival {
            let _ = host.insert_agent(
                &colony,
                Identity::new("invader"),
                "raider-1",
                None,
                12,
                vec![PartKind::Tough, PartKind::Attack, PartKind::Move],
            );
            println!("tick {tick:>3} | a raider has entered the colony");
        }
        host.advance();
    }

    println!(
        "simulation complete: {} agents live, {} spawn faults observed",
        host.agent_count(),
        scheduler.faults_observed()
    );
    Ok(())
}
