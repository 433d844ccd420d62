//! End-to-end coverage for the spawn scheduler against the simulated
//! host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use colony_core::{
    BodyTemplate, ColonyName, Energy, Host, Identity, PartKind, Role, TaskFault,
};
use colony_system_scheduler::{AgentSnapshot, Scheduler, Task, TaskContext};
use colony_world::sim::SimHost;
use colony_world::{CacheConfig, WorldCache};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Started(String),
    Ran(String),
    Destroyed(String),
}

type EventLog = Rc<RefCell<Vec<Event>>>;

/// Role behaviour with scripted demand: wants agents while the live
/// count sits under the cap, and records every lifecycle hook it
/// receives.
struct ScriptedTask {
    role: Role,
    rank: i32,
    cap: usize,
    live: usize,
    skeleton: BodyTemplate,
    fault_switch: Rc<Cell<bool>>,
    log: EventLog,
}

impl ScriptedTask {
    fn new(role: &str, rank: i32, cap: usize, log: EventLog) -> Self {
        Self {
            role: Role::new(role),
            rank,
            cap,
            live: 0,
            skeleton: BodyTemplate::new()
                .with(PartKind::Work, 2)
                .with(PartKind::Carry, 2)
                .with(PartKind::Move, 2),
            fault_switch: Rc::default(),
            log,
        }
    }

    fn failing(role: &str, rank: i32, cap: usize, log: EventLog) -> Self {
        let task = Self::new(role, rank, cap, log);
        task.fault_switch.set(true);
        task
    }
}

impl Task<SimHost> for ScriptedTask {
    fn role(&self) -> Role {
        self.role.clone()
    }

    fn rank(&self) -> i32 {
        self.rank
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
        self.skeleton.clone()
    }

    fn spawn_check(&mut self, _ctx: &mut TaskContext<'_, SimHost>) -> Result<bool, TaskFault> {
        if self.fault_switch.get() {
            return Err(TaskFault::Logic("sensor offline".to_owned()));
        }
        Ok(self.live < self.cap)
    }

    fn start_logic(
        &mut self,
        _ctx: &mut TaskContext<'_, SimHost>,
        agent: &colony_core::AgentRecord,
    ) -> Result<(), TaskFault> {
        self.log.borrow_mut().push(Event::Started(agent.name.clone()));
        Ok(())
    }

    fn run_logic(
        &mut self,
        _ctx: &mut TaskContext<'_, SimHost>,
        agent: &colony_core::AgentRecord,
    ) -> Result<(), TaskFault> {
        self.log.borrow_mut().push(Event::Ran(agent.name.clone()));
        Ok(())
    }

    fn destroy_logic(&mut self, snapshot: &AgentSnapshot) -> Result<(), TaskFault> {
        self.log
            .borrow_mut()
            .push(Event::Destroyed(snapshot.name.clone()));
        Ok(())
    }
}

fn us() -> Identity {
    Identity::new("overmind")
}

fn colony() -> ColonyName {
    ColonyName::new("north")
}

/// One managed colony with a facility and enough regen to afford one
/// six-part worker body per tick.
fn host_with_facility() -> SimHost {
    let mut host = SimHost::new();
    host.add_colony(colony(), us(), Energy::new(300), Energy::new(300));
    host.set_energy(&colony(), Energy::new(300));
    let _ = host.add_structure(&colony(), colony_core::StructureKind::Facility, Some(us()));
    host
}

fn fresh_cache() -> WorldCache {
    WorldCache::new(CacheConfig::new(us()))
}

fn count<F: Fn(&Event) -> bool>(log: &EventLog, predicate: F) -> usize {
    log.borrow().iter().filter(|event| predicate(event)).count()
}

#[test]
fn fills_a_role_up_to_its_cap_and_stops() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    let role = Role::new("harvester");
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));

    for _ in 0..6 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }

    assert_eq!(host.agent_count(), 2);
    assert_eq!(scheduler.watcher_count(&colony()), 2);
    assert_eq!(scheduler.pending_requests(&colony(), &role), 0);
    assert_eq!(count(&log, |event| matches!(event, Event::Started(_))), 2);
    // The satisfied request also cleared its persisted counter.
    let state = host.colony_state(&colony()).unwrap_or_default();
    assert!(state.request_counters.is_empty());
}

#[test]
fn pending_requests_stay_bounded_by_the_cap() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    let role = Role::new("harvester");
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 3, log)));

    for _ in 0..10 {
        scheduler.tick(&mut host, &mut cache);
        // Requests are only issued while the counter sits under
        // cap minus live, so the queue can never hold more than cap.
        assert!(scheduler.pending_requests(&colony(), &role) <= 3);
        host.advance();
    }
    assert_eq!(host.agent_count(), 3);
    assert_eq!(scheduler.pending_requests(&colony(), &role), 0);
}

#[test]
fn produces_at_most_one_agent_per_colony_per_tick() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));
    scheduler.register(Box::new(ScriptedTask::new("sentry", 2, 2, log)));

    let mut previous = host.agent_count();
    for _ in 0..12 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
        let current = host.agent_count();
        assert!(current <= previous + 1);
        previous = current;
    }
    assert_eq!(host.agent_count(), 4);
}

#[test]
fn negative_rank_preempts_lower_priorities() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    // Registered first, so only rank can explain the sentry going first.
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));
    scheduler.register(Box::new(ScriptedTask::new("sentry", -1, 1, log)));

    scheduler.tick(&mut host, &mut cache);

    let produced = host.scan_agents(&colony());
    assert_eq!(produced.len(), 1);
    assert!(produced[0].name.starts_with("sentry-"));
}

#[test]
fn restart_recovers_agents_without_duplicates() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let log: EventLog = Rc::default();
    {
        let mut scheduler = Scheduler::new();
        scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));
        for _ in 0..6 {
            scheduler.tick(&mut host, &mut cache);
            host.advance();
        }
        assert_eq!(host.agent_count(), 2);
    }

    // Fresh scheduler and cache, same world: a process restart.
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));
    for _ in 0..4 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }

    assert_eq!(host.agent_count(), 2);
    assert_eq!(scheduler.watcher_count(&colony()), 2);
    // Setup ran once per agent per process lifetime: twice in total.
    assert_eq!(count(&log, |event| matches!(event, Event::Started(_))), 4);
}

#[test]
fn spawn_check_faults_are_contained_and_counted() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    scheduler.register(Box::new(ScriptedTask::failing("oracle", -1, 2, log.clone())));
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log)));

    for _ in 0..6 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }

    assert!(scheduler.faults_observed() > 0);
    // The healthy task was not starved by its faulting neighbour.
    let produced = host.scan_agents(&colony());
    assert_eq!(produced.len(), 2);
    assert!(produced.iter().all(|agent| agent.name.starts_with("harvester-")));
}

#[test]
fn a_fault_at_the_queue_head_releases_the_request() {
    let mut host = host_with_facility();
    // No budget, so the queued request lingers at the head.
    host.set_energy(&colony(), Energy::ZERO);
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    let role = Role::new("harvester");
    let task = ScriptedTask::new("harvester", 1, 1, log);
    let switch = Rc::clone(&task.fault_switch);
    scheduler.register(Box::new(task));

    scheduler.tick(&mut host, &mut cache);
    assert_eq!(scheduler.pending_requests(&colony(), &role), 1);
    assert_eq!(scheduler.faults_observed(), 0);

    // The task starts faulting after its request was issued. The head
    // counts as satisfied, so the queue and the persisted counter both
    // clear instead of wedging the colony.
    switch.set(true);
    scheduler.tick(&mut host, &mut cache);

    assert_eq!(scheduler.pending_requests(&colony(), &role), 0);
    assert_eq!(scheduler.faults_observed(), 2);
    let state = host.colony_state(&colony()).unwrap_or_default();
    assert!(state.request_counters.is_empty());
    assert_eq!(host.agent_count(), 0);
}

#[test]
fn destroy_fires_exactly_once_with_no_run_afterwards() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 1, log.clone())));

    for _ in 0..3 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }
    let records = host.scan_agents(&colony());
    assert_eq!(records.len(), 1);
    let victim = records[0].id;
    let victim_name = records[0].name.clone();

    host.remove_agent(victim);
    scheduler.tick(&mut host, &mut cache);

    let destroyed = |event: &Event| *event == Event::Destroyed(victim_name.clone());
    assert_eq!(count(&log, &destroyed), 1);
    assert!(!host.has_tags(victim));

    // Further ticks neither destroy again nor run the dead agent.
    let runs_before = count(&log, |event| *event == Event::Ran(victim_name.clone()));
    for _ in 0..3 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }
    assert_eq!(count(&log, &destroyed), 1);
    assert_eq!(
        count(&log, |event| *event == Event::Ran(victim_name.clone())),
        runs_before
    );
}

#[test]
fn replaces_dead_agents_and_drains_the_backlog() {
    let mut host = host_with_facility();
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    let role = Role::new("harvester");
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));

    for _ in 0..6 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }
    assert_eq!(host.agent_count(), 2);

    let victim = host.scan_agents(&colony())[0].id;
    host.remove_agent(victim);

    for _ in 0..6 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }

    assert_eq!(host.agent_count(), 2);
    assert_eq!(scheduler.watcher_count(&colony()), 2);
    assert_eq!(scheduler.pending_requests(&colony(), &role), 0);
    assert_eq!(count(&log, |event| matches!(event, Event::Destroyed(_))), 1);
    let state = host.colony_state(&colony()).unwrap_or_default();
    assert!(state.request_counters.is_empty());
}

#[test]
fn colony_without_a_facility_is_left_alone() {
    let mut host = SimHost::new();
    host.add_colony(colony(), us(), Energy::new(300), Energy::new(300));
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log)));

    for _ in 0..4 {
        scheduler.tick(&mut host, &mut cache);
        host.advance();
    }

    assert!(!scheduler.is_colony_known(&colony()));
    assert_eq!(host.agent_count(), 0);
}

#[test]
fn persisted_counters_survive_a_restart_without_starving_the_role() {
    let mut host = host_with_facility();
    // Starve the colony so the first request can never be satisfied.
    host.set_energy(&colony(), Energy::ZERO);
    let mut host_no_regen = host;
    let mut cache = fresh_cache();
    let role = Role::new("harvester");
    let log: EventLog = Rc::default();
    {
        let mut scheduler = Scheduler::new();
        scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log.clone())));
        scheduler.tick(&mut host_no_regen, &mut cache);
        assert_eq!(scheduler.pending_requests(&colony(), &role), 1);
    }
    let state = host_no_regen.colony_state(&colony()).unwrap_or_default();
    assert_eq!(state.request_counters.get(&role), Some(&1));

    // Restart with energy available again. The restored counter must
    // turn back into a request that eventually produces an agent.
    host_no_regen.set_energy(&colony(), Energy::new(300));
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 2, log)));
    for _ in 0..6 {
        scheduler.tick(&mut host_no_regen, &mut cache);
        host_no_regen.advance();
    }
    assert_eq!(host_no_regen.agent_count(), 2);
    assert_eq!(scheduler.pending_requests(&colony(), &role), 0);
}

#[test]
fn request_body_shrinks_to_the_available_budget() {
    let mut host = host_with_facility();
    host.set_energy(&colony(), Energy::new(200));
    let mut cache = fresh_cache();
    let mut scheduler = Scheduler::new();
    let log: EventLog = Rc::default();
    scheduler.register(Box::new(ScriptedTask::new("harvester", 1, 1, log)));

    scheduler.tick(&mut host, &mut cache);

    // Skeleton asks for 2 work, 2 carry, 2 move (cost 400); at 200 the
    // round-robin fill affords work, carry and move once each.
    let produced = host.scan_agents(&colony());
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].body.len(), 3);
    assert!(produced[0].has_part(PartKind::Work));
    assert!(produced[0].has_part(PartKind::Carry));
    assert!(produced[0].has_part(PartKind::Move));
}
