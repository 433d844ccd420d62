//! Deterministic in-memory host used by integration tests and the demo CLI.
//!
//! `SimHost` implements the [`Host`] contract over plain maps: colonies with
//! controller owners and energy pools, structures, build sites, resource
//! nodes, and agents with finite lifespans and a short materialization
//! delay. [`SimHost::advance`] steps the simulated world by one tick.

use std::collections::BTreeMap;

use colony_core::{
    AgentId, AgentRecord, AgentTags, BuildSiteRecord, ColonyName, ColonyState, Energy, Host,
    Identity, NodeId, PartKind, ProduceStatus, ResourceNodeRecord, Role, SiteId, StructureId,
    StructureKind, StructureRecord,
};

const MAX_BODY_PARTS: usize = 50;
const DEFAULT_LIFESPAN: u32 = 1_500;
const MATERIALIZE_DELAY: u64 = 1;

#[derive(Clone, Debug)]
struct EnergyPool {
    available: Energy,
    capacity: Energy,
    regen: Energy,
}

#[derive(Clone, Debug)]
struct PendingProduction {
    agent: AgentId,
    ready_at: u64,
}

/// In-memory simulation host.
#[derive(Debug, Default)]
pub struct SimHost {
    tick: u64,
    next_id: u64,
    default_lifespan: u32,
    controllers: BTreeMap<ColonyName, Identity>,
    energy: BTreeMap<ColonyName, EnergyPool>,
    structures: BTreeMap<StructureId, (ColonyName, StructureRecord)>,
    sites: BTreeMap<SiteId, (ColonyName, BuildSiteRecord)>,
    nodes: BTreeMap<NodeId, (ColonyName, ResourceNodeRecord)>,
    agents: BTreeMap<AgentId, AgentRecord>,
    tags: BTreeMap<AgentId, AgentTags>,
    colony_states: BTreeMap<ColonyName, ColonyState>,
    production: BTreeMap<StructureId, PendingProduction>,
}

impl SimHost {
    /// Creates an empty simulated world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_lifespan: DEFAULT_LIFESPAN,
            ..Self::default()
        }
    }

    /// Overrides the lifespan assigned to newly produced agents.
    pub fn set_default_lifespan(&mut self, lifespan: u32) {
        self.default_lifespan = lifespan;
    }

    /// Registers a colony with a controller owner and an energy pool.
    pub fn add_colony(
        &mut self,
        name: ColonyName,
        owner: Identity,
        capacity: Energy,
        regen: Energy,
    ) {
        let _ = self.controllers.insert(name.clone(), owner);
        let _ = self.energy.insert(
            name,
            EnergyPool {
                available: capacity,
                capacity,
                regen,
            },
        );
    }

    /// Sets the energy currently available to a colony.
    pub fn set_energy(&mut self, colony: &ColonyName, available: Energy) {
        if let Some(pool) = self.energy.get_mut(colony) {
            pool.available = available;
        }
    }

    /// Places a structure in the colony and returns its identifier.
    pub fn add_structure(
        &mut self,
        colony: &ColonyName,
        kind: StructureKind,
        owner: Option<Identity>,
    ) -> StructureId {
        let id = StructureId::new(self.allocate_id());
        let record = StructureRecord { id, kind, owner };
        let _ = self.structures.insert(id, (colony.clone(), record));
        id
    }

    /// Removes a structure from the simulated world.
    pub fn remove_structure(&mut self, id: StructureId) {
        let _ = self.structures.remove(&id);
        let _ = self.production.remove(&id);
    }

    /// Places a build site in the colony and returns its identifier.
    pub fn add_build_site(
        &mut self,
        colony: &ColonyName,
        kind: StructureKind,
        owner: Identity,
    ) -> SiteId {
        let id = SiteId::new(self.allocate_id());
        let record = BuildSiteRecord { id, kind, owner };
        let _ = self.sites.insert(id, (colony.clone(), record));
        id
    }

    /// Removes a build site from the simulated world.
    pub fn remove_build_site(&mut self, id: SiteId) {
        let _ = self.sites.remove(&id);
    }

    /// Places a resource node in the colony and returns its identifier.
    pub fn add_resource_node(&mut self, colony: &ColonyName, remaining: Energy) -> NodeId {
        let id = NodeId::new(self.allocate_id());
        let record = ResourceNodeRecord { id, remaining };
        let _ = self.nodes.insert(id, (colony.clone(), record));
        id
    }

    /// Removes a resource node from the simulated world.
    pub fn remove_resource_node(&mut self, id: NodeId) {
        let _ = self.nodes.remove(&id);
    }

    /// Inserts a fully materialized agent directly into the world.
    ///
    /// When `role` is provided the agent receives an initial tag record, as
    /// a facility-produced agent would; hostile agents carry no tags.
    pub fn insert_agent(
        &mut self,
        colony: &ColonyName,
        owner: Identity,
        name: impl Into<String>,
        role: Option<Role>,
        lifespan: u32,
        body: Vec<PartKind>,
    ) -> AgentId {
        let id = AgentId::new(self.allocate_id());
        let record = AgentRecord {
            id,
            name: name.into(),
            colony: colony.clone(),
            owner,
            lifespan,
            materializing: false,
            body,
        };
        let _ = self.agents.insert(id, record);
        if let Some(role) = role {
            let _ = self
                .tags
                .insert(id, AgentTags::initial(role, colony.clone()));
        }
        id
    }

    /// Removes an agent from the world, leaving its tags for the orphan
    /// sweep.
    pub fn remove_agent(&mut self, id: AgentId) {
        let _ = self.agents.remove(&id);
    }

    /// Moves an agent into another colony.
    pub fn relocate_agent(&mut self, id: AgentId, colony: &ColonyName) {
        if let Some(record) = self.agents.get_mut(&id) {
            record.colony = colony.clone();
        }
    }

    /// Number of live agents across the whole simulated world.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Reports whether a persisted tag record still exists for the agent.
    #[must_use]
    pub fn has_tags(&self, id: AgentId) -> bool {
        self.tags.contains_key(&id)
    }

    /// Steps the simulated world by one tick.
    ///
    /// Completes due materializations, ages every agent (expired agents
    /// simply disappear between ticks, as the host platform does), and
    /// regenerates colony energy.
    pub fn advance(&mut self) {
        self.tick += 1;

        let due: Vec<StructureId> = self
            .production
            .iter()
            .filter(|(_, pending)| pending.ready_at <= self.tick)
            .map(|(facility, _)| *facility)
            .collect();
        for facility in due {
            if let Some(pending) = self.production.remove(&facility) {
                if let Some(agent) = self.agents.get_mut(&pending.agent) {
                    agent.materializing = false;
                }
            }
        }

        let mut expired = Vec::new();
        for (id, agent) in self.agents.iter_mut() {
            if agent.materializing {
                continue;
            }
            agent.lifespan = agent.lifespan.saturating_sub(1);
            if agent.lifespan == 0 {
                expired.push(*id);
            }
        }
        for id in expired {
            let _ = self.agents.remove(&id);
        }

        for pool in self.energy.values_mut() {
            let refilled = pool.available.saturating_add(pool.regen);
            pool.available = if refilled > pool.capacity {
                pool.capacity
            } else {
                refilled
            };
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn body_cost(body: &[PartKind]) -> Energy {
        body.iter()
            .fold(Energy::ZERO, |sum, part| sum.saturating_add(part.unit_cost()))
    }
}

impl Host for SimHost {
    fn tick(&self) -> u64 {
        self.tick
    }

    fn colonies(&self) -> Vec<ColonyName> {
        self.controllers.keys().cloned().collect()
    }

    fn controller_owner(&self, colony: &ColonyName) -> Option<Identity> {
        self.controllers.get(colony).cloned()
    }

    fn scan_structures(&self, colony: &ColonyName) -> Vec<StructureRecord> {
        self.structures
            .values()
            .filter(|(home, _)| home == colony)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn scan_build_sites(&self, colony: &ColonyName) -> Vec<BuildSiteRecord> {
        self.sites
            .values()
            .filter(|(home, _)| home == colony)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn scan_agents(&self, colony: &ColonyName) -> Vec<AgentRecord> {
        self.agents
            .values()
            .filter(|record| record.colony == *colony)
            .cloned()
            .collect()
    }

    fn scan_resource_nodes(&self, colony: &ColonyName) -> Vec<ResourceNodeRecord> {
        self.nodes
            .values()
            .filter(|(home, _)| home == colony)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn structure(&self, id: StructureId) -> Option<StructureRecord> {
        self.structures.get(&id).map(|(_, record)| record.clone())
    }

    fn build_site(&self, id: SiteId) -> Option<BuildSiteRecord> {
        self.sites.get(&id).map(|(_, record)| record.clone())
    }

    fn agent(&self, id: AgentId) -> Option<AgentRecord> {
        self.agents.get(&id).cloned()
    }

    fn resource_node(&self, id: NodeId) -> Option<ResourceNodeRecord> {
        self.nodes.get(&id).map(|(_, record)| record.clone())
    }

    fn energy_budget(&self, colony: &ColonyName) -> Energy {
        self.energy
            .get(colony)
            .map_or(Energy::ZERO, |pool| pool.available)
    }

    fn produce_agent(
        &mut self,
        facility: StructureId,
        body: &[PartKind],
        name: &str,
        tags: AgentTags,
    ) -> ProduceStatus {
        let Some((colony, record)) = self.structures.get(&facility) else {
            return ProduceStatus::InvalidBody;
        };
        if record.kind != StructureKind::Facility {
            return ProduceStatus::InvalidBody;
        }
        if body.is_empty() || body.len() > MAX_BODY_PARTS {
            return ProduceStatus::InvalidBody;
        }
        if self.production.contains_key(&facility) {
            return ProduceStatus::FacilityBusy;
        }

        let colony = colony.clone();
        let owner = record.owner.clone();
        let cost = Self::body_cost(body);
        let Some(pool) = self.energy.get_mut(&colony) else {
            return ProduceStatus::InsufficientBudget;
        };
        if pool.available < cost {
            return ProduceStatus::InsufficientBudget;
        }
        pool.available = pool.available.saturating_sub(cost);

        let id = AgentId::new(self.allocate_id());
        let record = AgentRecord {
            id,
            name: name.to_owned(),
            colony: colony.clone(),
            owner: owner.unwrap_or_else(|| Identity::new("unowned")),
            lifespan: self.default_lifespan,
            materializing: true,
            body: body.to_vec(),
        };
        let _ = self.agents.insert(id, record);
        let _ = self.tags.insert(id, tags);
        let _ = self.production.insert(
            facility,
            PendingProduction {
                agent: id,
                ready_at: self.tick + MATERIALIZE_DELAY,
            },
        );
        ProduceStatus::Produced
    }

    fn agent_tags(&self, id: AgentId) -> Option<AgentTags> {
        self.tags.get(&id).cloned()
    }

    fn set_agent_tags(&mut self, id: AgentId, tags: AgentTags) {
        let _ = self.tags.insert(id, tags);
    }

    fn remove_agent_tags(&mut self, id: AgentId) {
        let _ = self.tags.remove(&id);
    }

    fn colony_state(&self, colony: &ColonyName) -> Option<ColonyState> {
        self.colony_states.get(colony).cloned()
    }

    fn store_colony_state(&mut self, colony: &ColonyName, state: &ColonyState) {
        let _ = self.colony_states.insert(colony.clone(), state.clone());
    }
}
