#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the colony manager decision core.
//!
//! This crate defines the surface that connects the host simulation, the
//! cached world state, and the scheduling systems. The host exposes per-tick
//! snapshots of colonies, structures, agents, resource nodes and build sites
//! through the [`Host`] trait; systems consume those records, and persisted
//! key/value state ([`AgentTags`], [`ColonyState`]) survives process
//! restarts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier assigned to a mobile worker agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Unique identifier assigned to a structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(u64);

impl StructureId {
    /// Creates a new structure identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Unique identifier assigned to a build site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(u64);

impl SiteId {
    /// Creates a new build-site identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Unique identifier assigned to a resource node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a new resource-node identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Stable name identifying a managed colony.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColonyName(String);

impl ColonyName {
    /// Creates a colony name from the provided string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the underlying name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Username of a controlling identity in the host simulation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from the provided username.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the underlying username.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Role assigned to an agent at creation, immutable for its lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(String);

impl Role {
    /// Creates a role label from the provided string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the underlying role label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Energy-like budget measured in whole units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Energy(u32);

impl Energy {
    /// Zero energy.
    pub const ZERO: Energy = Energy(0);

    /// Creates a new energy amount.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric amount.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Adds two amounts, saturating at the numeric bound.
    #[must_use]
    pub const fn saturating_add(self, other: Energy) -> Energy {
        Energy(self.0.saturating_add(other.0))
    }

    /// Subtracts an amount, saturating at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Energy) -> Energy {
        Energy(self.0.saturating_sub(other.0))
    }
}

/// Body part types an agent can be assembled from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartKind {
    /// Defensive part that absorbs damage before any other part.
    Tough,
    /// Scarce part used to claim neutral colonies.
    Claim,
    /// Utility part that performs harvesting, building and repair work.
    Work,
    /// Utility part that stores carried resources.
    Carry,
    /// Melee combat part.
    Attack,
    /// Ranged combat part.
    RangedAttack,
    /// Healing part.
    Heal,
    /// Mobility part; effect ordering requires it to sit last in a body.
    Move,
}

impl PartKind {
    /// Scan order used when filling a body against a budget.
    pub const FILL_ORDER: [PartKind; 8] = [
        PartKind::Work,
        PartKind::Carry,
        PartKind::Move,
        PartKind::Tough,
        PartKind::Attack,
        PartKind::RangedAttack,
        PartKind::Heal,
        PartKind::Claim,
    ];

    /// Order in which allocated parts are assembled into a concrete body:
    /// defensive absorption first, scarce parts next, utility parts after,
    /// mobility always last.
    pub const ASSEMBLY_ORDER: [PartKind; 8] = [
        PartKind::Tough,
        PartKind::Claim,
        PartKind::Work,
        PartKind::Carry,
        PartKind::Attack,
        PartKind::RangedAttack,
        PartKind::Heal,
        PartKind::Move,
    ];

    /// Production cost of a single part of this kind.
    #[must_use]
    pub const fn unit_cost(self) -> Energy {
        match self {
            PartKind::Tough => Energy::new(10),
            PartKind::Claim => Energy::new(600),
            PartKind::Work => Energy::new(100),
            PartKind::Carry => Energy::new(50),
            PartKind::Attack => Energy::new(80),
            PartKind::RangedAttack => Energy::new(150),
            PartKind::Heal => Energy::new(250),
            PartKind::Move => Energy::new(50),
        }
    }

    const fn index(self) -> usize {
        match self {
            PartKind::Tough => 0,
            PartKind::Claim => 1,
            PartKind::Work => 2,
            PartKind::Carry => 3,
            PartKind::Attack => 4,
            PartKind::RangedAttack => 5,
            PartKind::Heal => 6,
            PartKind::Move => 7,
        }
    }
}

/// Desired proportion of part types for a role's body, independent of budget.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyTemplate {
    counts: [u32; 8],
}

impl BodyTemplate {
    /// Creates an all-zero template.
    #[must_use]
    pub const fn new() -> Self {
        Self { counts: [0; 8] }
    }

    /// Returns the template with the count for `kind` replaced by `count`.
    #[must_use]
    pub fn with(mut self, kind: PartKind, count: u32) -> Self {
        self.counts[kind.index()] = count;
        self
    }

    /// Desired count for the provided part kind.
    #[must_use]
    pub const fn count(&self, kind: PartKind) -> u32 {
        self.counts[kind.index()]
    }

    /// Reports whether every part count is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|count| *count == 0)
    }

    /// Total production cost of the template under the linear cost model.
    #[must_use]
    pub fn cost(&self) -> Energy {
        let mut total = Energy::ZERO;
        for kind in PartKind::FILL_ORDER {
            let unit = kind.unit_cost().get();
            total = total.saturating_add(Energy::new(unit.saturating_mul(self.count(kind))));
        }
        total
    }
}

/// Structure types recognized by the decision core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureKind {
    /// The production facility capable of creating new agents.
    Facility,
    /// Budget-extending structure attached to a facility.
    Extension,
    /// Defensive structure.
    Tower,
    /// Bulk resource storage.
    Storage,
    /// Resource transfer endpoint.
    Link,
    /// Neutral open-access container.
    Container,
    /// Neutral barrier.
    Wall,
    /// Neutral road.
    Road,
    /// Neutral power bank.
    PowerBank,
}

impl StructureKind {
    /// Reports whether structures of this kind carry no owning identity.
    ///
    /// Neutral kinds are cached alongside owned structures so colony logic
    /// can treat them as usable infrastructure.
    #[must_use]
    pub const fn is_neutral(self) -> bool {
        matches!(
            self,
            StructureKind::Wall
                | StructureKind::Road
                | StructureKind::Container
                | StructureKind::PowerBank
        )
    }
}

/// Live record describing a structure resolved from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureRecord {
    /// Identifier of the structure.
    pub id: StructureId,
    /// Structure type.
    pub kind: StructureKind,
    /// Owning identity; `None` for neutral structures.
    pub owner: Option<Identity>,
}

/// Live record describing a build site resolved from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildSiteRecord {
    /// Identifier of the build site.
    pub id: SiteId,
    /// Structure type under construction.
    pub kind: StructureKind,
    /// Identity that placed the site.
    pub owner: Identity,
}

/// Live record describing an agent resolved from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentRecord {
    /// Identifier of the agent.
    pub id: AgentId,
    /// Name assigned at production time.
    pub name: String,
    /// Colony the agent currently occupies; agents move between colonies.
    pub colony: ColonyName,
    /// Identity that owns the agent.
    pub owner: Identity,
    /// Remaining lifespan measured in ticks.
    pub lifespan: u32,
    /// True while the facility is still materializing the agent.
    pub materializing: bool,
    /// Concrete body the agent was produced with.
    pub body: Vec<PartKind>,
}

impl AgentRecord {
    /// Reports whether the agent's body contains the provided part kind.
    #[must_use]
    pub fn has_part(&self, kind: PartKind) -> bool {
        self.body.iter().any(|part| *part == kind)
    }
}

/// Live record describing a resource node resolved from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNodeRecord {
    /// Identifier of the node.
    pub id: NodeId,
    /// Energy remaining in the node.
    pub remaining: Energy,
}

/// Free-form state persisted per agent across ticks and process restarts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTags {
    /// Role assigned at creation; restart recovery matches on this field.
    pub role: Role,
    /// Colony the agent was produced in.
    pub origin_colony: ColonyName,
    /// Working/idle flag toggled by role logic.
    pub working: bool,
    /// Identifier of the object the agent is currently assigned to, if any.
    pub assigned_target: Option<String>,
    /// Additional role-specific keys.
    pub extra: BTreeMap<String, String>,
}

impl AgentTags {
    /// Creates the initial tag set written when an agent is produced.
    #[must_use]
    pub fn initial(role: Role, origin_colony: ColonyName) -> Self {
        Self {
            role,
            origin_colony,
            working: false,
            assigned_target: None,
            extra: BTreeMap::new(),
        }
    }
}

/// State persisted per colony across process restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyState {
    /// Outstanding spawn-request counters keyed by role.
    pub request_counters: BTreeMap<Role, u32>,
}

/// Status returned by the facility for a production attempt.
///
/// Every non-`Produced` status means "not yet fulfilled": the request stays
/// queued and is retried on a later tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProduceStatus {
    /// The facility accepted the request and began materializing the agent.
    Produced,
    /// The colony's budget cannot cover the requested body.
    InsufficientBudget,
    /// The facility is already materializing another agent.
    FacilityBusy,
    /// The requested body is empty or exceeds the host's part limit.
    InvalidBody,
}

/// Fault raised by task logic and contained at the scheduler boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskFault {
    /// A world object the task depends on no longer resolves.
    #[error("missing world object {id}")]
    MissingObject {
        /// Identifier that failed to resolve.
        id: String,
    },
    /// Role logic failed for a reason it can only describe textually.
    #[error("{0}")]
    Logic(String),
}

/// Interface to the host simulation platform.
///
/// The decision core never reimplements the world: it consumes per-tick
/// snapshots, resolves ids back to live records, and issues production
/// requests. All methods are synchronous; the model is single-threaded and
/// tick-driven, so nothing here blocks or yields.
pub trait Host {
    /// Global monotonic tick counter.
    fn tick(&self) -> u64;

    /// Colonies currently visible to the controlling identity.
    fn colonies(&self) -> Vec<ColonyName>;

    /// Identity controlling the colony, if any.
    fn controller_owner(&self, colony: &ColonyName) -> Option<Identity>;

    /// Scans every structure in the colony, owned, neutral and hostile.
    fn scan_structures(&self, colony: &ColonyName) -> Vec<StructureRecord>;

    /// Scans every build site in the colony.
    fn scan_build_sites(&self, colony: &ColonyName) -> Vec<BuildSiteRecord>;

    /// Scans every agent in the colony, friendly and hostile.
    fn scan_agents(&self, colony: &ColonyName) -> Vec<AgentRecord>;

    /// Scans every resource node in the colony.
    fn scan_resource_nodes(&self, colony: &ColonyName) -> Vec<ResourceNodeRecord>;

    /// Resolves a structure id to a live record.
    fn structure(&self, id: StructureId) -> Option<StructureRecord>;

    /// Resolves a build-site id to a live record.
    fn build_site(&self, id: SiteId) -> Option<BuildSiteRecord>;

    /// Resolves an agent id to a live record.
    fn agent(&self, id: AgentId) -> Option<AgentRecord>;

    /// Resolves a resource-node id to a live record.
    fn resource_node(&self, id: NodeId) -> Option<ResourceNodeRecord>;

    /// Budget currently available to the colony for producing agents.
    fn energy_budget(&self, colony: &ColonyName) -> Energy;

    /// Requests that the facility produce a new agent.
    fn produce_agent(
        &mut self,
        facility: StructureId,
        body: &[PartKind],
        name: &str,
        tags: AgentTags,
    ) -> ProduceStatus;

    /// Reads the persisted tag record for an agent.
    fn agent_tags(&self, id: AgentId) -> Option<AgentTags>;

    /// Replaces the persisted tag record for an agent.
    fn set_agent_tags(&mut self, id: AgentId, tags: AgentTags);

    /// Removes the persisted tag record for an agent that no longer exists.
    fn remove_agent_tags(&mut self, id: AgentId);

    /// Reads the persisted per-colony state.
    fn colony_state(&self, colony: &ColonyName) -> Option<ColonyState>;

    /// Replaces the persisted per-colony state.
    fn store_colony_state(&mut self, colony: &ColonyName, state: &ColonyState);
}
