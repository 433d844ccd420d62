#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cached, queryable snapshot of the host world, maintained per colony.
//!
//! The cache is the single source of truth for "what exists right now":
//! expensive host scans are amortized behind per-category refresh counters,
//! and queries resolve cached ids back to live records on demand. Ids that
//! no longer resolve are queued for removal during iteration and pruned
//! afterwards, never mid-iteration.

use std::collections::BTreeMap;

use colony_core::{
    AgentId, AgentRecord, BuildSiteRecord, ColonyName, Host, Identity, NodeId, PartKind,
    ResourceNodeRecord, Role, SiteId, StructureId, StructureKind, StructureRecord,
};

#[cfg(any(test, feature = "sim_scaffolding"))]
pub mod sim;

/// Configuration for the world cache.
///
/// Each scan category carries a single integer interval: a per-colony
/// countdown reaches zero, the category is re-scanned, and the countdown
/// resets to the interval. Agents are re-scanned every refresh because they
/// move every tick; resource nodes are scanned once per colony because they
/// never move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Identity whose colonies and agents count as "owned".
    pub identity: Identity,
    /// Ticks between structure re-scans.
    pub structure_interval: u32,
    /// Ticks between build-site re-scans.
    pub site_interval: u32,
}

impl CacheConfig {
    /// Creates a configuration with the default per-tick scan intervals.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            structure_interval: 1,
            site_interval: 1,
        }
    }
}

/// Cached reference to a structure, kept between scans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Identifier used to resolve the live record.
    pub id: StructureId,
    /// Owner captured at scan time; `None` for neutral structures.
    pub owner: Option<Identity>,
    /// Structure type captured at scan time.
    pub kind: StructureKind,
}

/// Selects which build-site bucket a query reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiteOwnership {
    /// Sites placed by the configured identity.
    Owned,
    /// Sites placed by any other identity.
    Hostile,
}

#[derive(Debug, Default)]
struct ColonyStore {
    structure_countdown: u32,
    site_countdown: u32,
    owned_structures: BTreeMap<StructureKind, Vec<CacheEntry>>,
    hostile_structures: BTreeMap<StructureKind, Vec<CacheEntry>>,
    agents: BTreeMap<Role, Vec<AgentId>>,
    hostile_agents: Vec<AgentId>,
    resource_nodes: Option<Vec<NodeId>>,
    owned_sites: Vec<SiteId>,
    hostile_sites: Vec<SiteId>,
}

/// Per-colony cached index of structures, agents, resource nodes and build
/// sites.
#[derive(Debug)]
pub struct WorldCache {
    config: CacheConfig,
    colonies: BTreeMap<ColonyName, ColonyStore>,
}

impl WorldCache {
    /// Creates an empty cache with the provided configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            colonies: BTreeMap::new(),
        }
    }

    /// Identity the cache treats as "us".
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.config.identity
    }

    /// Refreshes the cached categories for one colony.
    ///
    /// Agents are re-scanned on every call. Structures and build sites are
    /// re-scanned only when their countdown reaches zero; each category is
    /// rebuilt into a fresh container and swapped in whole, so a query never
    /// observes a half-updated category.
    pub fn refresh(&mut self, host: &impl Host, colony: &ColonyName) {
        let identity = self.config.identity.clone();
        let structure_interval = self.config.structure_interval;
        let site_interval = self.config.site_interval;
        let store = self.colonies.entry(colony.clone()).or_default();

        Self::refresh_agents(store, host, colony, &identity);

        if store.structure_countdown == 0 {
            Self::refresh_structures(store, host, colony, &identity);
            store.structure_countdown = structure_interval;
        }
        store.structure_countdown = store.structure_countdown.saturating_sub(1);

        if store.site_countdown == 0 {
            Self::refresh_sites(store, host, colony, &identity);
            store.site_countdown = site_interval;
        }
        store.site_countdown = store.site_countdown.saturating_sub(1);

        if store.resource_nodes.is_none() {
            let nodes = host
                .scan_resource_nodes(colony)
                .into_iter()
                .map(|node| node.id)
                .collect();
            store.resource_nodes = Some(nodes);
        }
    }

    fn refresh_agents(
        store: &mut ColonyStore,
        host: &impl Host,
        colony: &ColonyName,
        identity: &Identity,
    ) {
        let mut agents: BTreeMap<Role, Vec<AgentId>> = BTreeMap::new();
        let mut hostile_agents = Vec::new();

        for record in host.scan_agents(colony) {
            if record.owner == *identity {
                let Some(tags) = host.agent_tags(record.id) else {
                    continue;
                };
                agents.entry(tags.role).or_default().push(record.id);
            } else {
                hostile_agents.push(record.id);
            }
        }

        store.agents = agents;
        store.hostile_agents = hostile_agents;
    }

    fn refresh_structures(
        store: &mut ColonyStore,
        host: &impl Host,
        colony: &ColonyName,
        identity: &Identity,
    ) {
        let mut owned: BTreeMap<StructureKind, Vec<CacheEntry>> = BTreeMap::new();
        let mut hostile: BTreeMap<StructureKind, Vec<CacheEntry>> = BTreeMap::new();

        for record in host.scan_structures(colony) {
            let entry = CacheEntry {
                id: record.id,
                owner: record.owner.clone(),
                kind: record.kind,
            };
            let ours = match &record.owner {
                Some(owner) => *owner == *identity,
                None => record.kind.is_neutral(),
            };
            let bucket = if ours { &mut owned } else { &mut hostile };
            bucket.entry(record.kind).or_default().push(entry);
        }

        store.owned_structures = owned;
        store.hostile_structures = hostile;
    }

    fn refresh_sites(
        store: &mut ColonyStore,
        host: &impl Host,
        colony: &ColonyName,
        identity: &Identity,
    ) {
        let mut owned = Vec::new();
        let mut hostile = Vec::new();

        for record in host.scan_build_sites(colony) {
            if record.owner == *identity {
                owned.push(record.id);
            } else {
                hostile.push(record.id);
            }
        }

        store.owned_sites = owned;
        store.hostile_sites = hostile;
    }

    /// Returns the owned and neutral structures of the requested kinds.
    ///
    /// An empty `kinds` slice selects every cached kind. Ids that fail to
    /// resolve are pruned after iteration.
    pub fn structures(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
        kinds: &[StructureKind],
    ) -> Vec<StructureRecord> {
        self.structures_matching(host, colony, kinds, |_| true)
    }

    /// Returns owned and neutral structures matching `predicate`.
    pub fn structures_matching(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
        kinds: &[StructureKind],
        predicate: impl Fn(&StructureRecord) -> bool,
    ) -> Vec<StructureRecord> {
        Self::query_structures(self.colonies.get_mut(colony), true, host, kinds, predicate)
    }

    /// Returns hostile structures of the requested kinds.
    pub fn hostile_structures(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
        kinds: &[StructureKind],
    ) -> Vec<StructureRecord> {
        Self::query_structures(self.colonies.get_mut(colony), false, host, kinds, |_| true)
    }

    fn query_structures(
        store: Option<&mut ColonyStore>,
        owned: bool,
        host: &impl Host,
        kinds: &[StructureKind],
        predicate: impl Fn(&StructureRecord) -> bool,
    ) -> Vec<StructureRecord> {
        let Some(store) = store else {
            return Vec::new();
        };
        let buckets = if owned {
            &mut store.owned_structures
        } else {
            &mut store.hostile_structures
        };

        let mut records = Vec::new();
        let mut stale = Vec::new();

        for (kind, entries) in buckets.iter() {
            if !kinds.is_empty() && !kinds.contains(kind) {
                continue;
            }
            for entry in entries {
                match host.structure(entry.id) {
                    Some(record) => {
                        if predicate(&record) {
                            records.push(record);
                        }
                    }
                    None => stale.push(entry.id),
                }
            }
        }

        prune_structures(buckets, &stale);
        records
    }

    /// Returns the colony's own agents, optionally restricted to one role.
    pub fn agents(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
        role: Option<&Role>,
    ) -> Vec<AgentRecord> {
        let Some(store) = self.colonies.get_mut(colony) else {
            return Vec::new();
        };

        let mut records = Vec::new();
        let mut stale = Vec::new();

        for (bucket_role, ids) in store.agents.iter() {
            if let Some(wanted) = role {
                if bucket_role != wanted {
                    continue;
                }
            }
            for id in ids {
                match host.agent(*id) {
                    Some(record) => records.push(record),
                    None => stale.push(*id),
                }
            }
        }

        if !stale.is_empty() {
            log::debug!(
                "pruning {} stale agent id(s) in {}",
                stale.len(),
                colony.as_str(),
            );
            for ids in store.agents.values_mut() {
                ids.retain(|id| !stale.contains(id));
            }
        }
        records
    }

    /// Returns hostile agents, optionally filtered by body capability.
    ///
    /// A non-empty `capabilities` slice keeps only agents whose body carries
    /// at least one of the listed part kinds.
    pub fn hostile_agents(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
        capabilities: &[PartKind],
    ) -> Vec<AgentRecord> {
        let Some(store) = self.colonies.get_mut(colony) else {
            return Vec::new();
        };

        let mut records = Vec::new();
        let mut stale = Vec::new();

        for id in &store.hostile_agents {
            match host.agent(*id) {
                Some(record) => {
                    let qualifies = capabilities.is_empty()
                        || capabilities.iter().any(|kind| record.has_part(*kind));
                    if qualifies {
                        records.push(record);
                    }
                }
                None => stale.push(*id),
            }
        }

        if !stale.is_empty() {
            store.hostile_agents.retain(|id| !stale.contains(id));
        }
        records
    }

    /// Returns the colony's resource nodes.
    pub fn resource_nodes(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
    ) -> Vec<ResourceNodeRecord> {
        let Some(store) = self.colonies.get_mut(colony) else {
            return Vec::new();
        };
        let Some(ids) = store.resource_nodes.as_mut() else {
            return Vec::new();
        };

        let mut records = Vec::new();
        let mut stale = Vec::new();

        for id in ids.iter() {
            match host.resource_node(*id) {
                Some(record) => records.push(record),
                None => stale.push(*id),
            }
        }

        if !stale.is_empty() {
            ids.retain(|id| !stale.contains(id));
        }
        records
    }

    /// Returns build sites from the requested ownership bucket.
    pub fn build_sites(
        &mut self,
        host: &impl Host,
        colony: &ColonyName,
        ownership: SiteOwnership,
    ) -> Vec<BuildSiteRecord> {
        let Some(store) = self.colonies.get_mut(colony) else {
            return Vec::new();
        };
        let ids = match ownership {
            SiteOwnership::Owned => &mut store.owned_sites,
            SiteOwnership::Hostile => &mut store.hostile_sites,
        };

        let mut records = Vec::new();
        let mut stale = Vec::new();

        for id in ids.iter() {
            match host.build_site(*id) {
                Some(record) => records.push(record),
                None => stale.push(*id),
            }
        }

        if !stale.is_empty() {
            ids.retain(|id| !stale.contains(id));
        }
        records
    }

    /// Reports whether the colony's controller belongs to `identity`.
    #[must_use]
    pub fn is_owned_by(
        &self,
        host: &impl Host,
        colony: &ColonyName,
        identity: &Identity,
    ) -> bool {
        host.controller_owner(colony)
            .map_or(false, |owner| owner == *identity)
    }

    /// Reports whether any hostile agent is present in the colony.
    pub fn is_under_attack(&mut self, host: &impl Host, colony: &ColonyName) -> bool {
        !self.hostile_agents(host, colony, &[]).is_empty()
    }
}

fn prune_structures(
    buckets: &mut BTreeMap<StructureKind, Vec<CacheEntry>>,
    stale: &[StructureId],
) {
    if stale.is_empty() {
        return;
    }
    log::debug!("pruning {} stale structure id(s)", stale.len());
    for entries in buckets.values_mut() {
        entries.retain(|entry| !stale.contains(&entry.id));
    }
}
