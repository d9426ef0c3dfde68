//! The region store: the single owner of every region's mutable state.

use crate::id::{GateIndex, RegionId};
use crate::region::{Health, Region, RegionUpdate};
use crate::topology::Topology;
use std::collections::HashMap;

/// One manifest entry, normalized and ready to become a [`Region`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegionSeed {
    /// Manifest identifier, unique across the manifest.
    pub key: String,
    pub country_code: String,
    pub name: String,
    /// Initial health.
    pub health: Health,
}

impl RegionSeed {
    /// A region waiting for its drop at `drop_time`.
    pub fn scheduled(
        key: impl Into<String>,
        country_code: impl Into<String>,
        name: impl Into<String>,
        drop_time: i64,
    ) -> Self {
        Self {
            key: key.into(),
            country_code: country_code.into(),
            name: name.into(),
            health: Health::Scheduled { drop_time },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate region id in manifest: {0}")]
    DuplicateRegion(String),
    #[error("no region with id {0:?}")]
    UnknownRegion(RegionId),
    #[error("gate {gate:?} for region {region:?} is not in the topology")]
    UnknownGate { region: RegionId, gate: GateIndex },
}

/// All regions, indexed by [`RegionId`] (dense, equal to load order) and by
/// manifest key.
#[derive(Debug, Clone, Default)]
pub struct RegionStore {
    regions: Vec<Region>,
    by_key: HashMap<String, RegionId>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every region with fresh ones built from `seeds`. Each region
    /// starts on the first gate with zero progress. Nothing changes if the
    /// seeds are rejected.
    pub fn load(
        &mut self,
        seeds: impl IntoIterator<Item = RegionSeed>,
        topology: &Topology,
    ) -> Result<usize, StoreError> {
        let mut regions = Vec::new();
        let mut by_key = HashMap::new();
        for seed in seeds {
            let id = RegionId(regions.len() as u32);
            if by_key.insert(seed.key.clone(), id).is_some() {
                return Err(StoreError::DuplicateRegion(seed.key));
            }
            regions.push(
                Region::new(id, seed.key, seed.country_code, seed.name, seed.health)
                    .at(topology.first_gate(), 0),
            );
        }
        self.regions = regions;
        self.by_key = by_key;
        Ok(self.regions.len())
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.index())
    }

    /// Look up by manifest id.
    pub fn get_by_key(&self, key: &str) -> Option<&Region> {
        self.by_key.get(key).and_then(|id| self.get(*id))
    }

    /// First region with the given country code.
    pub fn get_by_country(&self, country_code: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.country_code == country_code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Replace one region's mutable fields in a single step.
    pub fn apply(
        &mut self,
        id: RegionId,
        update: RegionUpdate,
        topology: &Topology,
    ) -> Result<(), StoreError> {
        if !topology.contains_gate(update.gate) {
            return Err(StoreError::UnknownGate {
                region: id,
                gate: update.gate,
            });
        }
        let region = self
            .regions
            .get_mut(id.index())
            .ok_or(StoreError::UnknownRegion(id))?;
        region.apply(update);
        Ok(())
    }

    /// Send a region back to the first gate, processing from zero.
    pub fn reset(&mut self, id: RegionId, topology: &Topology) -> Result<(), StoreError> {
        self.apply(
            id,
            RegionUpdate {
                gate: topology.first_gate(),
                progress: 0,
                health: Health::Processing,
            },
            topology,
        )
    }
}
