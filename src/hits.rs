//! Per-event hit catalogs
//!
//! A [`HitCatalog`] is a read-only snapshot of the event's measurements that
//! the matcher queries by structural address and time window.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::types::{Hit, HitId, StructuralAddress, TimeWindow};

/// Candidate hits returned by one query
pub type HitCandidates<'a> = SmallVec<[&'a Hit; 8]>;

/// Read-only access to the hits of one event
pub trait HitCatalog: Send + Sync {
    /// Hits recorded by `address` with a time inside `window`
    fn hits_near(&self, address: &StructuralAddress, window: TimeWindow) -> HitCandidates<'_>;

    /// Look a hit up by its identifier
    fn get(&self, id: HitId) -> Option<&Hit>;
}

/// Hit catalog indexed by structural address
#[derive(Debug, Clone, Default)]
pub struct InMemoryHitCatalog {
    by_address: HashMap<StructuralAddress, Vec<Hit>>,
    index: HashMap<HitId, (StructuralAddress, usize)>,
}

impl InMemoryHitCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hit; a hit with an already-present id replaces the old one
    pub fn insert(&mut self, hit: Hit) {
        if let Some((address, slot)) = self.index.get(&hit.id).copied() {
            if let Some(hits) = self.by_address.get_mut(&address) {
                hits.swap_remove(slot);
                if let Some(moved) = hits.get(slot) {
                    self.index.insert(moved.id, (address, slot));
                }
            }
        }
        let hits = self.by_address.entry(hit.address).or_default();
        self.index.insert(hit.id, (hit.address, hits.len()));
        hits.push(hit);
    }

    /// Number of hits
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the catalog holds no hits
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterate over every hit
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.by_address.values().flatten()
    }
}

impl FromIterator<Hit> for InMemoryHitCatalog {
    fn from_iter<I: IntoIterator<Item = Hit>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for hit in iter {
            catalog.insert(hit);
        }
        catalog
    }
}

impl HitCatalog for InMemoryHitCatalog {
    fn hits_near(&self, address: &StructuralAddress, window: TimeWindow) -> HitCandidates<'_> {
        self.by_address
            .get(address)
            .map(|hits| hits.iter().filter(|h| window.contains(h.time)).collect())
            .unwrap_or_default()
    }

    fn get(&self, id: HitId) -> Option<&Hit> {
        let (address, slot) = self.index.get(&id)?;
        self.by_address.get(address)?.get(*slot)
    }
}
