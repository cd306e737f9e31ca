//! Reference channel-status implementations

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ChannelStatus;
use crate::types::StructuralAddress;

/// Every element is alive
#[derive(Debug, Clone, Copy, Default)]
pub struct AllChannelsAlive;

impl ChannelStatus for AllChannelsAlive {
    #[inline]
    fn is_alive(&self, _address: &StructuralAddress) -> bool {
        true
    }
}

/// Explicit set of dead elements; everything else is alive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeadChannelSet {
    dead: HashSet<StructuralAddress>,
}

impl DeadChannelSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `address` dead
    pub fn insert(&mut self, address: StructuralAddress) -> bool {
        self.dead.insert(address)
    }

    /// Number of dead elements
    pub fn len(&self) -> usize {
        self.dead.len()
    }

    /// Whether no element is dead
    pub fn is_empty(&self) -> bool {
        self.dead.is_empty()
    }
}

impl FromIterator<StructuralAddress> for DeadChannelSet {
    fn from_iter<I: IntoIterator<Item = StructuralAddress>>(iter: I) -> Self {
        Self {
            dead: iter.into_iter().collect(),
        }
    }
}

impl ChannelStatus for DeadChannelSet {
    #[inline]
    fn is_alive(&self, address: &StructuralAddress) -> bool {
        !self.dead.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Section, Subsystem};

    #[test]
    fn test_dead_channel_set() {
        let dead = StructuralAddress::new(Subsystem::Barrel, Section::Forward, 2, 5);
        let set: DeadChannelSet = [dead].into_iter().collect();
        assert!(!set.is_alive(&dead));
        assert!(set.is_alive(&dead.with_sector(3)));
        assert!(AllChannelsAlive.is_alive(&dead));
        assert_eq!(set.len(), 1);
    }
}
