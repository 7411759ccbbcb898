//! Version vectors used by the CRDT document to describe "what has this
//! replica observed" without needing a total order across replicas.

use crate::ids::ReplicaId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-replica op counters. `export_from(version)` uses this to compute the
/// incremental delta a peer is missing; `version()` returns the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionVector(BTreeMap<ReplicaId, u64>);

impl VersionVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, replica: &ReplicaId) -> u64 {
        self.0.get(replica).copied().unwrap_or(0)
    }

    pub fn set(&mut self, replica: ReplicaId, counter: u64) {
        let entry = self.0.entry(replica).or_insert(0);
        if counter > *entry {
            *entry = counter;
        }
    }

    pub fn increment(&mut self, replica: ReplicaId) -> u64 {
        let entry = self.0.entry(replica).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Pointwise max: the version vector that dominates both inputs. This is
    /// the join operation of the semilattice; merging is associative,
    /// commutative and idempotent because `u64::max` is.
    pub fn merge(&mut self, other: &VersionVector) {
        for (replica, counter) in &other.0 {
            self.set(*replica, *counter);
        }
    }

    /// True if `self` has observed everything `other` has (`other <= self`).
    pub fn dominates(&self, other: &VersionVector) -> bool {
        other.0.iter().all(|(replica, counter)| self.get(replica) >= *counter)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty() || self.0.values().all(|c| *c == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, &u64)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_commutative() {
        let r1 = ReplicaId::new();
        let r2 = ReplicaId::new();

        let mut a = VersionVector::new();
        a.set(r1, 3);
        let mut b = VersionVector::new();
        b.set(r2, 5);

        let mut left = a.clone();
        left.merge(&b);
        let mut right = b.clone();
        right.merge(&a);

        assert_eq!(left, right);
    }

    #[test]
    fn merge_is_idempotent() {
        let r1 = ReplicaId::new();
        let mut a = VersionVector::new();
        a.set(r1, 7);

        let mut merged = a.clone();
        merged.merge(&a);

        assert_eq!(merged, a);
    }

    #[test]
    fn dominates_reflects_pointwise_max() {
        let r1 = ReplicaId::new();
        let mut a = VersionVector::new();
        a.set(r1, 2);
        let mut b = VersionVector::new();
        b.set(r1, 5);

        assert!(!a.dominates(&b));
        assert!(b.dominates(&a));
    }
}
