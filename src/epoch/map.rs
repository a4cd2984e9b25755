//! Many-to-many epoch ↔ record association.
//!
//! Filled in lock-step by the generator; records use current numbering.
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct EpochRecordMap {
    epoch2rec: Vec<BTreeSet<usize>>,
    rec2epoch: BTreeMap<usize, BTreeSet<usize>>,
    empty: BTreeSet<usize>,
}

impl EpochRecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that epoch `e` touches record `r`.
    pub fn insert(&mut self, e: usize, r: usize) {
        if self.epoch2rec.len() <= e {
            self.epoch2rec.resize_with(e + 1, BTreeSet::new);
        }
        self.epoch2rec[e].insert(r);
        self.rec2epoch.entry(r).or_default().insert(e);
    }

    /// Records touched by epoch `e` (empty for unknown epochs).
    pub fn epoch_records(&self, e: usize) -> &BTreeSet<usize> {
        self.epoch2rec.get(e).unwrap_or(&self.empty)
    }

    /// Epochs touching record `r` (empty for records outside every epoch).
    pub fn record_epochs(&self, r: usize) -> &BTreeSet<usize> {
        self.rec2epoch.get(&r).unwrap_or(&self.empty)
    }

    /// Records touched by at least one epoch.
    pub fn records(&self) -> impl Iterator<Item = usize> + '_ {
        self.rec2epoch.keys().copied()
    }

    pub fn n_epochs(&self) -> usize {
        self.epoch2rec.len()
    }

    pub fn clear(&mut self) {
        self.epoch2rec.clear();
        self.rec2epoch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions() {
        let mut m = EpochRecordMap::new();
        m.insert(0, 0);
        m.insert(0, 1);
        m.insert(1, 1);
        assert_eq!(m.epoch_records(0).len(), 2);
        assert_eq!(m.record_epochs(1).iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert!(m.record_epochs(7).is_empty());
        assert!(m.epoch_records(9).is_empty());
    }
}
