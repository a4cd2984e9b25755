//! Channel-by-epoch (CHEP) mask.
//!
//! Sparse map `epoch → excluded channel labels`, keyed by original epoch
//! index (display numbers are used only when persisting).  An absent epoch
//! has no excluded channels.
use std::collections::{BTreeMap, BTreeSet};

use super::{EpochMask, MaskSummary};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChepMask {
    map: BTreeMap<usize, BTreeSet<String>>,
}

/// Channels judged by [`ChepMask::collapse_to_channels`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelVerdict {
    pub good: Vec<String>,
    pub bad: Vec<String>,
}

impl ChepMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// `true` if no channel is excluded anywhere.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of excluded (epoch, channel) pairs.
    pub fn n_pairs(&self) -> usize {
        self.map.values().map(BTreeSet::len).sum()
    }

    /// Epochs with at least one excluded channel, with their channels.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<String>)> {
        self.map.iter().map(|(&e, s)| (e, s))
    }

    pub fn mask_channel(&mut self, e: usize, ch: &str) {
        self.map.entry(e).or_default().insert(ch.to_string());
    }

    pub fn unmask_channel(&mut self, e: usize, ch: &str) {
        if let Some(set) = self.map.get_mut(&e) {
            set.remove(ch);
            if set.is_empty() {
                self.map.remove(&e);
            }
        }
    }

    pub fn is_masked(&self, e: usize, ch: &str) -> bool {
        self.map.get(&e).is_some_and(|s| s.contains(ch))
    }

    /// Exclude every channel of `universe` in epoch `e`.
    pub fn mask_epoch(&mut self, e: usize, universe: &[String]) {
        if universe.is_empty() {
            return;
        }
        self.map.entry(e).or_default().extend(universe.iter().cloned());
    }

    /// Members of `universe` excluded in epoch `e`.
    pub fn channels_masked(&self, e: usize, universe: &[String]) -> BTreeSet<String> {
        universe.iter().filter(|c| self.is_masked(e, c)).cloned().collect()
    }

    /// Members of `universe` still included in epoch `e`.
    pub fn channels_unmasked(&self, e: usize, universe: &[String]) -> BTreeSet<String> {
        universe.iter().filter(|c| !self.is_masked(e, c)).cloned().collect()
    }

    /// Roll up to the epoch mask.
    ///
    /// An epoch with at least `k` excluded channels (`k > 0`) or whose
    /// excluded fraction of `universe` exceeds `p` is requested masked
    /// through the epoch mask's mode.  Afterwards every epoch excluded in
    /// the epoch mask has all of `universe` CHEP-masked.
    pub fn collapse_to_epochs(
        &mut self,
        mask: &mut EpochMask,
        universe: &[String],
        k: usize,
        p: f64,
    ) -> MaskSummary {
        let mut summary = MaskSummary::new(format!("chep-epochs k={k} p={p}"), mask.mode());
        let n_ch = universe.len().max(1) as f64;
        let hits: BTreeSet<usize> = self
            .map
            .keys()
            .copied()
            .filter(|&e| {
                let n = self.channels_masked(e, universe).len();
                (k > 0 && n >= k) || (n as f64 / n_ch) > p
            })
            .collect();
        summary.matched = hits.len();
        for &e in &hits {
            summary.tally(mask.set(e, true));
        }
        for e in 0..mask.len() {
            if mask.is_masked(e) {
                self.mask_epoch(e, universe);
            }
        }
        summary.finish(mask)
    }

    /// Roll up to whole channels.
    ///
    /// Counts, over the epochs in `epochs`, how often each channel is
    /// excluded.  A channel is bad when its count is at least `k` (`k > 0`)
    /// or its fraction exceeds `p`.  `propagate_bad` excludes bad channels
    /// in every one of `all_epochs`; `propagate_good` clears every entry of
    /// good channels.
    pub fn collapse_to_channels(
        &mut self,
        epochs: &[usize],
        all_epochs: usize,
        universe: &[String],
        k: usize,
        p: f64,
        propagate_bad: bool,
        propagate_good: bool,
    ) -> ChannelVerdict {
        let n_ep = epochs.len().max(1) as f64;
        let mut verdict = ChannelVerdict::default();
        for ch in universe {
            let n = epochs.iter().filter(|&&e| self.is_masked(e, ch)).count();
            let bad = (k > 0 && n >= k) || (n as f64 / n_ep) > p;
            if bad {
                verdict.bad.push(ch.clone());
            } else {
                verdict.good.push(ch.clone());
            }
        }
        if propagate_bad {
            for ch in &verdict.bad {
                for e in 0..all_epochs {
                    self.mask_channel(e, ch);
                }
            }
        }
        if propagate_good {
            let keys: Vec<usize> = self.map.keys().copied().collect();
            for e in keys {
                for ch in &verdict.good {
                    self.unmask_channel(e, ch);
                }
            }
        }
        verdict
    }

    /// Add every pair from `other`.
    pub fn merge(&mut self, other: ChepMask) {
        for (e, chs) in other.map {
            self.map.entry(e).or_default().extend(chs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chans(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mask_and_unmask() {
        let mut c = ChepMask::new();
        c.mask_channel(2, "C3");
        c.mask_channel(2, "C4");
        c.unmask_channel(2, "C3");
        assert!(c.is_masked(2, "C4"));
        assert!(!c.is_masked(2, "C3"));
        c.unmask_channel(2, "C4");
        assert!(c.is_empty(), "empty epochs are dropped");
    }

    #[test]
    fn masked_unmasked_partition() {
        let u = chans(&["C3", "C4", "O1"]);
        let mut c = ChepMask::new();
        c.mask_channel(0, "O1");
        c.mask_channel(0, "X9");
        assert_eq!(c.channels_masked(0, &u).len(), 1, "only universe members reported");
        assert_eq!(c.channels_unmasked(0, &u).len(), 2);
    }

    #[test]
    fn channel_rollup_fraction() {
        let u = chans(&["C3", "C4"]);
        let mut c = ChepMask::new();
        for e in 0..3 {
            c.mask_channel(e, "C3");
        }
        c.mask_channel(1, "C4");
        let v = c.collapse_to_channels(&[0, 1, 2, 3], 4, &u, 0, 0.5, true, true);
        assert_eq!(v.bad, chans(&["C3"]));
        assert_eq!(v.good, chans(&["C4"]));
        assert!(c.is_masked(3, "C3"), "bad channel propagated");
        assert!(!c.is_masked(1, "C4"), "good channel cleared");
    }
}
