//! Epoch mask and channel-epoch (CHEP) mask.
//!
//! The epoch mask is one bit per original epoch (`true` = excluded).  Every
//! mutation goes through [`EpochMask::set`], which combines the requested
//! value with the current bit according to the active [`MaskMode`]:
//!
//! | mode     | effect of `set(e, requested)`          |
//! |----------|----------------------------------------|
//! | `Mask`   | only 0 → 1 transitions                 |
//! | `Unmask` | only 1 → 0 transitions                 |
//! | `Force`  | bit becomes `requested`                |
pub mod chep;
pub mod expr;
pub mod predicate;

use serde::Serialize;

pub use chep::ChepMask;
pub use expr::{Binding, Bindings, ExpressionEvaluator, RhaiEvaluator};
pub use predicate::{EvalContext, MaskPredicate, MatchResult};

/// How new predicate results combine with existing mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskMode {
    /// Matches may only exclude epochs.
    #[default]
    Mask,
    /// Matches may only re-include epochs.
    Unmask,
    /// Matches exclude, non-matches include.
    Force,
}

/// Effect of one [`EpochMask::set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskOutcome {
    NoChange,
    /// Bit went 0 → 1.
    Set,
    /// Bit went 1 → 0.
    Unset,
}

/// Per-epoch exclusion bits plus the active mask mode.
#[derive(Debug, Clone, Default)]
pub struct EpochMask {
    bits: Vec<bool>,
    mode: MaskMode,
    applied: bool,
}

impl EpochMask {
    /// All-included mask over `n` epochs.
    pub fn new(n: usize) -> Self {
        Self { bits: vec![false; n], mode: MaskMode::default(), applied: false }
    }

    /// Fresh mask over `n` epochs keeping the current mode.
    pub fn reset(&mut self, n: usize) {
        self.bits = vec![false; n];
        self.applied = false;
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MaskMode) {
        self.mode = mode;
    }

    /// `true` once any masking operation has been applied since the last reset.
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Excluded?  Unknown epochs read as included.
    pub fn is_masked(&self, e: usize) -> bool {
        self.bits.get(e).copied().unwrap_or(false)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn n_masked(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn n_unmasked(&self) -> usize {
        self.len() - self.n_masked()
    }

    /// Request bit `e` to become `requested`, subject to the mask mode.
    pub fn set(&mut self, e: usize, requested: bool) -> MaskOutcome {
        self.applied = true;
        let Some(bit) = self.bits.get_mut(e) else {
            return MaskOutcome::NoChange;
        };
        let original = *bit;
        *bit = match self.mode {
            MaskMode::Mask => original || requested,
            MaskMode::Unmask => original && requested,
            MaskMode::Force => requested,
        };
        outcome(original, *bit)
    }

    /// Set bit `e` regardless of the mask mode.
    pub fn force(&mut self, e: usize, value: bool) -> MaskOutcome {
        self.applied = true;
        let Some(bit) = self.bits.get_mut(e) else {
            return MaskOutcome::NoChange;
        };
        let original = *bit;
        *bit = value;
        outcome(original, value)
    }
}

fn outcome(before: bool, after: bool) -> MaskOutcome {
    match (before, after) {
        (false, true) => MaskOutcome::Set,
        (true, false) => MaskOutcome::Unset,
        _ => MaskOutcome::NoChange,
    }
}

/// Counts reported after every mask operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaskSummary {
    /// Short description of the operation.
    pub op: String,
    pub mode: MaskMode,
    /// Epochs for which the predicate held.
    pub matched: usize,
    /// Epochs the predicate could not be evaluated for.
    pub invalid: usize,
    pub newly_masked: usize,
    pub newly_unmasked: usize,
    pub unchanged: usize,
    /// Unmasked epochs after the operation.
    pub retained: usize,
    pub total: usize,
}

impl MaskSummary {
    pub fn new(op: impl Into<String>, mode: MaskMode) -> Self {
        Self { op: op.into(), mode, ..Self::default() }
    }

    pub fn tally(&mut self, o: MaskOutcome) {
        match o {
            MaskOutcome::Set => self.newly_masked += 1,
            MaskOutcome::Unset => self.newly_unmasked += 1,
            MaskOutcome::NoChange => self.unchanged += 1,
        }
    }

    /// Fill `retained` / `total` from the final mask.
    pub fn finish(mut self, mask: &EpochMask) -> Self {
        self.retained = mask.n_unmasked();
        self.total = mask.len();
        self
    }

    /// `true` if any bit changed.
    pub fn changed(&self) -> bool {
        self.newly_masked + self.newly_unmasked > 0
    }
}

impl std::fmt::Display for MaskSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} matched ({} invalid), {} masked, {} unmasked, {} unchanged; {} of {} epochs retained",
            self.op,
            self.matched,
            self.invalid,
            self.newly_masked,
            self.newly_unmasked,
            self.unchanged,
            self.retained,
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_rules() {
        let mut m = EpochMask::new(2);
        assert_eq!(m.set(0, true), MaskOutcome::Set);
        assert_eq!(m.set(0, false), MaskOutcome::NoChange, "mask mode never clears");

        m.set_mode(MaskMode::Unmask);
        assert_eq!(m.set(1, true), MaskOutcome::NoChange, "unmask mode never sets");
        assert_eq!(m.set(0, false), MaskOutcome::Unset);

        m.set_mode(MaskMode::Force);
        assert_eq!(m.set(1, true), MaskOutcome::Set);
        assert_eq!(m.set(1, false), MaskOutcome::Unset);
        assert!(m.is_applied());
    }

    #[test]
    fn out_of_range_is_no_change() {
        let mut m = EpochMask::new(1);
        assert_eq!(m.set(5, true), MaskOutcome::NoChange);
        assert!(!m.is_masked(5));
    }

    #[test]
    fn reset_keeps_mode() {
        let mut m = EpochMask::new(3);
        m.set_mode(MaskMode::Force);
        m.set(1, true);
        m.reset(4);
        assert_eq!(m.mode(), MaskMode::Force);
        assert_eq!(m.n_masked(), 0);
        assert!(!m.is_applied());
    }
}
