//! The timeline: record index, epochs, masks and numbering for one recording.
//!
//! [`Timeline`] exclusively owns the record index, the epoch sequence, the
//! epoch ↔ record map, both masks, the epoch-level label table and the
//! numbering maps.  All of them are rebuilt together by a single private
//! regeneration step, so they can never describe different epochings.
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use crate::annot::AnnotationStore;
use crate::config::{EpochParams, TimelineConfig};
use crate::epoch::{alignment_starts, generate, EpochCursor, EpochNumbering, EpochRecordMap};
use crate::error::{Result, TimelineError};
use crate::interval::{merge_intervals, Interval, Tp};
use crate::mask::chep::ChannelVerdict;
use crate::mask::{
    ChepMask, EpochMask, EvalContext, ExpressionEvaluator, MaskMode, MaskOutcome, MaskPredicate,
    MaskSummary, MatchResult, RhaiEvaluator,
};
use crate::records::RecordIndex;
use crate::report::{NullSink, SummarySink};
use crate::resolve::{resolve, SampleSpan};
use crate::store::{read_interval, record_index, SampleStore, SignalSlice};

pub struct Timeline {
    config: TimelineConfig,
    params: EpochParams,
    align: Option<BTreeSet<Tp>>,
    records: RecordIndex,
    epochs: Vec<Interval>,
    map: EpochRecordMap,
    mask: EpochMask,
    chep: ChepMask,
    numbering: EpochNumbering,
    cursor: EpochCursor,
    epoch_labels: BTreeMap<String, BTreeSet<usize>>,
    evaluator: Box<dyn ExpressionEvaluator>,
    sink: Box<dyn SummarySink>,
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("params", &self.params)
            .field("records", &self.records.len())
            .field("epochs", &self.epochs.len())
            .field("masked", &self.mask.n_masked())
            .field("mode", &self.mask.mode())
            .finish_non_exhaustive()
    }
}

impl Timeline {
    /// Epoch `records` with the grid from `config`.
    ///
    /// Fails if `config.align_annotations` is non-empty; use
    /// [`with_annotations`](Self::with_annotations) for aligned epochs.
    pub fn new(config: TimelineConfig, records: RecordIndex) -> Result<Self> {
        if !config.align_annotations.is_empty() {
            return Err(TimelineError::Config(
                "epoch alignment needs an annotation store (Timeline::with_annotations)".into(),
            ));
        }
        Self::build(config, records, None)
    }

    /// Like [`new`](Self::new), resolving `config.align_annotations` in `annots`.
    pub fn with_annotations(
        config: TimelineConfig,
        records: RecordIndex,
        annots: &dyn AnnotationStore,
    ) -> Result<Self> {
        let align = if config.align_annotations.is_empty() {
            None
        } else {
            let params = config.epoch_params()?;
            Some(alignment_starts(annots, &config.align_annotations, params.len))
        };
        Self::build(config, records, align)
    }

    /// Build the record index from a sample store, then epoch it.
    pub fn from_store<S: SampleStore + ?Sized>(
        config: TimelineConfig,
        store: &S,
        annots: &dyn AnnotationStore,
    ) -> Result<Self> {
        Self::with_annotations(config, record_index(store), annots)
    }

    fn build(config: TimelineConfig, records: RecordIndex, align: Option<BTreeSet<Tp>>) -> Result<Self> {
        let params = config.epoch_params()?;
        if !records.is_empty() {
            params.validate(records.record_duration())?;
        }
        let mut tl = Self {
            config,
            params,
            align,
            records,
            epochs: vec![],
            map: EpochRecordMap::new(),
            mask: EpochMask::new(0),
            chep: ChepMask::new(),
            numbering: EpochNumbering::default(),
            cursor: EpochCursor::default(),
            epoch_labels: BTreeMap::new(),
            evaluator: Box::new(RhaiEvaluator::new()),
            sink: Box::new(NullSink),
        };
        tl.regenerate(None);
        Ok(tl)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn params(&self) -> EpochParams {
        self.params
    }

    pub fn records(&self) -> &RecordIndex {
        &self.records
    }

    pub fn set_sink(&mut self, sink: Box<dyn SummarySink>) {
        self.sink = sink;
    }

    pub fn set_evaluator(&mut self, evaluator: Box<dyn ExpressionEvaluator>) {
        self.evaluator = evaluator;
    }

    /// Record `r` as `[start, end + 1)`; `None` for unknown records.
    pub fn record_interval(&self, r: usize) -> Option<Interval> {
        self.records.interval(r)
    }

    // ── Epoch generation ────────────────────────────────────────────────────

    /// Re-epoch with new parameters.
    ///
    /// `align = Some(starts)` restricts each segment's first epoch to one of
    /// `starts` (see [`alignment_starts`]).  Parameters are validated before
    /// anything changes; on success the mask, CHEP mask, epoch labels and
    /// numbering are all reset.  Returns the number of epochs.
    pub fn set_epochs(&mut self, params: EpochParams, align: Option<BTreeSet<Tp>>) -> Result<usize> {
        params.validate(self.records.record_duration())?;
        self.params = params;
        self.align = align;
        self.regenerate(None);
        Ok(self.epochs.len())
    }

    /// Re-epoch aligned to the instances of `classes` in `annots`.
    pub fn align_epochs(
        &mut self,
        params: EpochParams,
        annots: &dyn AnnotationStore,
        classes: &[String],
    ) -> Result<usize> {
        let starts = alignment_starts(annots, classes, params.len);
        if starts.is_empty() {
            warn!("no legal aligned epoch start for {classes:?}");
        }
        self.set_epochs(params, Some(starts))
    }

    /// The single regeneration entry point.
    ///
    /// `inherit` maps previous epoch intervals to display numbers; matching
    /// regenerated epochs keep them, others get fresh numbers.
    fn regenerate(&mut self, inherit: Option<&BTreeMap<Interval, usize>>) {
        let grid = generate(
            &self.records,
            &self.params,
            self.align.as_ref(),
            self.config.gap_tolerance_ticks,
        );
        let n = grid.epochs.len();
        self.numbering = match inherit {
            None => EpochNumbering::sequential(n),
            Some(prev) => {
                let mut fresh = prev.values().copied().max().unwrap_or(0);
                let display = grid
                    .epochs
                    .iter()
                    .map(|ep| match prev.get(ep) {
                        Some(&d) => d,
                        None => {
                            fresh += 1;
                            fresh
                        }
                    })
                    .collect();
                EpochNumbering::with_display(display)
            }
        };
        self.epochs = grid.epochs;
        self.map = grid.map;
        self.mask.reset(n);
        self.chep.clear();
        self.epoch_labels.clear();
        self.cursor.reset();
        info!(
            "epoched {} records: {} epochs (len={} inc={} offset={} tp{})",
            self.records.len(),
            n,
            self.params.len,
            self.params.inc,
            self.params.offset,
            if self.align.is_some() { ", aligned" } else { "" }
        );
    }

    // ── Epoch queries ───────────────────────────────────────────────────────

    pub fn n_epochs(&self) -> usize {
        self.epochs.len()
    }

    pub fn epochs(&self) -> &[Interval] {
        &self.epochs
    }

    pub fn epoch(&self, e: usize) -> Option<Interval> {
        self.epochs.get(e).copied()
    }

    /// Records touched by epoch `e` (current numbering).
    pub fn epoch_records(&self, e: usize) -> &BTreeSet<usize> {
        self.map.epoch_records(e)
    }

    /// Epochs touching record `r`.
    pub fn record_epochs(&self, r: usize) -> &BTreeSet<usize> {
        self.map.record_epochs(r)
    }

    /// Epochs sharing at least one tick with `iv`.
    pub fn epochs_overlapping(&self, iv: &Interval) -> Vec<usize> {
        (0..self.epochs.len()).filter(|&e| self.epochs[e].overlaps(iv)).collect()
    }

    /// Epochs lying entirely inside `iv`.
    pub fn epochs_contained_in(&self, iv: &Interval) -> Vec<usize> {
        (0..self.epochs.len()).filter(|&e| self.epochs[e].is_spanned_by(iv)).collect()
    }

    /// First epoch starting at or after `tp`.
    pub fn first_epoch_starting_at_or_after(&self, tp: Tp) -> Option<usize> {
        let e = self.epochs.partition_point(|ep| ep.start < tp);
        (e < self.epochs.len()).then_some(e)
    }

    // ── Interval resolution & slicing ───────────────────────────────────────

    /// Record/sample span covering `iv` for a channel with `spr` samples per record.
    pub fn resolve(&self, iv: &Interval, spr: usize) -> Option<SampleSpan> {
        resolve(&self.records, iv, spr)
    }

    /// Samples of `channel` over `iv`, with their ticks.
    pub fn slice<S: SampleStore + ?Sized>(
        &self,
        store: &S,
        channel: usize,
        iv: &Interval,
    ) -> anyhow::Result<Option<SignalSlice>> {
        read_interval(&self.records, store, channel, iv)
    }

    /// Samples of `channel` over epoch `e`.
    pub fn epoch_slice<S: SampleStore + ?Sized>(
        &self,
        store: &S,
        channel: usize,
        e: usize,
    ) -> anyhow::Result<Option<SignalSlice>> {
        match self.epoch(e) {
            Some(iv) => self.slice(store, channel, &iv),
            None => Ok(None),
        }
    }

    // ── Iteration & numbering ───────────────────────────────────────────────

    /// Rewind the epoch cursor.
    pub fn first_epoch(&mut self) {
        self.cursor.reset();
    }

    /// Next unmasked epoch.
    pub fn next_epoch(&mut self) -> Option<usize> {
        self.cursor.next(self.mask.bits(), true)
    }

    /// Next epoch, masked or not.
    pub fn next_epoch_ignoring_mask(&mut self) -> Option<usize> {
        self.cursor.next(self.mask.bits(), false)
    }

    /// Unmasked epochs in order, without touching the cursor.
    pub fn unmasked_epochs(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.epochs.len()).filter(|&e| !self.mask.is_masked(e))
    }

    /// Stable 1-based display number of epoch `e`.
    pub fn display_epoch(&self, e: usize) -> Option<usize> {
        self.numbering.display(e)
    }

    /// Original epoch index carrying display number `d`.
    pub fn original_epoch(&self, display: usize) -> Option<usize> {
        self.numbering.original(display)
    }

    /// Current number of epoch `e` among unmasked epochs; `None` if masked.
    pub fn current_epoch_index(&mut self, e: usize) -> Option<usize> {
        self.numbering.refresh(self.mask.bits());
        self.numbering.current(e)
    }

    /// Original epoch holding current number `c`.
    pub fn original_of_current(&mut self, c: usize) -> Option<usize> {
        self.numbering.refresh(self.mask.bits());
        self.numbering.original_of_current(c)
    }

    // ── Epoch-level labels ──────────────────────────────────────────────────

    pub fn annotate_epoch(&mut self, label: &str, e: usize) {
        if e < self.epochs.len() {
            self.epoch_labels.entry(label.to_string()).or_default().insert(e);
        }
    }

    pub fn epoch_has(&self, label: &str, e: usize) -> bool {
        self.epoch_labels.get(label).is_some_and(|s| s.contains(&e))
    }

    pub fn epoch_labels(&self) -> &BTreeMap<String, BTreeSet<usize>> {
        &self.epoch_labels
    }

    /// Collapse the named annotation classes into the epoch-level table.
    ///
    /// Returns the number of (label, epoch) pairs added.
    pub fn build_epoch_annotations(&mut self, annots: &dyn AnnotationStore, names: &[String]) -> usize {
        let mut added = 0;
        for name in names {
            let Some(h) = annots.find(name) else {
                warn!("annotation class '{name}' not found");
                continue;
            };
            let set = self.epoch_labels.entry(name.clone()).or_default();
            for (e, ep) in self.epochs.iter().enumerate() {
                if !annots.extract(h, ep).is_empty() && set.insert(e) {
                    added += 1;
                }
            }
        }
        debug!("epoch annotation table: {added} entries added");
        added
    }

    // ── Epoch mask ──────────────────────────────────────────────────────────

    pub fn mask_mode(&self) -> MaskMode {
        self.mask.mode()
    }

    pub fn set_mask_mode(&mut self, mode: MaskMode) {
        self.mask.set_mode(mode);
    }

    pub fn mask(&self) -> &EpochMask {
        &self.mask
    }

    pub fn is_masked(&self, e: usize) -> bool {
        self.mask.is_masked(e)
    }

    pub fn n_unmasked(&self) -> usize {
        self.mask.n_unmasked()
    }

    /// `true` once any mask operation was applied to the current epoching.
    pub fn is_mask_set(&self) -> bool {
        self.mask.is_applied()
    }

    /// Mask-set primitive, subject to the active mode.
    pub fn set_epoch_mask(&mut self, e: usize, requested: bool) -> MaskOutcome {
        let o = self.mask.set(e, requested);
        if o != MaskOutcome::NoChange {
            self.numbering.invalidate();
        }
        o
    }

    /// Evaluate `pred` and fold the results into the mask.
    ///
    /// Under `Mask` and `Force` a match requests exclusion; under `Unmask`
    /// a match requests inclusion.  Invalid results count as non-matches.
    ///
    /// Selection predicates always request their exclusion state, which
    /// leaves the mask untouched under `Unmask`, and count as matched only
    /// the epochs they newly select.
    pub fn apply_mask(&mut self, pred: &MaskPredicate, annots: &dyn AnnotationStore) -> Result<MaskSummary> {
        let results = {
            let ctx = EvalContext {
                epochs: &self.epochs,
                mask: self.mask.bits(),
                numbering: &self.numbering,
                epoch_labels: &self.epoch_labels,
                annots,
                evaluator: self.evaluator.as_ref(),
                seed: self.config.seed,
                ticks_per_second: self.config.ticks_per_second,
            };
            pred.evaluate(&ctx)?
        };
        let mode = self.mask.mode();
        let selection = pred.is_selection();
        let mut summary = MaskSummary::new(pred.describe(), mode);
        for (e, r) in results.into_iter().enumerate() {
            match r {
                MatchResult::Match if selection && self.mask.is_masked(e) => {}
                MatchResult::Match => summary.matched += 1,
                MatchResult::Invalid => summary.invalid += 1,
                MatchResult::NoMatch => {}
            }
            let hit = r.is_match();
            let requested = match mode {
                MaskMode::Unmask if !selection => !hit,
                MaskMode::Unmask | MaskMode::Mask | MaskMode::Force => hit,
            };
            summary.tally(self.mask.set(e, requested));
        }
        Ok(self.report(summary))
    }

    /// Invert every bit, ignoring the mask mode.
    pub fn flip_mask(&mut self) -> MaskSummary {
        let mut summary = MaskSummary::new("flip", self.mask.mode());
        for e in 0..self.mask.len() {
            let v = !self.mask.is_masked(e);
            summary.matched += 1;
            summary.tally(self.mask.force(e, v));
        }
        self.report(summary)
    }

    /// Exclude every epoch, ignoring the mask mode.
    pub fn mask_all(&mut self) -> MaskSummary {
        self.force_all("mask-all", true)
    }

    /// Include every epoch, ignoring the mask mode.
    pub fn clear_mask(&mut self) -> MaskSummary {
        self.force_all("clear", false)
    }

    fn force_all(&mut self, op: &str, value: bool) -> MaskSummary {
        let mut summary = MaskSummary::new(op, self.mask.mode());
        for e in 0..self.mask.len() {
            summary.matched += 1;
            summary.tally(self.mask.force(e, value));
        }
        self.report(summary)
    }

    fn report(&mut self, summary: MaskSummary) -> MaskSummary {
        let summary = summary.finish(&self.mask);
        if summary.changed() {
            self.numbering.invalidate();
        }
        info!("{summary}");
        self.sink.record(&summary);
        summary
    }

    /// Masked epochs merged into disjoint intervals.
    pub fn masked_intervals(&self) -> Vec<Interval> {
        let v = (0..self.epochs.len())
            .filter(|&e| self.mask.is_masked(e))
            .map(|e| self.epochs[e])
            .collect();
        merge_intervals(v)
    }

    /// Mask bits in display order, as `(display number, masked)`.
    pub fn mask_dump(&self) -> Vec<(usize, bool)> {
        (0..self.epochs.len())
            .map(|e| (self.numbering.display(e).unwrap_or(e + 1), self.mask.is_masked(e)))
            .collect()
    }

    /// Overwrite the mask bits, ignoring the mask mode.
    ///
    /// `bits` must have exactly one entry per epoch.
    pub fn restore_mask(&mut self, bits: &[bool]) -> Result<MaskSummary> {
        if bits.len() != self.epochs.len() {
            return Err(TimelineError::Config(format!(
                "mask has {} entries, timeline has {} epochs",
                bits.len(),
                self.epochs.len()
            )));
        }
        let mut summary = MaskSummary::new("restore", self.mask.mode());
        for (e, &b) in bits.iter().enumerate() {
            if b {
                summary.matched += 1;
            }
            summary.tally(self.mask.force(e, b));
        }
        Ok(self.report(summary))
    }

    /// A record is masked if any epoch touching it is masked.
    pub fn record_masked(&self, r: usize) -> bool {
        self.map.record_epochs(r).iter().any(|&e| self.mask.is_masked(e))
    }

    // ── CHEP mask ───────────────────────────────────────────────────────────

    pub fn chep(&self) -> &ChepMask {
        &self.chep
    }

    pub fn chep_mut(&mut self) -> &mut ChepMask {
        &mut self.chep
    }

    pub fn mask_channel(&mut self, e: usize, ch: &str) {
        if e < self.epochs.len() {
            self.chep.mask_channel(e, ch);
        }
    }

    pub fn unmask_channel(&mut self, e: usize, ch: &str) {
        self.chep.unmask_channel(e, ch);
    }

    /// Replace (or, with `merge`, extend) the CHEP mask from
    /// `(display number, channel)` pairs.
    pub fn load_chep(&mut self, pairs: &[(usize, String)], merge: bool) -> Result<usize> {
        let mut incoming = ChepMask::new();
        for (d, ch) in pairs {
            let e = self.numbering.original(*d).ok_or(TimelineError::UnknownEpoch(*d))?;
            incoming.mask_channel(e, ch);
        }
        let n = incoming.n_pairs();
        if merge {
            self.chep.merge(incoming);
        } else {
            self.chep = incoming;
        }
        Ok(n)
    }

    /// CHEP contents as `(display number, channel)` pairs.
    pub fn chep_pairs(&self) -> Vec<(usize, String)> {
        self.chep
            .iter()
            .flat_map(|(e, chs)| {
                let d = self.numbering.display(e).unwrap_or(e + 1);
                chs.iter().map(move |c| (d, c.clone()))
            })
            .collect()
    }

    /// Roll CHEP state up into the epoch mask (see [`ChepMask::collapse_to_epochs`]).
    pub fn collapse_chep_to_epochs(&mut self, channels: &[String], k: usize, p: f64) -> MaskSummary {
        let summary = self.chep.collapse_to_epochs(&mut self.mask, channels, k, p);
        self.report(summary)
    }

    /// Roll CHEP state up into whole-channel verdicts over the unmasked epochs.
    pub fn collapse_chep_to_channels(
        &mut self,
        channels: &[String],
        k: usize,
        p: f64,
        propagate_bad: bool,
        propagate_good: bool,
    ) -> ChannelVerdict {
        let considered: Vec<usize> = self.unmasked_epochs().collect();
        let v = self.chep.collapse_to_channels(
            &considered,
            self.epochs.len(),
            channels,
            k,
            p,
            propagate_bad,
            propagate_good,
        );
        info!("chep-channels k={k} p={p}: {} good, {} bad {:?}", v.good.len(), v.bad.len(), v.bad);
        v
    }

    // ── Restructuring ───────────────────────────────────────────────────────

    /// Drop every masked record and re-epoch what remains.
    ///
    /// Does nothing if no mask was applied.  Returns the number of records kept.
    pub fn restructure(&mut self) -> usize {
        if !self.mask.is_applied() {
            debug!("restructure: no mask applied, nothing to drop");
            return self.records.len();
        }
        let keep: BTreeSet<usize> = self.map.records().filter(|&r| !self.record_masked(r)).collect();
        self.restructure_records(&keep)
    }

    /// Keep only the listed records (current numbering) and re-epoch.
    ///
    /// Regenerated epochs whose interval matches a previous epoch keep its
    /// display number.
    pub fn restructure_records(&mut self, keep: &BTreeSet<usize>) -> usize {
        let previous: BTreeMap<Interval, usize> = self
            .epochs
            .iter()
            .enumerate()
            .filter_map(|(e, ep)| self.numbering.display(e).map(|d| (*ep, d)))
            .collect();
        self.records.restructure(keep);
        if self.records.is_empty() {
            warn!("restructure kept no records; timeline is empty");
        }
        self.regenerate(Some(&previous));
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annot::AnnotationSet;

    fn cfg(len: f64) -> TimelineConfig {
        TimelineConfig { ticks_per_second: 1000, epoch_len_secs: len, ..TimelineConfig::default() }
    }

    #[test]
    fn alignment_without_store_rejected() {
        let c = TimelineConfig { align_annotations: vec!["N2".into()], ..cfg(4.0) };
        assert!(Timeline::new(c, RecordIndex::continuous(10, 1000)).is_err());
    }

    #[test]
    fn unmask_mode_requests_inclusion() {
        let mut tl = Timeline::new(cfg(1.0), RecordIndex::continuous(4, 1000)).unwrap();
        let annots = AnnotationSet::new().with("art", Interval::new(1000, 3000), None);
        tl.apply_mask(&MaskPredicate::All, &annots).unwrap();
        tl.set_mask_mode(MaskMode::Unmask);
        let s = tl.apply_mask(&MaskPredicate::annotation("art"), &annots).unwrap();
        assert_eq!(s.newly_unmasked, 2);
        assert_eq!(s.unchanged, 2);
        assert_eq!(tl.mask().bits(), &[true, false, false, true]);
    }

    #[test]
    fn first_epoch_at_or_after() {
        let tl = Timeline::new(cfg(2.0), RecordIndex::continuous(10, 1000)).unwrap();
        assert_eq!(tl.first_epoch_starting_at_or_after(2500), Some(2));
        assert_eq!(tl.first_epoch_starting_at_or_after(9000), None);
    }
}
