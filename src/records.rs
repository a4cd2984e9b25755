//! Record index: physical record numbers ↔ start time points.
//!
//! Records live in an arena of [`Record`]s in *current* order.  Each record
//! remembers its *original* number, so restructuring (dropping records)
//! only shrinks the arena; the start-tick lookup is rebuilt from it and can
//! never drift out of sync with the current → original mapping.
//!
//! A record index is either **continuous** (record `r` starts at
//! `r × record_duration`, closed-form lookups apply) or **discontinuous**
//! (EDF+D style: arbitrary increasing start ticks, gaps allowed).
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::interval::{Interval, Tp};

/// One physical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Record number in the file as loaded.
    pub original: usize,
    /// First tick covered by this record.
    pub start: Tp,
}

/// A maximal run of contiguous records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First record (current numbering).
    pub first: usize,
    /// Last record, inclusive (current numbering).
    pub last: usize,
    /// Ticks covered, half-open.
    pub span: Interval,
}

/// Bidirectional record ↔ time-point map.
#[derive(Debug, Clone)]
pub struct RecordIndex {
    record_duration: Tp,
    continuous: bool,
    records: Vec<Record>,
    by_start: BTreeMap<Tp, usize>,
}

impl RecordIndex {
    /// Build an index for `n_records` back-to-back records.
    pub fn continuous(n_records: usize, record_duration: Tp) -> Self {
        let records = (0..n_records)
            .map(|r| Record { original: r, start: r as Tp * record_duration })
            .collect();
        Self::build(true, record_duration, records)
    }

    /// Build an index from per-record start ticks (EDF+D), where `starts[r]`
    /// belongs to original record `r`.
    ///
    /// Starts are sorted; duplicate starts keep the first record only.
    pub fn discontinuous(record_duration: Tp, starts: Vec<Tp>) -> Self {
        Self::with_originals(record_duration, starts.into_iter().enumerate().collect())
    }

    /// Build an index from `(original record, start tick)` pairs.
    ///
    /// Records are ordered by start and keep their original numbers; of
    /// several records sharing a start only the first listed survives.
    pub fn with_originals(record_duration: Tp, mut pairs: Vec<(usize, Tp)>) -> Self {
        pairs.sort_by_key(|&(_, start)| start);
        pairs.dedup_by_key(|&mut (_, start)| start);
        let records = pairs.into_iter().map(|(original, start)| Record { original, start }).collect();
        Self::build(false, record_duration, records)
    }

    /// Generic entry point: `starts` is consulted only when `continuous` is false.
    pub fn init(continuous: bool, n_records: usize, record_duration: Tp, starts: &[Tp]) -> Self {
        if continuous {
            Self::continuous(n_records, record_duration)
        } else {
            Self::discontinuous(record_duration, starts.to_vec())
        }
    }

    fn build(continuous: bool, record_duration: Tp, records: Vec<Record>) -> Self {
        let by_start = records.iter().enumerate().map(|(r, rec)| (rec.start, r)).collect();
        Self { record_duration, continuous, records, by_start }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn record_duration(&self) -> Tp {
        self.record_duration
    }

    /// `true` if record `r` starts at `r × record_duration` for every `r`.
    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn start(&self, r: usize) -> Option<Tp> {
        self.records.get(r).map(|rec| rec.start)
    }

    /// Last tick covered by record `r` (inclusive).
    pub fn end(&self, r: usize) -> Option<Tp> {
        self.start(r).map(|s| s + self.record_duration - 1)
    }

    /// Ticks covered by record `r`, as `[start, end + 1)`.
    pub fn interval(&self, r: usize) -> Option<Interval> {
        self.start(r).map(|s| Interval::from_duration(s, self.record_duration))
    }

    /// Original record number of current record `r`.
    pub fn original(&self, r: usize) -> Option<usize> {
        self.records.get(r).map(|rec| rec.original)
    }

    /// Current number of original record `orig`, if it survived restructuring.
    pub fn current(&self, orig: usize) -> Option<usize> {
        self.records.iter().position(|rec| rec.original == orig)
    }

    /// Record starting exactly at `tp`.
    pub fn record_starting_at(&self, tp: Tp) -> Option<usize> {
        self.by_start.get(&tp).copied()
    }

    /// Record with the greatest start ≤ `tp`.
    pub fn floor_record(&self, tp: Tp) -> Option<usize> {
        self.by_start.range(..=tp).next_back().map(|(_, &r)| r)
    }

    /// First record whose start is strictly greater than `tp`.
    pub fn record_after(&self, tp: Tp) -> Option<usize> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.by_start.range((Excluded(tp), Unbounded)).next().map(|(_, &r)| r)
    }

    /// Record covering `tp`, or `None` if `tp` falls outside every record.
    pub fn record_at(&self, tp: Tp) -> Option<usize> {
        let r = self.floor_record(tp)?;
        (tp <= self.end(r)?).then_some(r)
    }

    /// First tick of the recording.
    pub fn first_tp(&self) -> Tp {
        self.records.first().map_or(0, |r| r.start)
    }

    /// One tick past the last covered tick.
    pub fn stop_tp(&self) -> Tp {
        self.records.last().map_or(0, |r| r.start + self.record_duration)
    }

    /// Total span from tick 0 to the end of the last record.
    ///
    /// For continuous recordings this is `n_records × record_duration`.
    pub fn total_duration(&self) -> Tp {
        self.stop_tp()
    }

    /// `true` if record `r + 1` starts within `tolerance` ticks of the end of `r`.
    pub fn contiguous_with_next(&self, r: usize, tolerance: Tp) -> bool {
        match (self.records.get(r), self.records.get(r + 1)) {
            (Some(a), Some(b)) => b.start <= a.start + self.record_duration + tolerance,
            _ => false,
        }
    }

    /// Maximal runs of contiguous records.
    pub fn segments(&self, tolerance: Tp) -> Vec<Segment> {
        let mut out = Vec::new();
        if self.is_empty() {
            return out;
        }
        let mut first = 0;
        for r in 0..self.len() {
            let last = r + 1 == self.len();
            if last || !self.contiguous_with_next(r, tolerance) {
                let start = self.records[first].start;
                let stop = self.records[r].start + self.record_duration;
                out.push(Segment { first, last: r, span: Interval::new(start, stop) });
                first = r + 1;
            }
        }
        out
    }

    /// Keep only the current records listed in `keep`, renumbering densely.
    ///
    /// Start ticks are preserved, so the index stays continuous only when the
    /// kept records form a prefix of the original layout.
    pub fn restructure(&mut self, keep: &BTreeSet<usize>) {
        let before = self.len();
        let kept: Vec<Record> = self
            .records
            .iter()
            .enumerate()
            .filter(|(r, _)| keep.contains(r))
            .map(|(_, rec)| *rec)
            .collect();
        let prefix = kept.iter().enumerate().all(|(i, rec)| rec.original == i);
        self.continuous = self.continuous && prefix;
        self.by_start = kept.iter().enumerate().map(|(r, rec)| (rec.start, r)).collect();
        self.records = kept;
        debug!(
            "restructured record index: {} → {} records (continuous={})",
            before,
            self.len(),
            self.continuous
        );
    }
}
