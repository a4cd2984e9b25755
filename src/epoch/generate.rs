//! Epoch generation over a (possibly discontinuous) record index.
//!
//! # Algorithm
//! 1. Split the record index into contiguous segments (a continuous
//!    recording is a single segment starting at tick 0).
//! 2. In each segment the putative first start is `max(segment start, offset)`.
//!    With alignment, it snaps forward to the first legal start tick inside
//!    the segment; a segment without one yields no epochs.
//! 3. Emit `[s, s + len)` while it ends inside the segment, stepping
//!    `s += inc`.  A trailing partial epoch is dropped, never truncated.
//! 4. Every emitted epoch is mapped to the records it touches.
//!
//! Because epochs are confined to one segment, no epoch spans a gap.
use std::collections::BTreeSet;

use log::debug;

use super::map::EpochRecordMap;
use crate::annot::AnnotationStore;
use crate::config::EpochParams;
use crate::interval::{Interval, Tp};
use crate::records::RecordIndex;

/// Output of one generation pass.
#[derive(Debug, Clone, Default)]
pub struct EpochGrid {
    pub epochs: Vec<Interval>,
    pub map: EpochRecordMap,
}

/// Legal epoch start ticks implied by the instances of the named classes.
///
/// An instance `[a, b)` contributes `a, a + len, a + 2·len, …` for every
/// start whose full epoch still fits inside it; an instance shorter than
/// one epoch contributes nothing.  Unknown class names are ignored.
pub fn alignment_starts<A: AnnotationStore + ?Sized>(
    annots: &A,
    classes: &[String],
    len: Tp,
) -> BTreeSet<Tp> {
    let mut starts = BTreeSet::new();
    if len == 0 {
        return starts;
    }
    for name in classes {
        let Some(h) = annots.find(name) else {
            debug!("alignment class '{name}' not found");
            continue;
        };
        for inst in annots.instances(h) {
            let mut t = inst.interval.start;
            while t + len <= inst.interval.stop {
                starts.insert(t);
                t += len;
            }
        }
    }
    starts
}

/// Generate epochs for `records`.
///
/// `align = Some(starts)` restricts each segment's first epoch to one of
/// `starts`; an empty set therefore yields zero epochs.  Later epochs of the
/// segment step by `inc` from there and are not re-aligned, so they can run
/// past the annotation that anchored the first one.
pub fn generate(
    records: &RecordIndex,
    params: &EpochParams,
    align: Option<&BTreeSet<Tp>>,
    gap_tolerance: Tp,
) -> EpochGrid {
    let mut grid = EpochGrid::default();
    if records.is_empty() || params.len == 0 || params.inc == 0 {
        return grid;
    }

    let segments = if records.is_continuous() {
        vec![crate::records::Segment {
            first: 0,
            last: records.len() - 1,
            span: Interval::new(0, records.total_duration()),
        }]
    } else {
        records.segments(gap_tolerance)
    };

    for seg in &segments {
        let mut s = seg.span.start.max(params.offset);
        if let Some(starts) = align {
            match starts.range(s..seg.span.stop).next() {
                Some(&t) => s = t,
                None => {
                    debug!("segment {} has no aligned start, skipped", seg.span);
                    continue;
                }
            }
        }
        let before = grid.epochs.len();
        while s + params.len <= seg.span.stop {
            let epoch = Interval::from_duration(s, params.len);
            let e = grid.epochs.len();
            map_epoch(records, seg.first, &epoch, e, &mut grid.map);
            grid.epochs.push(epoch);
            s += params.inc;
        }
        debug!(
            "segment {} (records {}..={}): {} epochs",
            seg.span,
            seg.first,
            seg.last,
            grid.epochs.len() - before
        );
    }
    grid
}

fn map_epoch(
    records: &RecordIndex,
    seg_first: usize,
    epoch: &Interval,
    e: usize,
    map: &mut EpochRecordMap,
) {
    let last_tick = epoch.stop - 1;
    let first = if records.is_continuous() {
        (epoch.start / records.record_duration()) as usize
    } else {
        records.floor_record(epoch.start).unwrap_or(seg_first).max(seg_first)
    };
    let mut r = first;
    while let Some(start) = records.start(r) {
        if start > last_tick {
            break;
        }
        if records.end(r).is_some_and(|end| end >= epoch.start) {
            map.insert(e, r);
        }
        r += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_drops_trailing_partial() {
        let idx = RecordIndex::continuous(10, 1000);
        let grid = generate(&idx, &EpochParams::new(4000, None, 0), None, 0);
        assert_eq!(grid.epochs, vec![Interval::new(0, 4000), Interval::new(4000, 8000)]);
    }

    #[test]
    fn overlapping_epochs() {
        let idx = RecordIndex::continuous(10, 1000);
        let grid = generate(&idx, &EpochParams::new(4000, Some(2000), 0), None, 0);
        // starts 0, 2, 4, 6 s; 8 s would end at 12 s.
        assert_eq!(grid.epochs.len(), 4);
        assert_eq!(grid.map.record_epochs(5).iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn offset_shifts_grid() {
        let idx = RecordIndex::continuous(10, 1000);
        let grid = generate(&idx, &EpochParams::new(3000, None, 500), None, 0);
        assert_eq!(grid.epochs[0], Interval::new(500, 3500));
        assert_eq!(grid.epochs.len(), 3);
        assert_eq!(grid.map.epoch_records(0).len(), 4);
    }

    #[test]
    fn empty_alignment_yields_nothing() {
        let idx = RecordIndex::continuous(10, 1000);
        let grid = generate(&idx, &EpochParams::new(1000, None, 0), Some(&BTreeSet::new()), 0);
        assert!(grid.epochs.is_empty());
    }
}
