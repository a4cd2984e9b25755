//! Interval → (record, sample) resolution.
//!
//! Given a half-open interval and a channel's samples-per-record, find the
//! first and last sample to read.  Sample `k` of record `r` sits at tick
//! `start(r) + floor(k · record_duration / spr)`, and every tick maps to the
//! sample at or before it: `floor(offset · spr / record_duration)`.  The
//! floors are computed in exact integer arithmetic.
//!
//! # Rules
//! * **start**: the sample whose period contains `interval.start`.
//! * **stop**: the sample containing the last included tick `stop − 1`,
//!   backed off by one when `stop` itself maps to that same sample (the stop
//!   boundary fell strictly between two sample ticks).
//! * **gaps** (discontinuous only): a start inside a gap snaps forward to
//!   sample 0 of the next record; a stop inside a gap snaps back to the last
//!   sample of the record before it.
//! * **consistency**: if start lands exactly one sample after stop and the
//!   start did not come from a gap snap, the range collapses to the single
//!   start sample (point events, including ones sitting on a record
//!   boundary).  Any other inversion means the interval covers no recorded
//!   data and resolution yields `None`.
use crate::interval::{Interval, Tp};
use crate::records::RecordIndex;

/// Inclusive sample range spanning one or more records (current numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpan {
    pub start_record: usize,
    pub start_sample: usize,
    pub stop_record: usize,
    pub stop_sample: usize,
}

impl SampleSpan {
    /// Number of samples covered, given `spr` samples per record.
    pub fn n_samples(&self, spr: usize) -> usize {
        (self.stop_record - self.start_record) * spr + self.stop_sample + 1 - self.start_sample
    }
}

#[inline]
fn sample_of(offset: Tp, spr: usize, dur: Tp) -> i64 {
    (offset as u128 * spr as u128 / dur as u128) as i64
}

/// Resolve `interval` against `records` for a channel with `spr` samples per record.
///
/// Returns `None` when the interval covers no recorded sample.
pub fn resolve(records: &RecordIndex, interval: &Interval, spr: usize) -> Option<SampleSpan> {
    if records.is_empty() || spr == 0 || records.record_duration() == 0 {
        return None;
    }
    let (lin_start, start_snapped, lin_stop) = if records.is_continuous() {
        resolve_continuous(records, interval, spr)?
    } else {
        resolve_discontinuous(records, interval, spr)?
    };

    let spr_i = spr as i64;
    let (lin_start, lin_stop) = if lin_start == lin_stop + 1 && !start_snapped {
        (lin_start, lin_start)
    } else if lin_start > lin_stop {
        return None;
    } else {
        (lin_start, lin_stop)
    };

    Some(SampleSpan {
        start_record: (lin_start / spr_i) as usize,
        start_sample: (lin_start % spr_i) as usize,
        stop_record: (lin_stop / spr_i) as usize,
        stop_sample: (lin_stop % spr_i) as usize,
    })
}

/// Closed form: record `r` starts at `r × record_duration`.
fn resolve_continuous(records: &RecordIndex, iv: &Interval, spr: usize) -> Option<(i64, bool, i64)> {
    let dur = records.record_duration();
    let n = records.len() as i64;
    let spr_i = spr as i64;
    let locate = |tp: Tp| -> i64 { (tp / dur) as i64 * spr_i + sample_of(tp % dur, spr, dur) };

    let start_rec = (iv.start / dur) as i64;
    if start_rec >= n {
        return None;
    }
    let lin_start = locate(iv.start);

    let lin_stop = if iv.stop == 0 {
        -1
    } else if ((iv.stop - 1) / dur) as i64 >= n {
        n * spr_i - 1
    } else {
        let lin = locate(iv.stop - 1);
        if locate(iv.stop) == lin {
            lin - 1
        } else {
            lin
        }
    };
    Some((lin_start, false, lin_stop))
}

/// Search-based: floor lookups in the start-tick index with gap snapping.
fn resolve_discontinuous(
    records: &RecordIndex,
    iv: &Interval,
    spr: usize,
) -> Option<(i64, bool, i64)> {
    let dur = records.record_duration();
    let spr_i = spr as i64;

    let (lin_start, start_snapped) = match records.floor_record(iv.start) {
        None => (0, true),
        Some(r) => {
            let rs = records.start(r)?;
            if iv.start - rs < dur {
                (r as i64 * spr_i + sample_of(iv.start - rs, spr, dur), false)
            } else if r + 1 < records.len() {
                ((r + 1) as i64 * spr_i, true)
            } else {
                return None;
            }
        }
    };

    let lin_stop = if iv.stop == 0 {
        -1
    } else {
        let last = iv.stop - 1;
        let r = match records.record_after(last) {
            Some(next) => next.checked_sub(1),
            None => Some(records.len() - 1),
        };
        match r {
            None => -1,
            Some(r) => {
                let rs = records.start(r)?;
                if last - rs < dur {
                    let lin = r as i64 * spr_i + sample_of(last - rs, spr, dur);
                    let collides = iv.stop - rs < dur
                        && sample_of(iv.stop - rs, spr, dur) == lin - r as i64 * spr_i;
                    if collides {
                        lin - 1
                    } else {
                        lin
                    }
                } else {
                    (r as i64 + 1) * spr_i - 1
                }
            }
        }
    };
    Some((lin_start, start_snapped, lin_stop))
}

/// `true` if two samples `n_apart` positions apart at `sample_rate` Hz are
/// separated by a discontinuity: their tick difference deviates from the
/// expected one by more than half a sample period.
pub fn is_discontinuity(t1: Tp, t2: Tp, n_apart: u64, sample_rate: f64, ticks_per_second: u64) -> bool {
    if sample_rate <= 0.0 {
        return false;
    }
    let period = ticks_per_second as f64 / sample_rate;
    let expected = n_apart as f64 * period;
    let observed = t2 as f64 - t1 as f64;
    (observed - expected).abs() > period / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Tp = 1_000_000_000;

    #[test]
    fn whole_record_continuous() {
        let idx = RecordIndex::continuous(10, SEC);
        let span = resolve(&idx, &idx.interval(3).unwrap(), 256).unwrap();
        assert_eq!(span, SampleSpan { start_record: 3, start_sample: 0, stop_record: 3, stop_sample: 255 });
    }

    #[test]
    fn stop_between_samples_backs_off() {
        // 100 Hz: samples every 10 ms; stop at 505 ms lies between samples 50 and 51.
        let idx = RecordIndex::continuous(1, SEC);
        let span = resolve(&idx, &Interval::new(5 * SEC / 1000, 505 * SEC / 1000), 100).unwrap();
        assert_eq!((span.start_sample, span.stop_sample), (0, 49));
        assert_eq!(span.n_samples(100), 50);
    }

    #[test]
    fn point_event_is_single_sample() {
        let idx = RecordIndex::continuous(2, SEC);
        // On a sample tick.
        let s = resolve(&idx, &Interval::point(SEC / 2), 100).unwrap();
        assert_eq!((s.start_record, s.start_sample, s.stop_sample), (0, 50, 50));
        // Between sample ticks.
        let s = resolve(&idx, &Interval::point(SEC / 2 + 3), 100).unwrap();
        assert_eq!((s.start_sample, s.stop_sample), (50, 50));
        // On a record boundary.
        let s = resolve(&idx, &Interval::point(SEC), 100).unwrap();
        assert_eq!((s.start_record, s.start_sample, s.stop_record, s.stop_sample), (1, 0, 1, 0));
        // At tick zero.
        let s = resolve(&idx, &Interval::point(0), 100).unwrap();
        assert_eq!(s.n_samples(100), 1);
    }

    #[test]
    fn beyond_end() {
        let idx = RecordIndex::continuous(2, SEC);
        assert!(resolve(&idx, &Interval::new(3 * SEC, 4 * SEC), 100).is_none());
        let s = resolve(&idx, &Interval::new(SEC, 9 * SEC), 100).unwrap();
        assert_eq!((s.stop_record, s.stop_sample), (1, 99));
    }

    #[test]
    fn gap_snapping() {
        // records at 0 s and 5 s; 1 s each.
        let idx = RecordIndex::discontinuous(SEC, vec![0, 5 * SEC]);
        let s = resolve(&idx, &Interval::new(SEC / 2, 6 * SEC), 10).unwrap();
        assert_eq!((s.start_record, s.start_sample), (0, 5));
        assert_eq!((s.stop_record, s.stop_sample), (1, 9));

        let s = resolve(&idx, &Interval::new(2 * SEC, 5 * SEC + SEC / 2), 10).unwrap();
        assert_eq!((s.start_record, s.start_sample), (1, 0), "start snaps forward");

        let s = resolve(&idx, &Interval::new(SEC / 2, 3 * SEC), 10).unwrap();
        assert_eq!((s.stop_record, s.stop_sample), (0, 9), "stop snaps back");

        assert!(resolve(&idx, &Interval::new(2 * SEC, 4 * SEC), 10).is_none(), "gap only");
        assert!(resolve(&idx, &Interval::point(3 * SEC), 10).is_none());
        assert!(resolve(&idx, &Interval::new(7 * SEC, 8 * SEC), 10).is_none());
    }

    #[test]
    fn point_on_record_after_gap() {
        let idx = RecordIndex::discontinuous(SEC, vec![0, 5 * SEC]);
        let s = resolve(&idx, &Interval::point(5 * SEC), 10).unwrap();
        assert_eq!((s.start_record, s.start_sample, s.stop_record, s.stop_sample), (1, 0, 1, 0));
    }

    #[test]
    fn discontinuity_test() {
        // 100 Hz at nanosecond ticks: period 10 ms.
        assert!(!is_discontinuity(0, 10_000_000, 1, 100.0, SEC));
        assert!(!is_discontinuity(0, 14_000_000, 1, 100.0, SEC));
        assert!(is_discontinuity(0, 16_000_000, 1, 100.0, SEC));
    }
}
