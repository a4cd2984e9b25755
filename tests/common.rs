//! Shared builders for timeline tests.
//!
//! All helpers use 1000 ticks per second so tick values read as milliseconds.
use ndarray::Array2;
use psg_timeline::{AnnotationSet, Interval, MemoryStore, RecordIndex, Timeline, TimelineConfig, Tp};

pub const TPS: u64 = 1000;

#[allow(unused)]
pub fn secs(s: f64) -> Tp {
    (s * TPS as f64).round() as Tp
}

#[allow(unused)]
pub fn config(epoch_len_secs: f64) -> TimelineConfig {
    TimelineConfig { ticks_per_second: TPS, epoch_len_secs, seed: Some(42), ..TimelineConfig::default() }
}

#[allow(unused)]
/// `n` one-second records, back to back.
pub fn continuous(n: usize) -> RecordIndex {
    RecordIndex::continuous(n, TPS)
}

#[allow(unused)]
/// Ten one-second records with record 5 starting two seconds late.
pub fn gap_after_record_4() -> RecordIndex {
    let starts = (0..10u64).map(|r| if r < 5 { r * TPS } else { (r + 2) * TPS }).collect();
    RecordIndex::discontinuous(TPS, starts)
}

#[allow(unused)]
pub fn timeline(n_records: usize, epoch_len_secs: f64) -> Timeline {
    Timeline::new(config(epoch_len_secs), continuous(n_records)).unwrap()
}

#[allow(unused)]
/// Annotation set from `(class, start s, stop s)` triples.
pub fn annotations(items: &[(&str, f64, f64)]) -> AnnotationSet {
    let mut set = AnnotationSet::new();
    for &(class, a, b) in items {
        set.add(class, Interval::new(secs(a), secs(b)), None);
    }
    set
}

#[allow(unused)]
/// Single-channel store whose sample values equal their global sample index.
pub fn indexed_store(n_records: usize, spr: usize) -> MemoryStore {
    let data = Array2::from_shape_fn((n_records, spr), |(r, k)| (r * spr + k) as f64);
    MemoryStore::new(n_records, TPS).with_channel("C3", data).unwrap()
}

#[allow(unused)]
pub fn bits(tl: &Timeline) -> Vec<bool> {
    tl.mask().bits().to_vec()
}

#[allow(unused)]
pub fn from_pattern(p: &str) -> Vec<bool> {
    p.chars().filter(|c| !c.is_whitespace()).map(|c| c == '1').collect()
}
