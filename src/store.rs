//! Sample store interface and interval slicing.
//!
//! The timeline does not parse recordings.  A [`SampleStore`] hands out one
//! record at a time (per-channel buffers, original record numbering); the
//! slice reader resolves an interval to a record/sample span and
//! materialises a flat sample array plus the parallel tick array.
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};

use crate::interval::{Interval, Tp};
use crate::records::RecordIndex;
use crate::resolve::{is_discontinuity, resolve};

/// Record-oriented access to a recording.
pub trait SampleStore {
    fn n_records(&self) -> usize;

    /// Duration of one record, in ticks.
    fn record_duration(&self) -> Tp;

    /// `false` for EDF+D style recordings with explicit record times.
    fn is_continuous(&self) -> bool;

    /// Start tick of original record `record`.
    fn timepoint_of(&self, record: usize) -> Option<Tp>;

    fn channel_labels(&self) -> Vec<String>;

    fn samples_per_record(&self, channel: usize) -> Option<usize>;

    /// Per-channel sample buffers of original record `record`.
    fn read(&self, record: usize) -> Result<Vec<Array1<f64>>>;
}

/// Build the record index described by a store.
pub fn record_index<S: SampleStore + ?Sized>(store: &S) -> RecordIndex {
    let n = store.n_records();
    if store.is_continuous() {
        return RecordIndex::continuous(n, store.record_duration());
    }
    let pairs: Vec<(usize, Tp)> = (0..n).filter_map(|r| store.timepoint_of(r).map(|t| (r, t))).collect();
    RecordIndex::with_originals(store.record_duration(), pairs)
}

/// Samples of one channel over an interval.
#[derive(Debug, Clone)]
pub struct SignalSlice {
    pub samples: Array1<f64>,
    /// Tick of each sample.
    pub ticks: Vec<Tp>,
}

impl SignalSlice {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Indices `i` such that a discontinuity lies between samples `i − 1` and `i`.
    pub fn discontinuities(&self, sample_rate: f64, ticks_per_second: u64) -> Vec<usize> {
        (1..self.ticks.len())
            .filter(|&i| is_discontinuity(self.ticks[i - 1], self.ticks[i], 1, sample_rate, ticks_per_second))
            .collect()
    }
}

/// Read `channel` over `interval`; `None` if the interval covers no samples.
pub fn read_interval<S: SampleStore + ?Sized>(
    records: &RecordIndex,
    store: &S,
    channel: usize,
    interval: &Interval,
) -> Result<Option<SignalSlice>> {
    let spr = store
        .samples_per_record(channel)
        .with_context(|| format!("unknown channel {channel}"))?;
    let Some(span) = resolve(records, interval, spr) else {
        return Ok(None);
    };
    let dur = records.record_duration();
    let n = span.n_samples(spr);
    let mut samples = Vec::with_capacity(n);
    let mut ticks = Vec::with_capacity(n);

    for r in span.start_record..=span.stop_record {
        let orig = records.original(r).with_context(|| format!("record {r} not in index"))?;
        let start = records.start(r).with_context(|| format!("record {r} not in index"))?;
        let bufs = store.read(orig).with_context(|| format!("reading record {orig}"))?;
        let buf = bufs
            .get(channel)
            .with_context(|| format!("record {orig} has no channel {channel}"))?;
        if buf.len() != spr {
            bail!("record {orig} channel {channel}: {} samples, expected {spr}", buf.len());
        }
        let lo = if r == span.start_record { span.start_sample } else { 0 };
        let hi = if r == span.stop_record { span.stop_sample } else { spr - 1 };
        for k in lo..=hi {
            samples.push(buf[k]);
            ticks.push(start + (k as u128 * dur as u128 / spr as u128) as Tp);
        }
    }
    Ok(Some(SignalSlice { samples: Array1::from_vec(samples), ticks }))
}

/// In-memory store: one `[n_records, spr]` array per channel.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    record_duration: Tp,
    n_records: usize,
    starts: Option<Vec<Tp>>,
    labels: Vec<String>,
    channels: Vec<Array2<f64>>,
}

impl MemoryStore {
    /// Continuous store with `n_records` records of `record_duration` ticks.
    pub fn new(n_records: usize, record_duration: Tp) -> Self {
        Self { record_duration, n_records, starts: None, labels: vec![], channels: vec![] }
    }

    /// Make the store discontinuous with explicit record start ticks.
    pub fn with_starts(mut self, starts: Vec<Tp>) -> Self {
        self.n_records = starts.len();
        self.starts = Some(starts);
        self
    }

    /// Add a channel; `data` is `[n_records, samples_per_record]`.
    pub fn with_channel(mut self, label: &str, data: Array2<f64>) -> Result<Self> {
        if data.nrows() != self.n_records {
            bail!("channel {label}: {} records, expected {}", data.nrows(), self.n_records);
        }
        self.labels.push(label.to_string());
        self.channels.push(data);
        Ok(self)
    }
}

impl SampleStore for MemoryStore {
    fn n_records(&self) -> usize {
        self.n_records
    }

    fn record_duration(&self) -> Tp {
        self.record_duration
    }

    fn is_continuous(&self) -> bool {
        self.starts.is_none()
    }

    fn timepoint_of(&self, record: usize) -> Option<Tp> {
        match &self.starts {
            Some(s) => s.get(record).copied(),
            None => (record < self.n_records).then(|| record as Tp * self.record_duration),
        }
    }

    fn channel_labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn samples_per_record(&self, channel: usize) -> Option<usize> {
        self.channels.get(channel).map(|a| a.ncols())
    }

    fn read(&self, record: usize) -> Result<Vec<Array1<f64>>> {
        if record >= self.n_records {
            bail!("record {record} out of range (n_records = {})", self.n_records);
        }
        Ok(self.channels.iter().map(|a| a.row(record).to_owned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_one_second_across_records() {
        // 3 records × 1 s, 10 Hz, sample value = global sample index.
        let data = Array2::from_shape_fn((3, 10), |(r, k)| (r * 10 + k) as f64);
        let store = MemoryStore::new(3, 1000).with_channel("C3", data).unwrap();
        let idx = record_index(&store);
        let s = read_interval(&idx, &store, 0, &Interval::new(500, 1500)).unwrap().unwrap();
        assert_eq!(s.len(), 10);
        assert_eq!(s.samples[0], 5.0);
        assert_eq!(s.samples[9], 14.0);
        assert_eq!(s.ticks[5], 1000);
    }

    #[test]
    fn slice_reports_gap() {
        let data = Array2::from_shape_fn((2, 10), |(r, k)| (r * 10 + k) as f64);
        let store = MemoryStore::new(2, 1000)
            .with_starts(vec![0, 3000])
            .with_channel("C3", data)
            .unwrap();
        let idx = record_index(&store);
        assert!(!idx.is_continuous());
        let s = read_interval(&idx, &store, 0, &Interval::new(0, 4000)).unwrap().unwrap();
        assert_eq!(s.len(), 20);
        assert_eq!(s.discontinuities(10.0, 1000), vec![10]);
        assert!(read_interval(&idx, &store, 0, &Interval::new(1000, 3000)).unwrap().is_none());
        assert!(read_interval(&idx, &store, 3, &Interval::new(0, 10)).is_err());
    }

    #[test]
    fn slice_reads_original_record_when_starts_are_unordered() {
        // Record 0 starts after record 1 in the file.
        let data = Array2::from_shape_fn((2, 10), |(r, k)| (r * 10 + k) as f64);
        let store = MemoryStore::new(2, 1000)
            .with_starts(vec![3000, 0])
            .with_channel("C3", data)
            .unwrap();
        let idx = record_index(&store);
        assert_eq!(idx.original(0), Some(1));
        assert_eq!(idx.current(0), Some(1));
        let s = read_interval(&idx, &store, 0, &Interval::new(0, 1000)).unwrap().unwrap();
        assert_eq!(s.samples[0], 10.0);
        let s = read_interval(&idx, &store, 0, &Interval::new(3000, 4000)).unwrap().unwrap();
        assert_eq!(s.samples[0], 0.0);
    }
}
