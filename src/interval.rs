//! Half-open time intervals in fixed-point ticks.
//!
//! `stop` is one tick past the last included instant.  A zero-duration
//! interval (`start == stop`) is a point event: it overlaps any interval
//! containing its start tick.

/// A time point, in ticks (see [`TimelineConfig::ticks_per_second`](crate::TimelineConfig)).
pub type Tp = u64;

/// Half-open `[start, stop)` range of ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Interval {
    pub start: Tp,
    pub stop: Tp,
}

impl Interval {
    /// Build `[start, stop)`.  Panics if `stop < start`.
    pub fn new(start: Tp, stop: Tp) -> Self {
        assert!(stop >= start, "interval stop {stop} precedes start {start}");
        Self { start, stop }
    }

    /// Checked constructor: `None` if `stop < start`.
    pub fn try_new(start: Tp, stop: Tp) -> Option<Self> {
        (stop >= start).then_some(Self { start, stop })
    }

    /// Zero-duration interval at `tp`.
    pub fn point(tp: Tp) -> Self {
        Self { start: tp, stop: tp }
    }

    /// `[start, start + dur)`.
    pub fn from_duration(start: Tp, dur: Tp) -> Self {
        Self { start, stop: start + dur }
    }

    #[inline]
    pub fn duration(&self) -> Tp {
        self.stop - self.start
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        self.start == self.stop
    }

    /// Midpoint, rounded down to a whole tick.
    pub fn midpoint(&self) -> Tp {
        self.start + self.duration() / 2
    }

    /// `true` if `tp` lies in `[start, stop)`.
    #[inline]
    pub fn contains(&self, tp: Tp) -> bool {
        self.start <= tp && tp < self.stop
    }

    /// `true` if the two intervals share at least one instant.
    ///
    /// Point intervals overlap whatever contains their tick; two points
    /// overlap only if they coincide.
    pub fn overlaps(&self, other: &Interval) -> bool {
        match (self.is_point(), other.is_point()) {
            (true, true) => self.start == other.start,
            (true, false) => other.contains(self.start),
            (false, true) => self.contains(other.start),
            (false, false) => self.start < other.stop && other.start < self.stop,
        }
    }

    /// Shared ticks, or `None` if disjoint (a touching point yields a point).
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop).max(start);
        Some(Interval { start, stop })
    }

    /// Fraction of `self` covered by `other`, in `[0, 1]`.
    pub fn proportion_overlap(&self, other: &Interval) -> f64 {
        if self.is_point() {
            return if self.overlaps(other) { 1.0 } else { 0.0 };
        }
        match self.intersection(other) {
            Some(i) => i.duration() as f64 / self.duration() as f64,
            None => 0.0,
        }
    }

    /// `true` if `other` lies entirely inside `self`.
    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    /// `true` if `self` lies entirely inside `other`.
    pub fn is_spanned_by(&self, other: &Interval) -> bool {
        other.contains_interval(self)
    }

    /// `(start, stop)` in seconds at the given tick rate.
    pub fn as_secs(&self, ticks_per_second: u64) -> (f64, f64) {
        let t = ticks_per_second as f64;
        (self.start as f64 / t, self.stop as f64 / t)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// Merge overlapping or abutting intervals into a sorted, disjoint list.
pub fn merge_intervals(mut v: Vec<Interval>) -> Vec<Interval> {
    v.sort();
    let mut out: Vec<Interval> = Vec::with_capacity(v.len());
    for i in v {
        match out.last_mut() {
            Some(last) if i.start <= last.stop => last.stop = last.stop.max(i.stop),
            _ => out.push(i),
        }
    }
    out
}
