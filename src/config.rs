//! Timeline configuration.
//!
//! [`TimelineConfig`] holds every tunable parameter of the timeline: the tick
//! rate used for all fixed-point time arithmetic, the epoch grid, annotation
//! alignment and the seed used by the random-subsample predicates.  All
//! fields have defaults matching standard 30 s sleep-staging epochs.
use crate::error::{Result, TimelineError};
use crate::interval::Tp;

/// Configuration for a [`Timeline`](crate::Timeline).
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use psg_timeline::TimelineConfig;
///
/// let cfg = TimelineConfig {
///     epoch_len_secs: 4.0,
///     epoch_inc_secs: Some(2.0),   // 50 % overlapping windows
///     ..TimelineConfig::default()
/// };
/// assert_eq!(cfg.epoch_params().unwrap().inc, 2 * cfg.ticks_per_second);
/// ```
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Number of ticks in one second.
    ///
    /// Every time point, duration and epoch length is an integer multiple of
    /// `1 / ticks_per_second` seconds.
    ///
    /// Default: `1_000_000_000` (nanosecond ticks).
    pub ticks_per_second: u64,

    /// Epoch length in seconds.
    ///
    /// Must be at least one record long.
    ///
    /// Default: `30.0` s.
    pub epoch_len_secs: f64,

    /// Epoch increment (sliding-window step) in seconds.
    ///
    /// `None` means non-overlapping epochs (increment = length).  Must not
    /// exceed the epoch length.
    ///
    /// Default: `None`.
    pub epoch_inc_secs: Option<f64>,

    /// Start of the first epoch, in seconds from the start of the recording.
    ///
    /// Default: `0.0` s.
    pub epoch_offset_secs: f64,

    /// Annotation classes whose instances define legal epoch start points.
    ///
    /// When non-empty, the first epoch of every contiguous segment starts at
    /// the first legal start tick inside that segment instead of at the
    /// segment boundary.
    ///
    /// Default: `[]` (no alignment).
    pub align_annotations: Vec<String>,

    /// Largest gap, in ticks, between one record's end and the next record's
    /// start that still counts as contiguous.
    ///
    /// Default: `0` (records must abut exactly).
    pub gap_tolerance_ticks: u64,

    /// Seed for the random-subsample predicates.
    ///
    /// `None` draws a fresh seed from the OS for every application.
    ///
    /// Default: `None`.
    pub seed: Option<u64>,
}

impl Default for TimelineConfig {
    /// Nanosecond ticks · 30 s non-overlapping epochs · no offset · no alignment.
    fn default() -> Self {
        Self {
            ticks_per_second: 1_000_000_000,
            epoch_len_secs: 30.0,
            epoch_inc_secs: None,
            epoch_offset_secs: 0.0,
            align_annotations: vec![],
            gap_tolerance_ticks: 0,
            seed: None,
        }
    }
}

impl TimelineConfig {
    /// Convert seconds to ticks, rounding to the nearest tick.
    ///
    /// Negative inputs saturate to zero.
    pub fn secs_to_tp(&self, secs: f64) -> Tp {
        if secs <= 0.0 {
            return 0;
        }
        (secs * self.ticks_per_second as f64).round() as Tp
    }

    /// Convert ticks to seconds.
    pub fn tp_to_secs(&self, tp: Tp) -> f64 {
        tp as f64 / self.ticks_per_second as f64
    }

    /// Epoch length, increment and offset in ticks.
    ///
    /// Only checks what can be checked without a record layout (non-zero
    /// length and increment, increment ≤ length); the record-duration check
    /// lives in [`EpochParams::validate`].
    pub fn epoch_params(&self) -> Result<EpochParams> {
        if self.ticks_per_second == 0 {
            return Err(TimelineError::Config("ticks_per_second must be positive".into()));
        }
        let len = self.secs_to_tp(self.epoch_len_secs);
        let inc = match self.epoch_inc_secs {
            Some(s) => self.secs_to_tp(s),
            None => len,
        };
        let offset = self.secs_to_tp(self.epoch_offset_secs);
        let params = EpochParams { len, inc, offset };
        params.check_shape()?;
        Ok(params)
    }
}

/// Epoch grid in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochParams {
    /// Epoch length.
    pub len: Tp,
    /// Distance between consecutive epoch starts.
    pub inc: Tp,
    /// Start of the first epoch relative to the recording start.
    pub offset: Tp,
}

impl EpochParams {
    /// Build from raw tick counts; `inc = None` means `inc = len`.
    pub fn new(len: Tp, inc: Option<Tp>, offset: Tp) -> Self {
        Self { len, inc: inc.unwrap_or(len), offset }
    }

    fn check_shape(&self) -> Result<()> {
        if self.len == 0 {
            return Err(TimelineError::ZeroLength);
        }
        if self.inc == 0 {
            return Err(TimelineError::Config("epoch increment must be positive".into()));
        }
        if self.inc > self.len {
            return Err(TimelineError::IncrementExceedsLength { inc: self.inc, len: self.len });
        }
        Ok(())
    }

    /// Full validation against the shortest record in the recording.
    pub fn validate(&self, min_record_duration: Tp) -> Result<()> {
        self.check_shape()?;
        if self.len < min_record_duration {
            return Err(TimelineError::EpochTooShort {
                len: self.len,
                record: min_record_duration,
            });
        }
        Ok(())
    }
}
