//! # psg-timeline: record/epoch timeline for polysomnography recordings
//!
//! `psg-timeline` models the time axis of a (possibly discontinuous)
//! EDF/EDF+ style recording and everything built on top of it: fixed-length
//! analysis epochs, the epoch and channel-by-epoch masks, and resolution of
//! time intervals to exact record/sample spans.
//!
//! Time is an integer tick count ([`Tp`]); [`TimelineConfig::ticks_per_second`]
//! fixes the unit (nanoseconds by default).
//!
//! ## Overview
//!
//! ```text
//! RecordIndex            records (original id, start tick), contiguous segments
//!   │
//!   ├─ epoch::generate   len/inc/offset grid per segment, optional alignment
//!   ├─ EpochRecordMap    epoch ↔ record, both directions
//!   ├─ EpochMask         per-epoch bit + Mask/Unmask/Force mode
//!   ├─ ChepMask          per-(epoch, channel) exclusion
//!   ├─ EpochNumbering    original / display / current numbers
//!   └─ resolve           interval → (record, sample) span
//!        │
//!        └─→ Timeline     owns all of the above, rebuilt together
//! ```
//!
//! ## Quick start
//!
//! ```
//! use psg_timeline::{AnnotationSet, Interval, MaskPredicate, RecordIndex, Timeline, TimelineConfig};
//!
//! // 120 one-second records, 30 s epochs, 1000 ticks per second.
//! let cfg = TimelineConfig { ticks_per_second: 1000, ..TimelineConfig::default() };
//! let mut tl = Timeline::new(cfg, RecordIndex::continuous(120, 1000)).unwrap();
//! assert_eq!(tl.n_epochs(), 4);
//!
//! // Exclude every epoch touched by an arousal.
//! let annots = AnnotationSet::new().with("arousal", Interval::new(31_000, 33_000), None);
//! let summary = tl.apply_mask(&MaskPredicate::annotation("arousal"), &annots).unwrap();
//! assert_eq!(summary.newly_masked, 1);
//! assert_eq!(tl.n_unmasked(), 3);
//!
//! // Samples 0..=99 of record 0 at 100 samples per record.
//! let span = tl.resolve(&Interval::new(0, 1000), 100).unwrap();
//! assert_eq!((span.stop_record, span.stop_sample), (0, 99));
//! ```

pub mod annot;
pub mod config;
pub mod epoch;
pub mod error;
pub mod interval;
pub mod io;
pub mod mask;
pub mod records;
pub mod report;
pub mod resolve;
pub mod store;
pub mod timeline;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config / errors
pub use config::{EpochParams, TimelineConfig};
pub use error::{Result, TimelineError};

// time axis
pub use interval::{merge_intervals, Interval, Tp};
pub use records::{Record, RecordIndex, Segment};
pub use resolve::{is_discontinuity, resolve, SampleSpan};

// epochs
pub use epoch::{alignment_starts, EpochCursor, EpochGrid, EpochNumbering, EpochRecordMap};

// masks
pub use mask::chep::ChannelVerdict;
pub use mask::{
    Binding, Bindings, ChepMask, EpochMask, ExpressionEvaluator, MaskMode, MaskOutcome, MaskPredicate,
    MaskSummary, MatchResult, RhaiEvaluator,
};

// collaborators
pub use annot::{AnnotationHandle, AnnotationInstance, AnnotationSet, AnnotationStore};
pub use store::{MemoryStore, SampleStore, SignalSlice};

// output / persistence
pub use io::{EpochState, StWriter};
pub use report::{JsonLinesSink, MemorySink, NullSink, SummarySink};

pub use timeline::Timeline;
