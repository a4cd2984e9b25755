//! Epochs: generation, epoch ↔ record mapping and numbering.
//!
//! # Quick start
//! ```
//! use psg_timeline::epoch::generate;
//! use psg_timeline::{EpochParams, RecordIndex};
//!
//! // 10 one-second records (1000 ticks/s), 4 s epochs.
//! let records = RecordIndex::continuous(10, 1000);
//! let grid = generate(&records, &EpochParams::new(4000, None, 0), None, 0);
//! assert_eq!(grid.epochs.len(), 2);
//! ```
pub mod generate;
pub mod map;
pub mod numbering;

pub use generate::{alignment_starts, generate, EpochGrid};
pub use map::EpochRecordMap;
pub use numbering::{EpochCursor, EpochNumbering};
