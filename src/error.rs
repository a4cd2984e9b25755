//! Error type for timeline operations.
//!
//! Only configuration-class failures are errors.  Lookup misses (unknown
//! record, interval inside a gap, missing annotation class) are reported as
//! `Option::None` or empty results by the calling APIs.
use crate::interval::Tp;

/// Fatal configuration or argument errors.
///
/// Every variant is raised before the offending operation touches any state.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("epoch length must be positive")]
    ZeroLength,

    #[error("epoch length {len} tp is shorter than the record duration {record} tp")]
    EpochTooShort { len: Tp, record: Tp },

    #[error("epoch increment {inc} tp exceeds epoch length {len} tp")]
    IncrementExceedsLength { inc: Tp, len: Tp },

    #[error("mask has {got} entries but only {epochs} epochs exist")]
    MaskTooLong { got: usize, epochs: usize },

    #[error("invalid epoch range {first}..={last}")]
    InvalidRange { first: usize, last: usize },

    #[error("no epoch with display number {0}")]
    UnknownEpoch(usize),

    #[error("expression error: {0}")]
    Expression(String),

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
