pub(crate) mod cf;
pub(crate) mod stream;

use crate::{Timestamp, Value};

/// Consolidated value of one tier-width-sized time window.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bin {
    /// Timestamp of the bin, a multiple of the tier width
    pub timestamp: Timestamp,

    /// Consolidated value, `None` if no sample was observed
    pub value: Option<Value>,

    /// Number of raw samples folded into the bin
    pub count: u64,
}

impl Bin {
    pub(crate) fn missing(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            value: None,
            count: 0,
        }
    }
}

/// State a tier was left in by the previous write.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Seed {
    /// The open bin
    pub bin: Bin,

    /// Raw timestamp of the last sample applied
    pub sample: Timestamp,
}

/// Rounds `ts` to the nearest multiple of `width`.
///
/// A remainder of exactly half the width rounds down.
#[must_use]
pub fn nearest(ts: Timestamp, width: Timestamp) -> Timestamp {
    let remainder = ts.rem_euclid(width);

    if remainder * 2 > width {
        ts - remainder + width
    } else {
        ts - remainder
    }
}
