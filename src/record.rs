//! String encoding of the values kept in the store.
//!
//! A closed bin is stored as its value alone, an empty string being the
//! missing marker. The last record of a tier is
//! `<bin timestamp>:<value>:<point count>:<last sample timestamp>`.

use crate::agg::{Bin, Seed};
use crate::{validate, Timestamp, Value};

const SEPARATOR: char = ':';

fn corrupt(e: validate::Invalid) -> crate::Error {
    crate::Error::CorruptRecord(e.to_string())
}

pub fn encode_value(value: Option<Value>, precision: u8) -> String {
    value.map_or_else(String::new, |v| validate::round(v, precision).to_string())
}

pub fn decode_value(s: &str, precision: u8) -> crate::Result<Option<Value>> {
    validate::value(s, precision, corrupt)
}

pub fn encode_last(seed: &Seed, precision: u8) -> String {
    format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
        seed.bin.timestamp,
        encode_value(seed.bin.value, precision),
        seed.bin.count,
        seed.sample,
    )
}

pub fn decode_last(s: &str, precision: u8) -> crate::Result<Seed> {
    let mut parts = s.split(SEPARATOR);

    let (Some(timestamp), Some(value), Some(count), Some(sample), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(crate::Error::CorruptRecord(format!(
            "last record {s:?} does not have four fields"
        )));
    };

    // NOTE: Stored timestamps are absolute, so there is no "now" to resolve against
    let timestamp: Timestamp = validate::time(timestamp, 0, corrupt)?;
    let sample: Timestamp = validate::time(sample, 0, corrupt)?;

    let count = count
        .parse::<u64>()
        .map_err(|_| crate::Error::CorruptRecord(format!("bad point count in {s:?}")))?;

    Ok(Seed {
        bin: Bin {
            timestamp,
            value: decode_value(value, precision)?,
            count,
        },
        sample,
    })
}
