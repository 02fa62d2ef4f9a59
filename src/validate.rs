//! Conversion of untrusted input into typed keys, numbers and timestamps.
//!
//! Every validator takes an error constructor, so a caller can map a rejection
//! straight into its own error type:
//!
//! ```
//! use tiera::validate::{self, Invalid};
//!
//! #[derive(Debug)]
//! struct BadRequest(String);
//!
//! let bad = |e: Invalid| BadRequest(e.to_string());
//!
//! assert_eq!(1_600, validate::time("-400", 2_000, bad).unwrap());
//! assert!(validate::number("twelve", 2, |e| BadRequest(e.to_string())).is_err());
//! ```

use crate::{Timestamp, Value};

/// Maximum length of a key segment, in characters.
pub const MAX_KEY_LEN: usize = 128;

/// Field delimiter of encoded storage keys.
pub const DELIMITER: char = '!';

/// Separator of the collaborator-facing wire form.
pub const PATH_SEPARATOR: char = '/';

/// Which validator rejected an input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Key segment
    Key,

    /// Number
    Number,

    /// Timestamp
    Time,
}

/// A rejected input, handed to the caller's error constructor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invalid {
    /// The validator that rejected the input
    pub kind: Kind,

    /// The offending input
    pub input: String,

    /// Why it was rejected
    pub reason: &'static str,
}

impl Invalid {
    fn new(kind: Kind, input: &str, reason: &'static str) -> Self {
        Self {
            kind,
            input: input.to_owned(),
            reason,
        }
    }
}

impl std::fmt::Display for Invalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.reason, self.input)
    }
}

impl From<Invalid> for crate::Error {
    fn from(value: Invalid) -> Self {
        let msg = value.to_string();

        match value.kind {
            Kind::Key => Self::InvalidKey(msg),
            Kind::Number => Self::InvalidNumber(msg),
            Kind::Time => Self::InvalidTime(msg),
        }
    }
}

fn is_key_char(c: char) -> bool {
    (c.is_ascii_alphanumeric() || c.is_ascii_punctuation())
        && c != DELIMITER
        && c != PATH_SEPARATOR
}

/// Validates a key segment.
///
/// Keys are 1 to 128 ASCII letters, digits or punctuation characters,
/// excluding `!` and `/`.
///
/// # Errors
///
/// Returns the constructed error if the segment is empty, too long
/// or contains a reserved character.
pub fn key<E>(s: &str, err: impl FnOnce(Invalid) -> E) -> Result<&str, E> {
    if s.is_empty() {
        return Err(err(Invalid::new(Kind::Key, s, "key is empty")));
    }

    if s.chars().count() > MAX_KEY_LEN {
        return Err(err(Invalid::new(Kind::Key, s, "key is too long")));
    }

    if !s.chars().all(is_key_char) {
        return Err(err(Invalid::new(
            Kind::Key,
            s,
            "key contains reserved characters",
        )));
    }

    Ok(s)
}

/// Rounds a value to `precision` decimal places.
#[must_use]
pub fn round(value: Value, precision: u8) -> Value {
    let factor = 10_f64.powi(i32::from(precision));
    (value * factor).round() / factor
}

/// Parses a signed integer or decimal, rounding decimals to `precision` places.
///
/// # Errors
///
/// Returns the constructed error if the input is not a finite number.
pub fn number<E>(s: &str, precision: u8, err: impl FnOnce(Invalid) -> E) -> Result<Value, E> {
    let trimmed = s.trim();

    if let Ok(int) = trimmed.parse::<i64>() {
        #[allow(clippy::cast_precision_loss)]
        return Ok(int as Value);
    }

    match trimmed.parse::<Value>() {
        Ok(value) if value.is_finite() => Ok(round(value, precision)),
        _ => Err(err(Invalid::new(Kind::Number, s, "not a number"))),
    }
}

/// Returns `true` if `s` spells the missing marker.
#[must_use]
pub fn is_missing(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null")
}

/// Parses a sample value: either the missing marker or a number.
///
/// # Errors
///
/// Returns the constructed error if the input is neither.
pub fn value<E>(
    s: &str,
    precision: u8,
    err: impl FnOnce(Invalid) -> E,
) -> Result<Option<Value>, E> {
    if is_missing(s) {
        Ok(None)
    } else {
        number(s, precision, err).map(Some)
    }
}

/// Resolves a timestamp that may be relative to `now`.
///
/// Negative timestamps are offsets into the past from `now`.
#[must_use]
pub fn resolve(ts: Timestamp, now: Timestamp) -> Timestamp {
    if ts < 0 {
        now.saturating_add(ts)
    } else {
        ts
    }
}

/// Parses an absolute epoch second, or a negative offset from `now`.
///
/// # Errors
///
/// Returns the constructed error if the input is not an integer.
pub fn time<E>(s: &str, now: Timestamp, err: impl FnOnce(Invalid) -> E) -> Result<Timestamp, E> {
    s.trim()
        .parse::<Timestamp>()
        .map(|ts| resolve(ts, now))
        .map_err(|_| err(Invalid::new(Kind::Time, s, "not a timestamp")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Debug, PartialEq, Eq)]
    struct BadRequest(String);

    #[test_log::test]
    fn key_accepts_punctuation_and_digits() {
        assert_eq!(Ok("cpu.total"), key("cpu.total", |e| e));
        assert_eq!(Ok("load_1-min"), key("load_1-min", |e| e));
        assert_eq!(Ok("a:b@c#d"), key("a:b@c#d", |e| e));
    }

    #[test_log::test]
    fn key_rejects_bad_segments() {
        assert_eq!(Kind::Key, key("", |e| e).unwrap_err().kind);
        assert!(key("a!b", |e| e).is_err());
        assert!(key("a/b", |e| e).is_err());
        assert!(key("with space", |e| e).is_err());
        assert!(key("grüße", |e| e).is_err());

        let long = "x".repeat(MAX_KEY_LEN + 1);
        assert_eq!("key is too long", key(&long, |e| e).unwrap_err().reason);
        assert!(key(&long[1..], |e| e).is_ok());
    }

    #[test_log::test]
    fn number_rounds_decimals() {
        assert_eq!(Ok(42.0), number("42", 2, |e| e));
        assert_eq!(Ok(-3.14), number("-3.14159", 2, |e| e));
        assert_eq!(Ok(2.5), number(" 2.499 ", 1, |e| e));
        assert_eq!(Ok(1_000.0), number("1e3", 2, |e| e));
    }

    #[test_log::test]
    fn number_rejects_garbage() {
        assert!(matches!(
            number("foo", 2, Error::from),
            Err(Error::InvalidNumber(_))
        ));
        assert!(number("NaN", 2, |e| e).is_err());
        assert!(number("inf", 2, |e| e).is_err());
        assert!(number("", 2, |e| e).is_err());
    }

    #[test_log::test]
    fn value_understands_missing_marker() {
        assert_eq!(Ok(None), value("", 2, |e| e));
        assert_eq!(Ok(None), value("None", 2, |e| e));
        assert_eq!(Ok(None), value("null", 2, |e| e));
        assert_eq!(Ok(Some(7.0)), value("7", 2, |e| e));
        assert!(value("seven", 2, |e| e).is_err());
    }

    #[test_log::test]
    fn time_resolves_relative_offsets() {
        assert_eq!(Ok(1_278_508_719), time("1278508719", 5, |e| e));
        assert_eq!(Ok(940), time("-60", 1_000, |e| e));
        assert_eq!(Ok(0), time("0", 1_000, |e| e));
    }

    #[test_log::test]
    fn time_uses_injected_error() {
        let result = time("yesterday", 0, |e| BadRequest(e.to_string()));
        assert_eq!(
            Err(BadRequest("not a timestamp: \"yesterday\"".into())),
            result
        );

        assert!(matches!(
            time("1.5", 0, Error::from),
            Err(Error::InvalidTime(_))
        ));
    }
}
