use crate::Timestamp;

/// Helpers for calculating tier widths and offsets in seconds
///
/// ```
/// use tiera::{Duration, Schema, Tier};
///
/// let schema = Schema::new(vec![
///     Tier::new(Duration::minutes(5), 288)?,
///     Tier::new(Duration::days(1), 365)?,
/// ])?;
///
/// assert_eq!(300, schema.finest().width());
///
/// # Ok::<(), tiera::Error>(())
/// ```
pub struct Duration;

impl Duration {
    /// Formats N days as seconds.
    #[must_use]
    pub const fn days(n: i64) -> Timestamp {
        Self::hours(n) * 24
    }

    /// Formats N hours as seconds.
    #[must_use]
    pub const fn hours(n: i64) -> Timestamp {
        Self::minutes(n) * 60
    }

    /// Formats N minutes as seconds.
    #[must_use]
    pub const fn minutes(n: i64) -> Timestamp {
        Self::seconds(n) * 60
    }

    /// Formats N seconds as seconds.
    #[must_use]
    pub const fn seconds(n: i64) -> Timestamp {
        n
    }
}
