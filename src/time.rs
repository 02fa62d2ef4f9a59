use crate::Timestamp;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Returns the current timestamp in seconds.
#[must_use]
pub fn timestamp() -> Timestamp {
    let start = SystemTime::now();
    let since_the_epoch = start.duration_since(UNIX_EPOCH).unwrap_or_default();

    i64::try_from(since_the_epoch.as_secs()).unwrap_or(Timestamp::MAX)
}

/// Point in time by which a call must have completed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        Self(now.checked_add(timeout).unwrap_or(now))
    }

    /// Time left, zero if the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Returns `true` if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Fails with [`crate::Error::DeadlineExceeded`] once the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deadline has passed.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_expired() {
            Err(crate::Error::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}
