use crate::Timestamp;

/// Error type
#[derive(Debug)]
pub enum Error {
    /// A key segment is empty, too long or contains a reserved character.
    InvalidKey(String),

    /// A value could not be parsed as a number.
    InvalidNumber(String),

    /// A timestamp could not be parsed.
    InvalidTime(String),

    /// The start of a query range lies after its stop.
    InvalidRange {
        /// Resolved range start
        start: Timestamp,

        /// Resolved range stop
        stop: Timestamp,
    },

    /// A sample is older than data already applied to the series.
    OutOfOrderSample {
        /// Timestamp of the rejected sample
        timestamp: Timestamp,

        /// Timestamp the series has already advanced to
        last: Timestamp,
    },

    /// The series lock could not be acquired in time.
    LockTimeout(String),

    /// The call deadline passed before the operation completed.
    DeadlineExceeded,

    /// A value read back from the store could not be decoded.
    CorruptRecord(String),

    /// The archive was configured inconsistently.
    InvalidConfig(String),

    /// The backing store failed.
    StoreUnavailable(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Returns `true` if the operation may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout(_) | Self::DeadlineExceeded | Self::StoreUnavailable(_)
        )
    }
}

impl From<fjall::Error> for Error {
    fn from(value: fjall::Error) -> Self {
        Self::StoreUnavailable(Box::new(value))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::StoreUnavailable(Box::new(value))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(msg) => write!(f, "InvalidKey: {msg}"),
            Self::InvalidNumber(msg) => write!(f, "InvalidNumber: {msg}"),
            Self::InvalidTime(msg) => write!(f, "InvalidTime: {msg}"),
            Self::InvalidRange { start, stop } => {
                write!(f, "InvalidRange: start {start} is after stop {stop}")
            }
            Self::OutOfOrderSample { timestamp, last } => {
                write!(f, "OutOfOrderSample: {timestamp} is older than {last}")
            }
            Self::LockTimeout(key) => write!(f, "LockTimeout: {key}"),
            Self::DeadlineExceeded => write!(f, "DeadlineExceeded"),
            Self::CorruptRecord(msg) => write!(f, "CorruptRecord: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "InvalidConfig: {msg}"),
            Self::StoreUnavailable(e) => write!(f, "StoreUnavailable: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StoreUnavailable(e) => Some(&**e),
            _ => None,
        }
    }
}

/// Result helper type
pub type Result<T> = std::result::Result<T, Error>;
