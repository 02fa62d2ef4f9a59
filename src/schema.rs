use crate::{Duration, Timestamp};

/// One resolution level: bin width and how many closed bins are retained.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tier {
    width: Timestamp,
    retention: usize,
}

impl Tier {
    /// Creates a tier with `width` seconds per bin, keeping `retention` bins.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if width or retention is zero.
    pub fn new(width: Timestamp, retention: usize) -> crate::Result<Self> {
        if width <= 0 {
            return Err(crate::Error::InvalidConfig(format!(
                "tier width must be positive, got {width}"
            )));
        }

        if retention == 0 {
            return Err(crate::Error::InvalidConfig(
                "tier retention must be positive".into(),
            ));
        }

        Ok(Self { width, retention })
    }

    /// Bin width in seconds.
    #[must_use]
    pub fn width(&self) -> Timestamp {
        self.width
    }

    /// Number of closed bins retained.
    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Oldest timestamp still covered when the newest bin is at `last`.
    #[must_use]
    pub fn earliest(&self, last: Timestamp) -> Timestamp {
        let span = i64::try_from(self.retention)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.width);

        last.saturating_sub(span)
    }
}

/// Ordered tiers shared by all series, finest first.
///
/// The coarsest tier is never trimmed; its retention is advisory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    tiers: Vec<Tier>,
}

impl Default for Schema {
    /// Minutes for a day, hours for eight weeks, days for four years.
    fn default() -> Self {
        Self {
            tiers: vec![
                Tier {
                    width: Duration::minutes(1),
                    retention: 1_440,
                },
                Tier {
                    width: Duration::hours(1),
                    retention: 1_344,
                },
                Tier {
                    width: Duration::days(1),
                    retention: 1_460,
                },
            ],
        }
    }
}

impl Schema {
    /// Creates a schema from tiers ordered finest to coarsest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if there are no tiers or
    /// widths do not strictly increase.
    pub fn new(tiers: Vec<Tier>) -> crate::Result<Self> {
        if tiers.is_empty() {
            return Err(crate::Error::InvalidConfig("schema has no tiers".into()));
        }

        for pair in tiers.windows(2) {
            if let [finer, coarser] = pair {
                if finer.width >= coarser.width {
                    return Err(crate::Error::InvalidConfig(format!(
                        "tier widths must strictly increase, got {} then {}",
                        finer.width, coarser.width
                    )));
                }
            }
        }

        Ok(Self { tiers })
    }

    /// Tiers, finest first.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Finest tier
    #[must_use]
    pub fn finest(&self) -> &Tier {
        // NOTE: Cannot be empty
        &self.tiers[0]
    }

    /// Returns `true` if `idx` is the coarsest, untrimmed tier.
    #[must_use]
    pub fn is_coarsest(&self, idx: usize) -> bool {
        idx + 1 == self.tiers.len()
    }

    /// Looks up the tier with the given width.
    #[must_use]
    pub fn by_width(&self, width: Timestamp) -> Option<(usize, &Tier)> {
        self.tiers.iter().enumerate().find(|(_, t)| t.width == width)
    }
}
