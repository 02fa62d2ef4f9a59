//! Reading consolidated points back from a series.
//!
//! A query picks the finest tier whose retained window covers the requested
//! range and walks that tier's newest-first list backwards, yielding points
//! in ascending time order.

pub mod builder;
pub mod filter;

use crate::record;
use crate::series::TierKeys;
use crate::store::Store;
use crate::time::Deadline;
use crate::{validate, Config, Point, SeriesKey, Tier, Timestamp};
use filter::Filter;
use std::sync::Arc;

/// Ascending points of one tier, decoded lazily
pub struct Points {
    /// Tier the points were read from
    tier: Option<Tier>,

    /// Raw closed bin values, newest first
    rows: Vec<String>,

    /// Timestamp of the oldest remaining row
    cursor: Timestamp,

    /// The open bin, yielded last
    head: Option<Point>,

    precision: u8,
}

impl Points {
    fn empty() -> Self {
        Self {
            tier: None,
            rows: vec![],
            cursor: 0,
            head: None,
            precision: 0,
        }
    }

    /// Tier the points were read from, `None` if the series has no data.
    #[must_use]
    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    /// Collects all points, then runs `filters` over them in order.
    ///
    /// # Errors
    ///
    /// Returns error if a stored value could not be decoded.
    pub fn filtered(self, filters: &[Filter]) -> crate::Result<Vec<Point>> {
        let points = self.collect::<crate::Result<Vec<_>>>()?;
        Ok(filters.iter().fold(points, |points, f| f.apply(points)))
    }
}

impl Iterator for Points {
    type Item = crate::Result<Point>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(raw) = self.rows.pop() {
            let ts = self.cursor;

            if let Some(tier) = self.tier {
                self.cursor += tier.width();
            }

            return Some(record::decode_value(&raw, self.precision).map(|v| (ts, v)));
        }

        self.head.take().map(Ok)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.rows.len() + usize::from(self.head.is_some());
        (len, Some(len))
    }
}

/// Selects a tier and reads a time range from it
pub struct QueryPlanner<S: Store> {
    store: Arc<S>,
    config: Arc<Config>,
}

impl<S: Store> QueryPlanner<S> {
    /// Creates a planner reading from `store`.
    pub fn new(store: Arc<S>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    /// Reads `[start, stop]` from the tier of the given width, or from the
    /// finest tier covering the range.
    ///
    /// Negative bounds are relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRange`] if start lies after stop,
    /// or an error if the store could not be read.
    pub fn query(
        &self,
        key: &SeriesKey,
        (start, stop): (Timestamp, Timestamp),
        width: Option<Timestamp>,
        now: Timestamp,
        deadline: Deadline,
    ) -> crate::Result<Points> {
        let start = validate::resolve(start, now);
        let stop = validate::resolve(stop, now);

        if start > stop {
            return Err(crate::Error::InvalidRange { start, stop });
        }

        deadline.check()?;

        let precision = self.config.precision();
        let schema = self.config.schema();

        let tier_keys = schema
            .tiers()
            .iter()
            .map(|tier| TierKeys::new(&self.config, key, tier))
            .collect::<crate::Result<Vec<_>>>()?;

        let last_keys = tier_keys.iter().map(|k| k.last.clone()).collect::<Vec<_>>();

        let mut candidates = vec![];

        for (idx, ((tier, keys), record)) in schema
            .tiers()
            .iter()
            .zip(tier_keys)
            .zip(self.store.multi_get(&last_keys)?)
            .enumerate()
        {
            if let Some(record) = record {
                let seed = record::decode_last(&record, precision)?;
                candidates.push((idx, *tier, keys, seed.bin));
            }
        }

        let explicit = width.and_then(|width| {
            let found = schema.by_width(width).and_then(|(idx, _)| {
                candidates
                    .iter()
                    .position(|(candidate, _, _, _)| *candidate == idx)
            });

            if found.is_none() {
                log::debug!("{key} has no tier of width {width}s, selecting one");
            }

            found
        });

        // NOTE: No tier holds bins after its last one, so only the start
        // of the range decides coverage
        let chosen = explicit
            .or_else(|| {
                candidates.iter().position(|(_, tier, _, last)| {
                    tier.earliest(last.timestamp) <= start && start <= last.timestamp
                })
            })
            .or_else(|| candidates.len().checked_sub(1));

        let Some((_, tier, keys, last)) =
            chosen.and_then(|idx| candidates.into_iter().nth(idx))
        else {
            log::debug!("{key} has no data");
            return Ok(Points::empty());
        };

        let w = tier.width();
        let lts = last.timestamp;

        log::debug!("querying {key} [{start}..{stop}] at {w}s resolution");

        if start > lts {
            return Ok(Points {
                tier: Some(tier),
                ..Points::empty()
            });
        }

        // NOTE: k = 0 is the open bin, k >= 1 is list index k - 1
        let after = lts.saturating_sub(stop).max(0);
        let k_min = after / w + i64::from(after % w != 0);
        let k_max = lts.saturating_sub(start) / w;

        let head = (k_min == 0).then_some((lts, last.value));

        let lo = k_min.max(1) - 1;
        let hi = k_max - 1;

        let rows = if hi >= lo {
            deadline.check()?;

            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let (lo, hi) = (lo as usize, hi as usize);

            self.store.list_range(&keys.list, lo, hi)?
        } else {
            vec![]
        };

        #[allow(clippy::cast_possible_wrap)]
        let cursor = lts.saturating_sub(
            lo.saturating_add(rows.len() as Timestamp)
                .saturating_mul(w),
        );

        Ok(Points {
            tier: Some(tier),
            rows,
            cursor,
            head,
            precision,
        })
    }
}
