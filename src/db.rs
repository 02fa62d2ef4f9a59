use crate::query::{builder::Builder as QueryBuilder, QueryPlanner};
use crate::series::{SeriesStore, TierState};
use crate::store::{FjallStore, Store};
use crate::time::Deadline;
use crate::{Builder, Config, SeriesKey, Timestamp, Value};
use std::sync::Arc;

/// A multi-resolution time series archive
///
/// Samples written to a series are consolidated into every tier of the
/// schema at once. Queries read from the finest tier that still covers the
/// requested range.
pub struct Archive<S: Store = FjallStore> {
    config: Arc<Config>,
    series: SeriesStore<S>,
    planner: QueryPlanner<S>,
}

impl Archive<FjallStore> {
    /// Creates a new archive builder.
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl<S: Store> Archive<S> {
    pub(crate) fn from_parts(store: S, config: Config) -> Self {
        let store = Arc::new(store);
        let config = Arc::new(config);

        Self {
            series: SeriesStore::new(store.clone(), config.clone()),
            planner: QueryPlanner::new(store, config.clone()),
            config,
        }
    }

    pub(crate) fn planner(&self) -> &QueryPlanner<S> {
        &self.planner
    }

    fn default_deadline(&self) -> Deadline {
        Deadline::after(self.config.op_timeout())
    }

    /// Returns the configuration the archive was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Writes a sample to a series.
    ///
    /// A negative timestamp is an offset from the current time,
    /// `None` is the missing marker.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfOrderSample`] if the sample is older
    /// than data already written, [`crate::Error::LockTimeout`] if another
    /// writer holds the series, or an error if the store failed.
    pub fn append(
        &self,
        key: &SeriesKey,
        timestamp: Timestamp,
        value: Option<Value>,
    ) -> crate::Result<()> {
        self.append_with_deadline(key, timestamp, value, self.default_deadline())
    }

    /// Like [`Archive::append`], but fails with
    /// [`crate::Error::DeadlineExceeded`] once `deadline` passed.
    ///
    /// # Errors
    ///
    /// See [`Archive::append`].
    pub fn append_with_deadline(
        &self,
        key: &SeriesKey,
        timestamp: Timestamp,
        value: Option<Value>,
        deadline: Deadline,
    ) -> crate::Result<()> {
        self.series.append(key, timestamp, value, deadline)
    }

    /// Writes an ascending batch of samples to a series.
    ///
    /// Equivalent to appending them one by one, but takes the lock once and
    /// commits once. If any sample is rejected, nothing is written.
    ///
    /// # Errors
    ///
    /// See [`Archive::append`].
    pub fn extend(
        &self,
        key: &SeriesKey,
        samples: &[(Timestamp, Option<Value>)],
    ) -> crate::Result<()> {
        self.extend_with_deadline(key, samples, self.default_deadline())
    }

    /// Like [`Archive::extend`], but fails with
    /// [`crate::Error::DeadlineExceeded`] once `deadline` passed.
    ///
    /// # Errors
    ///
    /// See [`Archive::append`].
    pub fn extend_with_deadline(
        &self,
        key: &SeriesKey,
        samples: &[(Timestamp, Option<Value>)],
        deadline: Deadline,
    ) -> crate::Result<()> {
        self.series.extend(key, samples, deadline)
    }

    /// Starts a range query on a series.
    ///
    /// # Examples
    ///
    /// ```
    /// use tiera::{Archive, Cf, SeriesKey};
    ///
    /// let archive = Archive::builder().in_memory()?;
    /// let key = SeriesKey::new("h-1", "load", Cf::Last)?;
    ///
    /// archive.extend(&key, &[(3_600, Some(0.5)), (3_660, Some(0.75))])?;
    ///
    /// let points = archive
    ///     .query(&key)
    ///     .start(3_600)
    ///     .stop(3_660)
    ///     .width(60)
    ///     .run()?;
    ///
    /// assert_eq!(vec![(3_600, Some(0.5)), (3_660, Some(0.75))], points);
    /// # Ok::<(), tiera::Error>(())
    /// ```
    #[must_use]
    pub fn query<'a>(&'a self, key: &'a SeriesKey) -> QueryBuilder<'a, S> {
        QueryBuilder::new(self, key)
    }

    /// Returns the last record and stored length of every tier of a series.
    ///
    /// # Errors
    ///
    /// Returns error if the store failed or holds a corrupt record.
    pub fn tier_states(&self, key: &SeriesKey) -> crate::Result<Vec<TierState>> {
        self.series.tier_states(key)
    }

    /// Lists every series that has been written.
    ///
    /// # Errors
    ///
    /// Returns error if the store failed.
    pub fn series(&self) -> crate::Result<Vec<SeriesKey>> {
        self.series.series()
    }

    /// Deletes a series from every tier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockTimeout`] if a writer holds the series,
    /// or an error if the store failed.
    pub fn delete(&self, key: &SeriesKey) -> crate::Result<()> {
        self.delete_with_deadline(key, self.default_deadline())
    }

    /// Like [`Archive::delete`], but fails with
    /// [`crate::Error::DeadlineExceeded`] once `deadline` passed.
    ///
    /// # Errors
    ///
    /// See [`Archive::delete`].
    pub fn delete_with_deadline(&self, key: &SeriesKey, deadline: Deadline) -> crate::Result<()> {
        self.series.delete(key, deadline)
    }
}
