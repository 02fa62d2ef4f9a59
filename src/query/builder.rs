use super::{filter::Filter, Points};
use crate::store::Store;
use crate::time::Deadline;
use crate::{validate, Archive, Point, SeriesKey, Timestamp};

/// Builder for a range query on one series
pub struct Builder<'a, S: Store> {
    /// The archive to read from
    pub(crate) archive: &'a Archive<S>,

    /// Series to read
    pub(crate) key: &'a SeriesKey,

    /// Range start, negative = relative to `now`
    start: Option<Timestamp>,

    /// Range stop, negative = relative to `now`
    stop: Option<Timestamp>,

    /// Baseline of relative bounds
    now: Option<Timestamp>,

    /// Requested tier width in seconds
    width: Option<Timestamp>,

    deadline: Option<Deadline>,

    filters: Vec<Filter>,
}

impl<'a, S: Store> Builder<'a, S> {
    pub(crate) fn new(archive: &'a Archive<S>, key: &'a SeriesKey) -> Self {
        Self {
            archive,
            key,
            start: None,
            stop: None,
            now: None,
            width: None,
            deadline: None,
            filters: vec![],
        }
    }

    /// Sets the range start.
    ///
    /// Default = the retained window of the finest tier, counting back from `now`
    #[must_use]
    pub fn start(mut self, ts: Timestamp) -> Self {
        self.start = Some(ts);
        self
    }

    /// Sets the range stop.
    ///
    /// Default = `now`
    #[must_use]
    pub fn stop(mut self, ts: Timestamp) -> Self {
        self.stop = Some(ts);
        self
    }

    /// Sets the baseline negative bounds are relative to.
    ///
    /// Default = the current time
    #[must_use]
    pub fn now(mut self, ts: Timestamp) -> Self {
        self.now = Some(ts);
        self
    }

    /// Reads from the tier of this width, if there is one.
    #[must_use]
    pub fn width(mut self, seconds: Timestamp) -> Self {
        self.width = Some(seconds);
        self
    }

    /// Sets the call deadline.
    ///
    /// Default = the configured operation timeout
    #[must_use]
    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Adds a filter that [`Builder::run`] applies to the result.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Applies untrusted query parameters.
    ///
    /// Understands `start`, `stop`, `now`, `interval`, `sample` and a
    /// comma-separated list of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidTime`] or [`crate::Error::InvalidNumber`]
    /// for malformed values, [`crate::Error::InvalidKey`] for unknown
    /// parameters or filters.
    pub fn params<'p>(
        mut self,
        params: impl IntoIterator<Item = (&'p str, &'p str)>,
    ) -> crate::Result<Self> {
        let integer = |s: &str| -> crate::Result<Timestamp> {
            s.trim()
                .parse()
                .map_err(|_| crate::Error::InvalidNumber(format!("not an integer: {s:?}")))
        };

        for (name, value) in params {
            // NOTE: Relative bounds stay relative until `now` is known
            match name {
                "start" => self.start = Some(validate::time(value, 0, crate::Error::from)?),
                "stop" => self.stop = Some(validate::time(value, 0, crate::Error::from)?),
                "now" => self.now = Some(validate::time(value, 0, crate::Error::from)?),
                "interval" => self.width = Some(integer(value)?),
                "sample" => {
                    let count = usize::try_from(integer(value)?).map_err(|_| {
                        crate::Error::InvalidNumber(format!("negative sample count {value:?}"))
                    })?;
                    self.filters.push(Filter::Sample(count));
                }
                "filters" => {
                    for filter in value.split(',').filter(|f| !f.is_empty()) {
                        self.filters.push(filter.parse()?);
                    }
                }
                _ => {
                    return Err(crate::Error::InvalidKey(format!(
                        "unknown query parameter {name:?}"
                    )))
                }
            }
        }

        Ok(self)
    }

    /// Runs the query, returning a lazy ascending sequence of points.
    ///
    /// Filters are not applied; see [`Builder::run`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRange`] if start lies after stop,
    /// or an error if the store could not be read.
    pub fn build(&self) -> crate::Result<Points> {
        let config = self.archive.config();
        let now = self.now.unwrap_or_else(crate::time::timestamp);
        let finest = config.schema().finest();

        // NOTE: Bounds are absolute from here on, so they must not turn negative
        let stop = validate::resolve(self.stop.unwrap_or(now), now).max(0);
        let start = self
            .start
            .map_or_else(|| finest.earliest(stop), |start| validate::resolve(start, now))
            .max(0);

        let deadline = self
            .deadline
            .unwrap_or_else(|| Deadline::after(config.op_timeout()));

        self.archive
            .planner()
            .query(self.key, (start, stop), self.width, now, deadline)
    }

    /// Runs the query and applies the filters in the order they were added.
    ///
    /// # Errors
    ///
    /// Same as [`Builder::build`], or if a stored value could not be decoded.
    pub fn run(&self) -> crate::Result<Vec<Point>> {
        self.build()?.filtered(&self.filters)
    }
}
