use crate::agg::stream::Consolidator;
use crate::agg::{Bin, Seed};
use crate::lock::SeriesLock;
use crate::record;
use crate::store::{Batch, Store};
use crate::time::Deadline;
use crate::{validate, Config, SeriesKey, Tier, Timestamp, Value};
use std::sync::Arc;

pub(crate) const MEMBERSHIP: &str = "series";
const LOCK: &str = "lock";
const LAST: &str = "last";

/// State of one tier of a series.
#[derive(Clone, Debug, PartialEq)]
pub struct TierState {
    /// The tier
    pub tier: Tier,

    /// The open bin, `None` if the series has never been written
    pub last: Option<Bin>,

    /// Raw timestamp of the last sample applied
    pub last_sample: Option<Timestamp>,

    /// Number of closed bins kept
    pub len: usize,
}

/// Storage keys of one tier of a series
pub(crate) struct TierKeys {
    pub list: String,
    pub last: String,
}

impl TierKeys {
    pub fn new(config: &Config, key: &SeriesKey, tier: &Tier) -> crate::Result<Self> {
        let width = tier.width().to_string();

        Ok(Self {
            list: key.encode(config.namespace(), &[&width])?,
            last: key.encode(config.namespace(), &[&width, LAST])?,
        })
    }
}

pub(crate) fn membership_namespace(config: &Config) -> String {
    format!("{}#{MEMBERSHIP}", config.namespace())
}

/// Writes samples into the tiers of a series
///
/// Every write runs under the series lock and commits all tiers in one batch.
pub struct SeriesStore<S: Store> {
    store: Arc<S>,
    config: Arc<Config>,
}

impl<S: Store> SeriesStore<S> {
    pub fn new(store: Arc<S>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    fn tier_keys(&self, key: &SeriesKey) -> crate::Result<Vec<TierKeys>> {
        self.config
            .schema()
            .tiers()
            .iter()
            .map(|tier| TierKeys::new(&self.config, key, tier))
            .collect()
    }

    fn lock(&self, key: &SeriesKey, deadline: Deadline) -> crate::Result<SeriesLock<'_, S>> {
        let lock_key = key.encode(self.config.namespace(), &[LOCK])?;
        SeriesLock::acquire(&*self.store, lock_key, &self.config, deadline)
    }

    /// Resolves relative timestamps against `now` and rounds values.
    fn prepare(
        &self,
        samples: &[(Timestamp, Option<Value>)],
        now: Timestamp,
    ) -> crate::Result<Vec<(Timestamp, Option<Value>)>> {
        samples
            .iter()
            .map(|&(ts, value)| {
                let value = match value {
                    Some(v) if !v.is_finite() => {
                        return Err(crate::Error::InvalidNumber(format!(
                            "{v} is not a finite number"
                        )));
                    }
                    Some(v) => Some(validate::round(v, self.config.precision())),
                    None => None,
                };

                Ok((validate::resolve(ts, now), value))
            })
            .collect()
    }

    /// Applies an ascending batch of samples to every tier of a series.
    ///
    /// Either all tiers are updated or none is.
    pub fn extend(
        &self,
        key: &SeriesKey,
        samples: &[(Timestamp, Option<Value>)],
        deadline: Deadline,
    ) -> crate::Result<()> {
        deadline.check()?;

        if samples.is_empty() {
            return Ok(());
        }

        let now = crate::time::timestamp();
        let samples = self.prepare(samples, now)?;
        let precision = self.config.precision();
        let schema = self.config.schema();

        let tier_keys = self.tier_keys(key)?;
        let last_keys = tier_keys.iter().map(|k| k.last.clone()).collect::<Vec<_>>();

        let _lock = self.lock(key, deadline)?;

        deadline.check()?;
        let records = self.store.multi_get(&last_keys)?;

        let mut batch = Batch::new();

        for (idx, ((tier, keys), record)) in schema
            .tiers()
            .iter()
            .zip(tier_keys)
            .zip(records)
            .enumerate()
        {
            let seed = record
                .map(|r| record::decode_last(&r, precision))
                .transpose()?;

            let mut consolidator =
                Consolidator::new(samples.iter().copied(), tier.width(), key.cf(), seed);

            if !schema.is_coarsest(idx) {
                consolidator = consolidator.retain(tier.retention());
            }

            let mut bins = consolidator
                .by_ref()
                .collect::<crate::Result<Vec<_>>>()?;

            let (Some(open), Some(sample)) = (bins.pop(), consolidator.last_sample()) else {
                continue;
            };

            log::trace!(
                "{key} @ {}s: closing {} bins, open bin {open:?}",
                tier.width(),
                bins.len()
            );

            if !bins.is_empty() {
                let closed = bins
                    .iter()
                    .map(|bin| record::encode_value(bin.value, precision))
                    .collect();

                batch.push_front(keys.list.as_str(), closed);

                if !schema.is_coarsest(idx) {
                    batch.trim(keys.list, tier.retention());
                }
            }

            batch.set(
                keys.last,
                record::encode_last(&Seed { bin: open, sample }, precision),
            );
        }

        batch.set(
            key.encode(&membership_namespace(&self.config), &[])?,
            now.to_string(),
        );

        deadline.check()?;

        log::debug!("committing {} commands for {key}", batch.len());
        self.store.commit(batch)?;

        Ok(())
    }

    /// Applies one sample to every tier of a series.
    pub fn append(
        &self,
        key: &SeriesKey,
        timestamp: Timestamp,
        value: Option<Value>,
        deadline: Deadline,
    ) -> crate::Result<()> {
        self.extend(key, &[(timestamp, value)], deadline)
    }

    /// Reads the state of every tier of a series.
    pub fn tier_states(&self, key: &SeriesKey) -> crate::Result<Vec<TierState>> {
        let precision = self.config.precision();
        let tier_keys = self.tier_keys(key)?;
        let last_keys = tier_keys.iter().map(|k| k.last.clone()).collect::<Vec<_>>();

        let records = self.store.multi_get(&last_keys)?;

        self.config
            .schema()
            .tiers()
            .iter()
            .zip(tier_keys)
            .zip(records)
            .map(|((tier, keys), record)| {
                let seed = record
                    .map(|r| record::decode_last(&r, precision))
                    .transpose()?;

                Ok(TierState {
                    tier: *tier,
                    last: seed.map(|s| s.bin),
                    last_sample: seed.map(|s| s.sample),
                    len: self.store.list_len(&keys.list)?,
                })
            })
            .collect()
    }

    /// Lists every series that has been written, in key order.
    pub fn series(&self) -> crate::Result<Vec<SeriesKey>> {
        let namespace = membership_namespace(&self.config);
        let prefix = format!("{namespace}{}", validate::DELIMITER);

        self.store
            .scan_prefix(&prefix)?
            .into_iter()
            .map(|(k, _)| SeriesKey::decode(&namespace, &k))
            .collect()
    }

    /// Removes all tiers of a series and its membership record.
    pub fn delete(&self, key: &SeriesKey, deadline: Deadline) -> crate::Result<()> {
        deadline.check()?;

        let tier_keys = self.tier_keys(key)?;
        let membership = key.encode(&membership_namespace(&self.config), &[])?;

        let _lock = self.lock(key, deadline)?;

        let mut batch = Batch::new();
        for keys in tier_keys {
            batch.delete(keys.list).delete(keys.last);
        }
        batch.delete(membership);

        deadline.check()?;

        log::debug!("deleting {key}");
        self.store.commit(batch)?;

        Ok(())
    }
}
