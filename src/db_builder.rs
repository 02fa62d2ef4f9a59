use crate::store::{FjallStore, MemoryStore, Store};
use crate::{Archive, Schema};
use fjall::TxKeyspace;
use std::{path::Path, time::Duration};

/// Settings shared by every operation of an [`Archive`].
///
/// Built once by [`Builder`] and immutable afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) namespace: String,
    pub(crate) schema: Schema,
    pub(crate) precision: u8,
    pub(crate) lock_expiry: Duration,
    pub(crate) lock_timeout: Duration,
    pub(crate) lock_poll: Duration,
    pub(crate) op_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "records".into(),
            schema: Schema::default(),
            precision: 2,
            lock_expiry: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(10),
            lock_poll: Duration::from_millis(10),
            op_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Leading segment of every storage key.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolution tiers, finest first.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decimal places values are rounded to.
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// How long a lock marker outlives a crashed holder.
    #[must_use]
    pub fn lock_expiry(&self) -> Duration {
        self.lock_expiry
    }

    /// How long a writer waits for a series lock.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Pause between two lock attempts.
    #[must_use]
    pub fn lock_poll(&self) -> Duration {
        self.lock_poll
    }

    /// Deadline of calls that do not pass one explicitly.
    #[must_use]
    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }
}

/// Builder for [`Archive`].
pub struct Builder {
    config: Config,
    cache_size_mib: u64,
}

impl Builder {
    pub(crate) fn new() -> Self {
        Self {
            config: Config::default(),
            cache_size_mib: 64,
        }
    }

    /// Sets the leading segment of every storage key.
    ///
    /// Default = `records`
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        namespace.clone_into(&mut self.config.namespace);
        self
    }

    /// Sets the resolution tiers.
    ///
    /// Default = 1 minute for a day, 1 hour for 8 weeks, 1 day for 4 years
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.config.schema = schema;
        self
    }

    /// Sets the number of decimal places values are rounded to.
    ///
    /// Default = 2
    #[must_use]
    pub fn precision(mut self, places: u8) -> Self {
        self.config.precision = places;
        self
    }

    /// Sets how long a lock marker outlives a crashed holder.
    ///
    /// Default = 60 seconds
    #[must_use]
    pub fn lock_expiry(mut self, expiry: Duration) -> Self {
        self.config.lock_expiry = expiry;
        self
    }

    /// Sets how long a writer waits for a series lock.
    ///
    /// Default = 10 seconds
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Sets the pause between two lock attempts.
    ///
    /// Default = 10 ms
    #[must_use]
    pub fn lock_poll(mut self, interval: Duration) -> Self {
        self.config.lock_poll = interval;
        self
    }

    /// Sets the deadline of calls that do not pass one explicitly.
    ///
    /// Default = 30 seconds
    #[must_use]
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.config.op_timeout = timeout;
        self
    }

    /// Sets the block cache size in MiB, used by [`Builder::open`].
    ///
    /// Default = 64 MiB
    #[must_use]
    pub fn cache_size_mib(mut self, mib: u64) -> Self {
        self.cache_size_mib = mib;
        self
    }

    fn check(&self) -> crate::Result<()> {
        crate::validate::key(&self.config.namespace, crate::Error::from)
            .map_err(|e| crate::Error::InvalidConfig(format!("namespace: {e}")))?;

        if self.config.precision > 15 {
            return Err(crate::Error::InvalidConfig(format!(
                "precision of {} places exceeds what a float can hold",
                self.config.precision
            )));
        }

        if self.config.lock_poll.is_zero() {
            return Err(crate::Error::InvalidConfig(
                "lock poll interval must not be zero".into(),
            ));
        }

        Ok(())
    }

    /// Opens or recovers a persistent archive.
    ///
    /// If you have a keyspace already in your application, you may
    /// want to use [`Builder::open_in_keyspace`] instead.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred, or the configuration is invalid.
    pub fn open<P: AsRef<Path>>(self, path: P) -> crate::Result<Archive<FjallStore>> {
        self.check()?;
        let store = FjallStore::open(path, self.cache_size_mib)?;
        Ok(Archive::from_parts(store, self.config))
    }

    /// Uses an existing `fjall` keyspace to open an archive.
    ///
    /// Partitions are prefixed with `_tiera#` to avoid name clashes with other applications.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred, or the configuration is invalid.
    pub fn open_in_keyspace(self, keyspace: TxKeyspace) -> crate::Result<Archive<FjallStore>> {
        self.check()?;
        let store = FjallStore::new(keyspace)?;
        Ok(Archive::from_parts(store, self.config))
    }

    /// Creates an archive that lives in memory only.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn in_memory(self) -> crate::Result<Archive<MemoryStore>> {
        self.with_store(MemoryStore::new())
    }

    /// Creates an archive on top of any [`Store`].
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_store<S: Store>(self, store: S) -> crate::Result<Archive<S>> {
        self.check()?;
        Ok(Archive::from_parts(store, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test_log::test]
    fn builder_rejects_bad_config() {
        assert!(matches!(
            Builder::new().namespace("a!b").in_memory(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Builder::new().precision(16).in_memory(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Builder::new().lock_poll(Duration::ZERO).in_memory(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test_log::test]
    fn builder_applies_settings() -> crate::Result<()> {
        let archive = Builder::new()
            .namespace("metrics")
            .precision(3)
            .lock_timeout(Duration::from_secs(1))
            .in_memory()?;

        let config = archive.config();
        assert_eq!("metrics", config.namespace());
        assert_eq!(3, config.precision());
        assert_eq!(Duration::from_secs(1), config.lock_timeout());
        assert_eq!(Duration::from_secs(60), config.lock_expiry());
        assert_eq!(3, config.schema().tiers().len());

        Ok(())
    }
}
