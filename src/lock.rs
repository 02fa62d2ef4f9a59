use crate::store::Store;
use crate::time::Deadline;
use crate::Config;
use std::time::Instant;

/// Advisory per-series lock
///
/// Held while the guard lives; the marker is released on drop,
/// but only if it still carries this holder's token.
pub struct SeriesLock<'a, S: Store + ?Sized> {
    store: &'a S,
    key: String,
    token: String,
}

impl<'a, S: Store + ?Sized> SeriesLock<'a, S> {
    /// Polls until the marker at `key` could be set, the lock timeout
    /// elapsed or the deadline passed.
    pub fn acquire(
        store: &'a S,
        key: String,
        config: &Config,
        deadline: Deadline,
    ) -> crate::Result<Self> {
        let token = format!("{:016x}", rand::random::<u64>());
        let give_up = Instant::now() + config.lock_timeout();

        loop {
            deadline.check()?;

            if store.set_if_absent(&key, &token, config.lock_expiry())? {
                log::trace!("acquired lock {key:?}");
                return Ok(Self { store, key, token });
            }

            let now = Instant::now();
            if now >= give_up {
                return Err(crate::Error::LockTimeout(key));
            }

            let nap = config
                .lock_poll()
                .min(give_up - now)
                .min(deadline.remaining());

            std::thread::sleep(nap);
        }
    }
}

impl<S: Store + ?Sized> Drop for SeriesLock<'_, S> {
    fn drop(&mut self) {
        match self.store.delete_if_equals(&self.key, &self.token) {
            Ok(true) => log::trace!("released lock {:?}", self.key),
            Ok(false) => log::warn!("lock {:?} expired before it was released", self.key),
            Err(e) => log::warn!("failed to release lock {:?}: {e}", self.key),
        }
    }
}
