//! Key-value backends the archive persists tier state in.
//!
//! A backend offers scalar keys, newest-first lists, an atomic batch of
//! commands, and expiring lock markers. [`MemoryStore`] keeps everything in
//! process, [`FjallStore`] persists to a `fjall` keyspace.

mod keyspace;
mod memory;

pub use keyspace::FjallStore;
pub use memory::MemoryStore;

use std::time::Duration;

/// A command staged in a [`Batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Sets a scalar key.
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },

    /// Pushes values onto the front of a list, one after the other.
    ///
    /// The last value ends up at the head.
    PushFront {
        /// Key
        key: String,

        /// Values, oldest first
        values: Vec<String>,
    },

    /// Keeps only the first `keep` elements of a list.
    Trim {
        /// Key
        key: String,

        /// Number of elements to keep
        keep: usize,
    },

    /// Deletes a scalar or list key.
    Delete {
        /// Key
        key: String,
    },
}

/// Commands applied atomically by [`Store::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages setting a scalar key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(Op::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Stages pushing `values` onto the front of a list, oldest first.
    pub fn push_front(&mut self, key: impl Into<String>, values: Vec<String>) -> &mut Self {
        if !values.is_empty() {
            self.ops.push(Op::PushFront {
                key: key.into(),
                values,
            });
        }
        self
    }

    /// Stages trimming a list to its first `keep` elements.
    pub fn trim(&mut self, key: impl Into<String>, keep: usize) -> &mut Self {
        self.ops.push(Op::Trim {
            key: key.into(),
            keep,
        });
        self
    }

    /// Stages deleting a key.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(Op::Delete { key: key.into() });
        self
    }

    /// Number of staged commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Staged commands, in order.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Consumes the batch, returning its commands.
    #[must_use]
    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }
}

/// Backing store contract.
///
/// Lists are ordered newest first; index 0 is the head.
pub trait Store: Send + Sync {
    /// Reads a scalar key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.multi_get(&[key.to_owned()])?.pop().flatten())
    }

    /// Reads several scalar keys in one round trip.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn multi_get(&self, keys: &[String]) -> crate::Result<Vec<Option<String>>>;

    /// Reads list elements `start..=stop`, clamped to the list length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn list_range(&self, key: &str, start: usize, stop: usize) -> crate::Result<Vec<String>>;

    /// Length of a list, 0 if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn list_len(&self, key: &str) -> crate::Result<usize>;

    /// Scalar keys starting with `prefix`, with their values, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn scan_prefix(&self, prefix: &str) -> crate::Result<Vec<(String, String)>>;

    /// Applies all commands of a batch atomically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed,
    /// in which case none of the commands were applied.
    fn commit(&self, batch: Batch) -> crate::Result<()>;

    /// Sets a lock marker to `token` unless an unexpired marker exists.
    ///
    /// Returns `true` if the marker was set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> crate::Result<bool>;

    /// Deletes a lock marker if it still holds `token`.
    ///
    /// Returns `true` if the marker was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the backend failed.
    fn delete_if_equals(&self, key: &str, token: &str) -> crate::Result<bool>;
}

/// Behaviour every [`Store`] implementation has to provide.
#[cfg(test)]
pub(crate) mod contract {
    use super::{Batch, Store};
    use std::time::Duration;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|&s| s.to_owned()).collect()
    }

    pub fn scalars(store: &dyn Store) -> crate::Result<()> {
        assert_eq!(None, store.get("a")?);

        let mut batch = Batch::new();
        batch.set("a", "1").set("b", "2").set("a", "3");
        store.commit(batch)?;

        assert_eq!(Some("3".to_owned()), store.get("a")?);
        assert_eq!(
            vec![Some("3".to_owned()), None, Some("2".to_owned())],
            store.multi_get(&strings(&["a", "c", "b"]))?
        );

        let mut batch = Batch::new();
        batch.delete("a");
        store.commit(batch)?;
        assert_eq!(None, store.get("a")?);

        Ok(())
    }

    pub fn lists(store: &dyn Store) -> crate::Result<()> {
        assert_eq!(0, store.list_len("l")?);
        assert!(store.list_range("l", 0, 10)?.is_empty());

        let mut batch = Batch::new();
        batch.push_front("l", strings(&["1", "2", "3"]));
        batch.push_front("l", strings(&["4"]));
        store.commit(batch)?;

        assert_eq!(4, store.list_len("l")?);
        assert_eq!(strings(&["4", "3", "2", "1"]), store.list_range("l", 0, 10)?);
        assert_eq!(strings(&["3", "2"]), store.list_range("l", 1, 2)?);
        assert!(store.list_range("l", 7, 9)?.is_empty());

        let mut batch = Batch::new();
        batch.push_front("l", strings(&["5"])).trim("l", 3);
        store.commit(batch)?;
        assert_eq!(strings(&["5", "4", "3"]), store.list_range("l", 0, 10)?);

        let mut batch = Batch::new();
        batch.delete("l").push_front("l", strings(&["6"]));
        store.commit(batch)?;
        assert_eq!(strings(&["6"]), store.list_range("l", 0, 0)?);

        Ok(())
    }

    pub fn prefix_scan(store: &dyn Store) -> crate::Result<()> {
        let mut batch = Batch::new();
        batch
            .set("ns#series!b!x!last", "2")
            .set("ns#series!a!x!last", "1")
            .set("ns!a!x!last!60!last", "x");
        store.commit(batch)?;

        assert_eq!(
            vec![
                ("ns#series!a!x!last".to_owned(), "1".to_owned()),
                ("ns#series!b!x!last".to_owned(), "2".to_owned()),
            ],
            store.scan_prefix("ns#series!")?
        );

        Ok(())
    }

    pub fn lock_markers(store: &dyn Store) -> crate::Result<()> {
        let ttl = Duration::from_secs(60);

        assert!(store.set_if_absent("lock", "t1", ttl)?);
        assert!(!store.set_if_absent("lock", "t2", ttl)?);

        assert!(!store.delete_if_equals("lock", "t2")?);
        assert!(store.delete_if_equals("lock", "t1")?);
        assert!(!store.delete_if_equals("lock", "t1")?);

        assert!(store.set_if_absent("lock", "t2", ttl)?);
        assert!(store.delete_if_equals("lock", "t2")?);

        Ok(())
    }

    pub fn lock_marker_expiry(store: &dyn Store) -> crate::Result<()> {
        assert!(store.set_if_absent("lock", "t1", Duration::from_millis(10))?);
        std::thread::sleep(Duration::from_millis(50));

        assert!(store.set_if_absent("lock", "t2", Duration::from_secs(60))?);

        // NOTE: The stale holder cannot release the new marker
        assert!(!store.delete_if_equals("lock", "t1")?);
        assert!(store.delete_if_equals("lock", "t2")?);

        Ok(())
    }
}
