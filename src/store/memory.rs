use super::{Batch, Op, Store};
use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Inner {
    scalars: crate::HashMap<String, String>,
    lists: crate::HashMap<String, VecDeque<String>>,
}

/// In-process store
///
/// Useful for tests and for archives that do not need to outlive the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,

    /// Lock markers: token and expiry
    locks: Mutex<crate::HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn multi_get(&self, keys: &[String]) -> crate::Result<Vec<Option<String>>> {
        let inner = self.inner.read().expect("lock is poisoned");
        Ok(keys.iter().map(|k| inner.scalars.get(k).cloned()).collect())
    }

    fn list_range(&self, key: &str, start: usize, stop: usize) -> crate::Result<Vec<String>> {
        let inner = self.inner.read().expect("lock is poisoned");

        let Some(list) = inner.lists.get(key) else {
            return Ok(vec![]);
        };

        Ok(list
            .iter()
            .skip(start)
            .take(stop.saturating_add(1).saturating_sub(start))
            .cloned()
            .collect())
    }

    fn list_len(&self, key: &str) -> crate::Result<usize> {
        let inner = self.inner.read().expect("lock is poisoned");
        Ok(inner.lists.get(key).map_or(0, VecDeque::len))
    }

    fn scan_prefix(&self, prefix: &str) -> crate::Result<Vec<(String, String)>> {
        let inner = self.inner.read().expect("lock is poisoned");

        let mut items = inner
            .scalars
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>();
        items.sort();

        Ok(items)
    }

    fn commit(&self, batch: Batch) -> crate::Result<()> {
        log::trace!("applying {} commands", batch.len());

        let mut inner = self.inner.write().expect("lock is poisoned");

        for op in batch.into_ops() {
            match op {
                Op::Set { key, value } => {
                    inner.scalars.insert(key, value);
                }
                Op::PushFront { key, values } => {
                    let list = inner.lists.entry(key).or_default();
                    for value in values {
                        list.push_front(value);
                    }
                }
                Op::Trim { key, keep } => {
                    if let Some(list) = inner.lists.get_mut(&key) {
                        list.truncate(keep);
                    }
                }
                Op::Delete { key } => {
                    inner.scalars.remove(&key);
                    inner.lists.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> crate::Result<bool> {
        let mut locks = self.locks.lock().expect("lock is poisoned");
        let now = Instant::now();

        if let Some((_, expires)) = locks.get(key) {
            if *expires > now {
                return Ok(false);
            }
        }

        locks.insert(key.to_owned(), (token.to_owned(), now + ttl));
        Ok(true)
    }

    fn delete_if_equals(&self, key: &str, token: &str) -> crate::Result<bool> {
        let mut locks = self.locks.lock().expect("lock is poisoned");

        match locks.get(key) {
            Some((holder, _)) if holder == token => {
                locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test_log::test]
    fn memory_scalars() -> crate::Result<()> {
        contract::scalars(&MemoryStore::new())
    }

    #[test_log::test]
    fn memory_lists() -> crate::Result<()> {
        contract::lists(&MemoryStore::new())
    }

    #[test_log::test]
    fn memory_prefix_scan() -> crate::Result<()> {
        contract::prefix_scan(&MemoryStore::new())
    }

    #[test_log::test]
    fn memory_lock_markers() -> crate::Result<()> {
        contract::lock_markers(&MemoryStore::new())
    }

    #[test_log::test]
    fn memory_lock_marker_expiry() -> crate::Result<()> {
        contract::lock_marker_expiry(&MemoryStore::new())
    }
}
