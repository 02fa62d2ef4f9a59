use super::{Batch, Op, Store};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fjall::{
    BlockCache, CompressionType, PartitionCreateOptions, TxKeyspace, TxPartition,
    WriteTransaction,
};
use std::collections::{hash_map::Entry, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SCALARS_PARTITION: &str = "_tiera#v1#kv";
const LISTS_PARTITION: &str = "_tiera#v1#lists";
const LOCKS_PARTITION: &str = "_tiera#v1#locks";

/// Staged list contents; `None` marks a deleted list
type StagedLists = crate::HashMap<String, Option<VecDeque<String>>>;

fn now_millis() -> u64 {
    let since_the_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    u64::try_from(since_the_epoch.as_millis()).unwrap_or(u64::MAX)
}

fn to_string(bytes: &[u8]) -> crate::Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| crate::Error::CorruptRecord("value is not utf-8".into()))
}

/// Store backed by a transactional `fjall` keyspace
///
/// Scalars, lists and lock markers each live in their own partition.
/// A list is stored as one value holding all of its elements.
pub struct FjallStore {
    keyspace: TxKeyspace,
    scalars: TxPartition,
    lists: TxPartition,
    locks: TxPartition,
}

impl FjallStore {
    /// Opens or recovers a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred.
    pub fn open<P: AsRef<Path>>(path: P, cache_size_mib: u64) -> crate::Result<Self> {
        let keyspace = fjall::Config::new(path)
            .block_cache(Arc::new(BlockCache::with_capacity_bytes(
                cache_size_mib * 1_024 * 1_024,
            )))
            .open_transactional()?;

        Self::new(keyspace)
    }

    /// Uses an existing keyspace.
    ///
    /// Partitions are prefixed with `_tiera#` to avoid name clashes with other applications.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred.
    pub fn new(keyspace: TxKeyspace) -> crate::Result<Self> {
        let opts = || {
            PartitionCreateOptions::default()
                .block_size(4_096)
                .compression(CompressionType::Lz4)
        };

        let scalars = keyspace.open_partition(SCALARS_PARTITION, opts())?;
        let lists =
            keyspace.open_partition(LISTS_PARTITION, opts().max_memtable_size(16_000_000))?;
        let locks = keyspace.open_partition(LOCKS_PARTITION, opts())?;

        Ok(Self {
            keyspace,
            scalars,
            lists,
            locks,
        })
    }

    fn encoded_len(len: usize) -> crate::Result<u32> {
        u32::try_from(len)
            .map_err(|_| crate::Error::CorruptRecord(format!("list length {len} exceeds u32")))
    }

    fn serialize_list(list: &VecDeque<String>) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(4 + list.iter().map(|s| 4 + s.len()).sum::<usize>());

        bytes.write_u32::<BigEndian>(Self::encoded_len(list.len())?)?;

        for item in list {
            bytes.write_u32::<BigEndian>(Self::encoded_len(item.len())?)?;
            bytes.extend_from_slice(item.as_bytes());
        }

        Ok(bytes)
    }

    fn deserialize_list(bytes: &[u8]) -> crate::Result<VecDeque<String>> {
        let corrupt = |_| crate::Error::CorruptRecord("truncated list".into());

        let mut reader = bytes;
        let len = reader.read_u32::<BigEndian>().map_err(corrupt)? as usize;
        let mut list = VecDeque::with_capacity(len);

        for _ in 0..len {
            let item_len = reader.read_u32::<BigEndian>().map_err(corrupt)? as usize;

            if reader.len() < item_len {
                return Err(crate::Error::CorruptRecord("truncated list item".into()));
            }

            let (item, rest) = reader.split_at(item_len);
            list.push_back(to_string(item)?);
            reader = rest;
        }

        Ok(list)
    }

    fn serialize_lock(token: &str, expires_at: u64) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(8 + token.len());
        bytes.write_u64::<BigEndian>(expires_at)?;
        bytes.extend_from_slice(token.as_bytes());
        Ok(bytes)
    }

    fn deserialize_lock(bytes: &[u8]) -> crate::Result<(String, u64)> {
        let mut reader = bytes;
        let expires_at = reader
            .read_u64::<BigEndian>()
            .map_err(|_| crate::Error::CorruptRecord("truncated lock marker".into()))?;

        Ok((to_string(reader)?, expires_at))
    }

    fn read_list(&self, key: &str) -> crate::Result<VecDeque<String>> {
        match self.lists.get(key)? {
            Some(bytes) => Self::deserialize_list(&bytes),
            None => Ok(VecDeque::new()),
        }
    }

    fn staged_list<'a>(
        &self,
        tx: &WriteTransaction,
        staged: &'a mut StagedLists,
        key: String,
    ) -> crate::Result<&'a mut VecDeque<String>> {
        let slot = match staged.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let list = match tx.get(&self.lists, entry.key().as_str())? {
                    Some(bytes) => Self::deserialize_list(&bytes)?,
                    None => VecDeque::new(),
                };
                entry.insert(Some(list))
            }
        };

        Ok(slot.get_or_insert_with(VecDeque::new))
    }
}

impl Store for FjallStore {
    fn multi_get(&self, keys: &[String]) -> crate::Result<Vec<Option<String>>> {
        let read_tx = self.keyspace.read_tx();

        keys.iter()
            .map(|key| match read_tx.get(&self.scalars, key.as_str())? {
                Some(bytes) => to_string(&bytes).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    fn list_range(&self, key: &str, start: usize, stop: usize) -> crate::Result<Vec<String>> {
        let list = self.read_list(key)?;

        Ok(list
            .into_iter()
            .skip(start)
            .take(stop.saturating_add(1).saturating_sub(start))
            .collect())
    }

    fn list_len(&self, key: &str) -> crate::Result<usize> {
        let Some(bytes) = self.lists.get(key)? else {
            return Ok(0);
        };

        let mut reader = &bytes[..];
        let len = reader
            .read_u32::<BigEndian>()
            .map_err(|_| crate::Error::CorruptRecord("truncated list".into()))?;

        Ok(len as usize)
    }

    fn scan_prefix(&self, prefix: &str) -> crate::Result<Vec<(String, String)>> {
        let read_tx = self.keyspace.read_tx();
        let mut items = vec![];

        for kv in read_tx.prefix(&self.scalars, prefix) {
            let (k, v) = kv?;
            items.push((to_string(&k)?, to_string(&v)?));
        }

        Ok(items)
    }

    fn commit(&self, batch: Batch) -> crate::Result<()> {
        log::trace!("applying {} commands", batch.len());

        let mut tx = self.keyspace.write_tx();
        let mut staged = StagedLists::default();

        for op in batch.into_ops() {
            match op {
                Op::Set { key, value } => {
                    tx.insert(&self.scalars, key.as_str(), value.as_str());
                }
                Op::PushFront { key, values } => {
                    let list = self.staged_list(&tx, &mut staged, key)?;
                    for value in values {
                        list.push_front(value);
                    }
                }
                Op::Trim { key, keep } => {
                    self.staged_list(&tx, &mut staged, key)?.truncate(keep);
                }
                Op::Delete { key } => {
                    tx.remove(&self.scalars, key.as_str());
                    staged.insert(key, None);
                }
            }
        }

        for (key, list) in staged {
            match list {
                Some(list) if !list.is_empty() => {
                    tx.insert(&self.lists, key.as_str(), Self::serialize_list(&list)?);
                }
                _ => tx.remove(&self.lists, key.as_str()),
            }
        }

        tx.commit()?;

        Ok(())
    }

    fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> crate::Result<bool> {
        let now = now_millis();

        // NOTE: Write transactions are serialized, so the check and the insert are atomic
        let mut tx = self.keyspace.write_tx();

        if let Some(bytes) = tx.get(&self.locks, key)? {
            let (_, expires_at) = Self::deserialize_lock(&bytes)?;
            if expires_at > now {
                return Ok(false);
            }
        }

        let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        tx.insert(
            &self.locks,
            key,
            Self::serialize_lock(token, now.saturating_add(ttl))?,
        );
        tx.commit()?;

        Ok(true)
    }

    fn delete_if_equals(&self, key: &str, token: &str) -> crate::Result<bool> {
        let mut tx = self.keyspace.write_tx();

        let Some(bytes) = tx.get(&self.locks, key)? else {
            return Ok(false);
        };

        let (holder, _) = Self::deserialize_lock(&bytes)?;
        if holder != token {
            return Ok(false);
        }

        tx.remove(&self.locks, key);
        tx.commit()?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    fn open() -> crate::Result<(tempfile::TempDir, FjallStore)> {
        let path = tempfile::tempdir()?;
        let keyspace = fjall::Config::new(&path).open_transactional()?;
        Ok((path, FjallStore::new(keyspace)?))
    }

    #[test_log::test]
    fn fjall_scalars() -> crate::Result<()> {
        let (_path, store) = open()?;
        contract::scalars(&store)
    }

    #[test_log::test]
    fn fjall_lists() -> crate::Result<()> {
        let (_path, store) = open()?;
        contract::lists(&store)
    }

    #[test_log::test]
    fn fjall_prefix_scan() -> crate::Result<()> {
        let (_path, store) = open()?;
        contract::prefix_scan(&store)
    }

    #[test_log::test]
    fn fjall_lock_markers() -> crate::Result<()> {
        let (_path, store) = open()?;
        contract::lock_markers(&store)
    }

    #[test_log::test]
    fn fjall_lock_marker_expiry() -> crate::Result<()> {
        let (_path, store) = open()?;
        contract::lock_marker_expiry(&store)
    }

    #[test_log::test]
    fn fjall_list_encoding() -> crate::Result<()> {
        let list = ["", "7.00", "ü"]
            .into_iter()
            .map(str::to_owned)
            .collect::<VecDeque<_>>();

        let bytes = FjallStore::serialize_list(&list)?;
        assert_eq!(list, FjallStore::deserialize_list(&bytes)?);

        assert!(matches!(
            FjallStore::deserialize_list(&bytes[..bytes.len() - 1]),
            Err(crate::Error::CorruptRecord(_))
        ));

        assert_eq!(u32::MAX, FjallStore::encoded_len(u32::MAX as usize)?);

        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            FjallStore::encoded_len(u32::MAX as usize + 1),
            Err(crate::Error::CorruptRecord(_))
        ));

        Ok(())
    }

    #[test_log::test]
    fn fjall_recovers_after_reopen() -> crate::Result<()> {
        let path = tempfile::tempdir()?;

        {
            let store = FjallStore::open(&path, 8)?;
            let mut batch = Batch::new();
            batch
                .set("a", "1")
                .push_front("l", vec!["x".into(), "y".into()]);
            store.commit(batch)?;
        }

        let store = FjallStore::open(&path, 8)?;
        assert_eq!(Some("1".to_owned()), store.get("a")?);
        assert_eq!(vec!["y".to_owned(), "x".to_owned()], store.list_range("l", 0, 1)?);

        Ok(())
    }
}
