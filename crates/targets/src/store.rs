// Copyright 2024 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::StoreError;
use rustfs_config::notify::{COMPRESS_EXT, DEFAULT_EXT, DEFAULT_LIMIT, TMP_EXT};
use serde::{Serialize, de::DeserializeOwned};
use snap::raw::{Decoder, Encoder};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Width of the zero-padded sequence in entry file names, enough for any `u64`.
const SEQ_WIDTH: usize = 20;

/// Identifies one pending entry in a [`QueueStore`].
///
/// Keys are generated by the store. Their file names sort lexicographically in creation
/// order, and `Ord` on keys follows the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    /// Monotonic sequence number assigned at `put`
    pub seq: u64,
    /// The file extension for the entry
    pub extension: String,
    /// Whether the entry is compressed
    pub compress: bool,
}

impl Key {
    fn new(seq: u64, extension: &str) -> Self {
        Key {
            seq,
            extension: extension.to_string(),
            compress: true,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}{}", self.seq, self.extension, width = SEQ_WIDTH)?;
        if self.compress {
            f.write_str(COMPRESS_EXT)?;
        }
        Ok(())
    }
}

/// Parses an entry file name produced by a store using `extension`.
///
/// Returns `None` for anything the store did not write itself.
pub fn parse_key(file_name: &str, extension: &str) -> Option<Key> {
    let (name, compress) = match file_name.strip_suffix(COMPRESS_EXT) {
        Some(rest) => (rest, true),
        None => (file_name, false),
    };
    let digits = name.strip_suffix(extension)?;
    if digits.len() != SEQ_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let seq = digits.parse::<u64>().ok()?;
    Some(Key {
        seq,
        extension: extension.to_string(),
        compress,
    })
}

/// A durable, bounded FIFO of items awaiting delivery.
///
/// Implementations must serialize their own operations: the ingress path and the replay
/// task use the same store concurrently.
pub trait Store<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// The error type for the store
    type Error;
    /// The key type for the store
    type Key;

    /// Prepares the backing storage. Calling it again is a no-op.
    fn open(&self) -> Result<(), Self::Error>;

    /// Persists one item. The store assigns the key; it becomes visible to `list`.
    fn put(&self, item: Arc<T>) -> Result<(), Self::Error>;

    /// Retrieves a pending item.
    fn get(&self, key: &Self::Key) -> Result<T, Self::Error>;

    /// Removes an item. Removing an absent key succeeds.
    fn del(&self, key: &Self::Key) -> Result<(), Self::Error>;

    /// Snapshot of pending keys, oldest first.
    fn list(&self) -> Vec<Self::Key>;

    /// Returns the number of pending items
    fn len(&self) -> usize;

    /// Returns true if nothing is pending
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct QueueState {
    opened: bool,
    last_seq: u64,
    entries: BTreeMap<u64, Key>,
}

/// A store that persists each item as one snappy-compressed JSON file in a directory.
pub struct QueueStore<T> {
    entry_limit: u64,
    directory: PathBuf,
    file_ext: String,
    state: Mutex<QueueState>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> QueueStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a new QueueStore. A `limit` of 0 selects the default limit.
    pub fn new(directory: impl Into<PathBuf>, limit: u64, ext: &str) -> Self {
        let file_ext = if ext.is_empty() { DEFAULT_EXT } else { ext };
        QueueStore {
            entry_limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
            directory: directory.into(),
            file_ext: file_ext.to_string(),
            state: Mutex::new(QueueState::default()),
            _phantom: PhantomData,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entry_limit(&self) -> u64 {
        self.entry_limit
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("queue store lock poisoned".to_string()))
    }

    fn file_path(&self, key: &Key) -> PathBuf {
        self.directory.join(key.to_string())
    }

    fn unavailable(&self, e: std::io::Error) -> StoreError {
        StoreError::Unavailable(format!("{}: {e}", self.directory.display()))
    }

    /// Opens the store if needed; callers hold the state lock.
    fn open_locked(&self, state: &mut QueueState) -> Result<(), StoreError> {
        if state.opened {
            return Ok(());
        }

        fs::create_dir_all(&self.directory).map_err(|e| self.unavailable(e))?;
        let dir = fs::read_dir(&self.directory).map_err(|e| self.unavailable(e))?;

        for entry in dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(TMP_EXT) {
                // Interrupted write, the entry was never acknowledged.
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(file = %file_name, error = %e, "failed to remove partial queue entry");
                }
                continue;
            }
            match parse_key(&file_name, &self.file_ext) {
                Some(key) => {
                    state.last_seq = state.last_seq.max(key.seq);
                    state.entries.insert(key.seq, key);
                }
                None => debug!(file = %file_name, "ignoring foreign file in queue directory"),
            }
        }

        state.opened = true;
        debug!(directory = %self.directory.display(), pending = state.entries.len(), "opened queue store");
        Ok(())
    }

    fn next_seq(last: u64) -> Result<u64, StoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let next = last
            .checked_add(1)
            .ok_or_else(|| StoreError::Internal(format!("queue sequence exhausted after {last}")))?;
        Ok(now.max(next))
    }

    fn write_entry(&self, key: &Key, data: &[u8]) -> Result<(), StoreError> {
        let path = self.file_path(key);
        let tmp_path = self.directory.join(format!("{key}{TMP_EXT}"));
        fs::write(&tmp_path, data)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    fn encode(item: &T) -> Result<Vec<u8>, StoreError> {
        let data = serde_json::to_vec(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Encoder::new()
            .compress_vec(&data)
            .map_err(|e| StoreError::Compression(e.to_string()))
    }

    fn decode(key: &Key, data: &[u8]) -> Result<T, StoreError> {
        if data.is_empty() {
            return Err(StoreError::Deserialization(format!("entry {key} is empty")));
        }
        let data = if key.compress {
            Decoder::new()
                .decompress_vec(data)
                .map_err(|e| StoreError::Compression(e.to_string()))?
        } else {
            data.to_vec()
        };
        serde_json::from_slice(&data).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

impl<T> Store<T> for QueueStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Error = StoreError;
    type Key = Key;

    fn open(&self) -> Result<(), Self::Error> {
        let mut state = self.lock()?;
        self.open_locked(&mut state)
    }

    fn put(&self, item: Arc<T>) -> Result<(), Self::Error> {
        let data = Self::encode(&item)?;

        let mut state = self.lock()?;
        self.open_locked(&mut state)?;
        if state.entries.len() as u64 >= self.entry_limit {
            return Err(StoreError::LimitExceeded);
        }

        let key = Key::new(Self::next_seq(state.last_seq)?, &self.file_ext);
        self.write_entry(&key, &data)?;
        state.last_seq = key.seq;
        debug!(key = %key, directory = %self.directory.display(), "queued entry");
        state.entries.insert(key.seq, key);
        Ok(())
    }

    fn get(&self, key: &Self::Key) -> Result<T, Self::Error> {
        let mut state = self.lock()?;
        self.open_locked(&mut state)?;
        if !state.entries.contains_key(&key.seq) {
            return Err(StoreError::NotFound);
        }

        let data = match fs::read(self.file_path(key)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                state.entries.remove(&key.seq);
                return Err(StoreError::NotFound);
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Self::decode(key, &data)
    }

    fn del(&self, key: &Self::Key) -> Result<(), Self::Error> {
        let mut state = self.lock()?;
        self.open_locked(&mut state)?;
        match fs::remove_file(self.file_path(key)) {
            Ok(()) => debug!(key = %key, "deleted entry"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        state.entries.remove(&key.seq);
        Ok(())
    }

    fn list(&self) -> Vec<Self::Key> {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "cannot list queue store");
                return Vec::new();
            }
        };
        if let Err(e) = self.open_locked(&mut state) {
            warn!(directory = %self.directory.display(), error = %e, "cannot list queue store");
            return Vec::new();
        }
        state.entries.values().cloned().collect()
    }

    fn len(&self) -> usize {
        match self.lock() {
            Ok(state) => state.entries.len(),
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u32,
        body: String,
    }

    fn record(id: u32) -> Arc<Record> {
        Arc::new(Record {
            id,
            body: format!("event-{id}"),
        })
    }

    fn store_in(dir: &TempDir, limit: u64) -> QueueStore<Record> {
        let store = QueueStore::new(dir.path().join("queue"), limit, ".event");
        store.open().unwrap();
        store
    }

    fn ids(store: &QueueStore<Record>) -> Vec<u32> {
        store.list().iter().map(|k| store.get(k).unwrap().id).collect()
    }

    #[test]
    fn test_key_file_name_sorts_by_sequence() {
        let a = Key::new(9, ".event");
        let b = Key::new(10, ".event");
        assert!(a.to_string() < b.to_string());
        assert_eq!(a.to_string(), "00000000000000000009.event.snappy");
        assert_eq!(parse_key(&b.to_string(), ".event"), Some(b));
        assert_eq!(parse_key("notes.txt", ".event"), None);
        assert_eq!(parse_key("123.event.snappy", ".event"), None);
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        store.put(record(1)).unwrap();
        store.open().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_open_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let store: QueueStore<Record> = QueueStore::new(blocker.join("queue"), 10, ".event");
        assert!(matches!(store.open(), Err(StoreError::Unavailable(_))));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_fifo_with_interleaved_put_and_del() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 100);

        store.put(record(1)).unwrap();
        store.put(record(2)).unwrap();
        let first = store.list()[0].clone();
        store.del(&first).unwrap();
        store.put(record(3)).unwrap();
        store.put(record(4)).unwrap();
        let third = store.list()[1].clone();
        store.del(&third).unwrap();
        store.put(record(5)).unwrap();

        assert_eq!(ids(&store), vec![2, 4, 5]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_get_after_del_is_not_found_and_del_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        store.put(record(7)).unwrap();
        let key = store.list().remove(0);

        assert_eq!(store.get(&key).unwrap().body, "event-7");
        store.del(&key).unwrap();
        store.del(&key).unwrap();
        assert!(matches!(store.get(&key), Err(StoreError::NotFound)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_limit_is_enforced() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 3);
        for i in 0..3 {
            store.put(record(i)).unwrap();
        }
        assert!(matches!(store.put(record(99)), Err(StoreError::LimitExceeded)));

        let oldest = store.list().remove(0);
        store.del(&oldest).unwrap();
        store.put(record(100)).unwrap();
        assert_eq!(ids(&store), vec![1, 2, 100]);
    }

    #[test]
    fn test_reopen_recovers_order_and_sequence() {
        let dir = TempDir::new().unwrap();
        {
            let store = store_in(&dir, 10);
            store.put(record(1)).unwrap();
            store.put(record(2)).unwrap();
        }
        fs::write(dir.path().join("queue").join("stray.txt"), b"not ours").unwrap();
        fs::write(dir.path().join("queue").join("00000000000000000001.event.snappy.tmp"), b"partial").unwrap();

        let store = store_in(&dir, 10);
        store.put(record(3)).unwrap();
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert!(!dir.path().join("queue").join("00000000000000000001.event.snappy.tmp").exists());
        assert!(dir.path().join("queue").join("stray.txt").exists());
    }

    #[test]
    fn test_exhausted_sequence_fails_put() {
        let dir = TempDir::new().unwrap();
        let queue = dir.path().join("queue");
        fs::create_dir_all(&queue).unwrap();
        let last = Key::new(u64::MAX, ".event");
        assert_eq!(last.to_string(), "18446744073709551615.event.snappy");
        fs::write(queue.join(last.to_string()), b"x").unwrap();

        let store = store_in(&dir, 10);
        assert_eq!(store.len(), 1);
        assert!(matches!(store.put(record(1)), Err(StoreError::Internal(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_corrupt_entry_reports_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        store.put(record(1)).unwrap();
        let key = store.list().remove(0);
        fs::write(dir.path().join("queue").join(key.to_string()), b"garbage").unwrap();

        let err = store.get(&key).unwrap_err();
        assert!(err.is_corrupt_entry(), "{err}");
    }

    #[test]
    fn test_operations_open_lazily() {
        let dir = TempDir::new().unwrap();
        let store: QueueStore<Record> = QueueStore::new(dir.path().join("lazy"), 0, "");
        store.put(record(1)).unwrap();
        assert_eq!(store.entry_limit(), DEFAULT_LIMIT);
        assert!(store.directory().exists());
        assert_eq!(store.list()[0].extension, DEFAULT_EXT);
    }

    #[test]
    fn test_concurrent_puts_keep_unique_keys() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir, 1000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.put(record(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let keys = store.list();
        assert_eq!(keys.len(), 100);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
