//! Unit of work over the store
//!
//! A [`Transaction`] holds the store's writer lock from `begin` until it is
//! committed or dropped. Writes are staged in memory and become visible to
//! reads through the same transaction immediately; other readers only see
//! them after `commit` writes the whole stage as one RocksDB batch. Dropping
//! an uncommitted transaction discards the stage.

use crate::error::Result;
use crate::storage::{Cf, ReadView, Storage};
use parking_lot::MutexGuard;
use serde::Serialize;
use std::collections::BTreeMap;

type Staged = BTreeMap<(Cf, Vec<u8>), Option<Vec<u8>>>;

/// Open unit of work
pub struct Transaction<'a> {
    storage: &'a Storage,
    staged: Staged,
    committed: bool,
    _writer: MutexGuard<'a, ()>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(storage: &'a Storage, writer: MutexGuard<'a, ()>) -> Self {
        Self {
            storage,
            staged: BTreeMap::new(),
            committed: false,
            _writer: writer,
        }
    }

    /// Stage a raw value
    pub fn put(&mut self, cf: Cf, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert((cf, key), Some(value));
    }

    /// Stage a bincode-encoded record
    pub fn put_record<T: Serialize>(&mut self, cf: Cf, key: Vec<u8>, record: &T) -> Result<()> {
        let value = bincode::serialize(record)?;
        self.put(cf, key, value);
        Ok(())
    }

    /// Stage a deletion
    pub fn delete(&mut self, cf: Cf, key: Vec<u8>) {
        self.staged.insert((cf, key), None);
    }

    /// Number of staged writes
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Apply every staged write atomically and release the writer lock
    pub fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let writes = staged.len();
        if writes > 0 {
            self.storage.write_staged(staged)?;
        }
        self.committed = true;

        tracing::trace!(writes, "Transaction committed");
        Ok(())
    }
}

impl ReadView for Transaction<'_> {
    fn get(&self, cf: Cf, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.staged.get(&(cf, key.to_vec())) {
            Some(staged) => Ok(staged.clone()),
            None => self.storage.get(cf, key),
        }
    }

    fn scan_prefix(&self, cf: Cf, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.storage.scan_prefix(cf, prefix)?.into_iter().collect();

        let overlay = self
            .staged
            .range((cf, prefix.to_vec())..)
            .take_while(|((staged_cf, key), _)| *staged_cf == cf && key.starts_with(prefix));

        for ((_, key), value) in overlay {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("staged", &self.staged.len())
            .field("committed", &self.committed)
            .finish()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            tracing::debug!(discarded = self.staged.len(), "Transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_staged_writes_visible_inside_only() {
        let (storage, _temp) = test_storage();

        let mut tx = storage.begin();
        tx.put(Cf::Users, b"alice".to_vec(), b"1".to_vec());
        assert_eq!(tx.get(Cf::Users, b"alice").unwrap(), Some(b"1".to_vec()));
        tx.commit().unwrap();

        assert_eq!(storage.get(Cf::Users, b"alice").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_drop_discards_stage() {
        let (storage, _temp) = test_storage();

        {
            let mut tx = storage.begin();
            tx.put(Cf::Users, b"bob".to_vec(), b"1".to_vec());
        }

        assert_eq!(storage.get(Cf::Users, b"bob").unwrap(), None);
    }

    #[test]
    fn test_scan_merges_overlay() {
        let (storage, _temp) = test_storage();

        let mut tx = storage.begin();
        tx.put(Cf::Content, b"a1".to_vec(), b"old".to_vec());
        tx.put(Cf::Content, b"a2".to_vec(), b"keep".to_vec());
        tx.commit().unwrap();

        let mut tx = storage.begin();
        tx.put(Cf::Content, b"a1".to_vec(), b"new".to_vec());
        tx.delete(Cf::Content, b"a2".to_vec());
        tx.put(Cf::Content, b"a3".to_vec(), b"added".to_vec());
        tx.put(Cf::Users, b"a4".to_vec(), b"other cf".to_vec());

        let rows = tx.scan_prefix(Cf::Content, b"a").unwrap();
        assert_eq!(
            rows,
            vec![
                (b"a1".to_vec(), b"new".to_vec()),
                (b"a3".to_vec(), b"added".to_vec()),
            ]
        );
    }
}
