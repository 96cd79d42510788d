//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `activities` - Ledger rows (key: activity_id)
//! - `activity_slots` - Unique slot index (key: object || user || trigger || type)
//! - `activity_by_object` - Rows per target object (key: object || activity_id)
//! - `activity_by_user` - Rows per affected user (key: user || activity_id)
//! - `activity_by_origin` - Rows per context object (key: original_object || activity_id)
//! - `activity_by_user_day` - Rows per user and UTC day of their last update (key: user || yyyymmdd || activity_id)
//! - `users` - User rank and follower count (key: user_id)
//! - `content` - Content counters (key: object_id)
//! - `content_children` - Answers of a question (key: parent || child)
//!
//! Composite keys are a sequence of parts, each written as a big-endian
//! `u32` length followed by its bytes, so no part can bleed into the next.

use crate::{
    error::{Error, Result},
    transaction::Transaction,
    Config,
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Column families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cf {
    /// Ledger rows
    Activities,
    /// Unique slot index
    ActivitySlots,
    /// Rows per target object
    ActivityByObject,
    /// Rows per affected user
    ActivityByUser,
    /// Rows per context object
    ActivityByOrigin,
    /// Rows per user and day of last update
    ActivityByUserDay,
    /// User records
    Users,
    /// Content records
    Content,
    /// Parent -> child content links
    ContentChildren,
}

impl Cf {
    /// Every column family
    pub const ALL: [Cf; 9] = [
        Cf::Activities,
        Cf::ActivitySlots,
        Cf::ActivityByObject,
        Cf::ActivityByUser,
        Cf::ActivityByOrigin,
        Cf::ActivityByUserDay,
        Cf::Users,
        Cf::Content,
        Cf::ContentChildren,
    ];

    /// RocksDB name
    pub fn name(&self) -> &'static str {
        match self {
            Cf::Activities => "activities",
            Cf::ActivitySlots => "activity_slots",
            Cf::ActivityByObject => "activity_by_object",
            Cf::ActivityByUser => "activity_by_user",
            Cf::ActivityByOrigin => "activity_by_origin",
            Cf::ActivityByUserDay => "activity_by_user_day",
            Cf::Users => "users",
            Cf::Content => "content",
            Cf::ContentChildren => "content_children",
        }
    }

    fn options(&self) -> Options {
        let mut opts = Options::default();
        match self {
            Cf::Activities => {
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            Cf::ActivitySlots
            | Cf::ActivityByObject
            | Cf::ActivityByUser
            | Cf::ActivityByOrigin
            | Cf::ActivityByUserDay => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                // Indices benefit from bloom filters
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            Cf::Users | Cf::Content | Cf::ContentChildren => {
                // Read on every rank change, use LZ4 for speed
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }
}

const PART_LEN: usize = std::mem::size_of::<u32>();

/// Encode key parts, each prefixed with its length
pub fn compose_key(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|p| p.len() + PART_LEN).sum());
    for part in parts {
        key.extend_from_slice(&(part.len() as u32).to_be_bytes());
        key.extend_from_slice(part);
    }
    key
}

/// Prefix matching every composite key that starts with `parts`
pub fn prefix_key(parts: &[&[u8]]) -> Vec<u8> {
    compose_key(parts)
}

/// Split a composite key back into its parts
pub fn key_parts(key: &[u8]) -> Result<Vec<&[u8]>> {
    let mut parts = Vec::new();
    let mut rest = key;

    while !rest.is_empty() {
        if rest.len() < PART_LEN {
            return Err(Error::Storage("truncated key part header".to_string()));
        }
        let (header, tail) = rest.split_at(PART_LEN);
        let mut len = [0u8; PART_LEN];
        len.copy_from_slice(header);
        let len = u32::from_be_bytes(len) as usize;

        if tail.len() < len {
            return Err(Error::Storage("truncated key part".to_string()));
        }
        let (part, tail) = tail.split_at(len);
        parts.push(part);
        rest = tail;
    }

    Ok(parts)
}

/// Last part of a composite key
pub fn last_part(key: &[u8]) -> Result<&[u8]> {
    key_parts(key)?
        .pop()
        .ok_or_else(|| Error::Storage("empty composite key".to_string()))
}

/// Read access shared by the store and open transactions
pub trait ReadView {
    /// Point lookup
    fn get(&self, cf: Cf, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, cf: Cf, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Point lookup decoded with bincode
    fn get_record<T: DeserializeOwned>(&self, cf: Cf, key: &[u8]) -> Result<Option<T>>
    where
        Self: Sized,
    {
        self.get(cf, key)?
            .map(|bytes| bincode::deserialize(&bytes).map_err(Error::from))
            .transpose()
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,

    /// Single-writer lock held by every open transaction
    writer: Mutex<()>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = Cf::ALL
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(cf.name(), cf.options()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            column_families = Cf::ALL.len(),
            "Opened RocksDB"
        );

        Ok(Self {
            db: Arc::new(db),
            writer: Mutex::new(()),
        })
    }

    /// Start a unit of work
    ///
    /// Blocks until no other transaction is open.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self, self.writer.lock())
    }

    fn cf_handle(&self, cf: Cf) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(cf.name())
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", cf.name())))
    }

    /// Write staged entries in one atomic batch
    pub(crate) fn write_staged(&self, staged: BTreeMap<(Cf, Vec<u8>), Option<Vec<u8>>>) -> Result<()> {
        let mut batch = WriteBatch::default();

        for ((cf, key), value) in staged {
            let handle = self.cf_handle(cf)?;
            match value {
                Some(value) => batch.put_cf(handle, key, value),
                None => batch.delete_cf(handle, key),
            }
        }

        self.db.write(batch)?;
        Ok(())
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_activities: self.approximate_count(Cf::Activities)?,
            total_users: self.approximate_count(Cf::Users)?,
            total_content: self.approximate_count(Cf::Content)?,
        })
    }

    fn approximate_count(&self, cf: Cf) -> Result<u64> {
        let handle = self.cf_handle(cf)?;
        let prop = self
            .db
            .property_int_value_cf(handle, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl ReadView for Storage {
    fn get(&self, cf: Cf, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.cf_handle(cf)?;
        Ok(self.db.get_cf(handle, key)?)
    }

    fn scan_prefix(&self, cf: Cf, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.cf_handle(cf)?;
        let iter = self
            .db
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }

        Ok(entries)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish_non_exhaustive()
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate ledger rows
    pub total_activities: u64,
    /// Approximate users
    pub total_users: u64,
    /// Approximate content records
    pub total_content: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        for cf in Cf::ALL {
            assert!(storage.db.cf_handle(cf.name()).is_some());
        }
    }

    #[test]
    fn test_compose_key() {
        assert_eq!(compose_key(&[b"ab", b"c"]), b"\0\0\0\x02ab\0\0\0\x01c".to_vec());
        assert!(compose_key(&[b"ab", b"c"]).starts_with(&prefix_key(&[b"ab"])));
        assert!(!compose_key(&[b"abc", b"d"]).starts_with(&prefix_key(&[b"ab"])));
        assert_eq!(
            key_parts(&compose_key(&[b"ab", b"", b"c"])).unwrap(),
            vec![&b"ab"[..], &b""[..], &b"c"[..]]
        );
        assert_eq!(last_part(&compose_key(&[b"ab", b"c"])).unwrap(), b"c");
    }

    #[test]
    fn test_nul_in_parts_does_not_collide() {
        let left = compose_key(&[b"a\0b", b"c"]);
        let right = compose_key(&[b"a", b"b\0c"]);
        assert_ne!(left, right);
        assert!(!right.starts_with(&prefix_key(&[b"a\0b"])));
        assert!(key_parts(&left[..left.len() - 1]).is_err());
    }

    #[test]
    fn test_scan_prefix_stops_at_prefix_end() {
        let (storage, _temp) = test_storage();

        let mut tx = storage.begin();
        tx.put(Cf::ContentChildren, compose_key(&[b"q1", b"a1"]), vec![]);
        tx.put(Cf::ContentChildren, compose_key(&[b"q1", b"a2"]), vec![]);
        tx.put(Cf::ContentChildren, compose_key(&[b"q2", b"a3"]), vec![]);
        tx.commit().unwrap();

        let children = storage.scan_prefix(Cf::ContentChildren, &prefix_key(&[b"q1"])).unwrap();
        assert_eq!(children.len(), 2);

        let everything = storage.scan_prefix(Cf::ContentChildren, &[]).unwrap();
        assert_eq!(everything.len(), 3);
    }
}
