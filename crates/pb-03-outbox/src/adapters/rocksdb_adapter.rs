//! # RocksDB Outbox Store
//!
//! Durable [`OutboxStore`]. A commit is a single RocksDB `WriteBatch`
//! spanning every column family it touches, so state rows and outbox rows
//! land together.
//!
//! ## Column Families
//!
//! - `state` - caller state rows, JSON values keyed by caller key
//! - `outbox` - entries keyed by big-endian `seq`
//! - `outbox_pending` - `seq` keys of entries with no `published_at`
//! - `outbox_ids` - entry id to `seq`
//! - `metadata` - the sequence counter

use crate::domain::entry::{OutboxEntry, UnpublishedStats, WriteBatch};
use crate::domain::errors::StoreError;
use crate::ports::outbound::OutboxStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteOptions, DB};
use serde_json::Value;

pub const CF_STATE: &str = "state";
pub const CF_OUTBOX: &str = "outbox";
pub const CF_PENDING: &str = "outbox_pending";
pub const CF_IDS: &str = "outbox_ids";
pub const CF_METADATA: &str = "metadata";

pub const COLUMN_FAMILIES: &[&str] = &[CF_STATE, CF_OUTBOX, CF_PENDING, CF_IDS, CF_METADATA];

const NEXT_SEQ_KEY: &[u8] = b"next_seq";

#[derive(Debug, Clone)]
pub struct RocksDbOutboxConfig {
    pub path: String,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync every commit (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbOutboxConfig {
    fn default() -> Self {
        Self {
            path: "./data/outbox".to_string(),
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbOutboxConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbOutboxStore {
    db: DB,
    config: RocksDbOutboxConfig,
    /// Serializes sequence allocation and read-modify-write of entries.
    write_lock: Mutex<()>,
}

fn io(context: &str, e: rocksdb::Error) -> StoreError {
    StoreError::Io {
        message: format!("{context}: {e}"),
    }
}

fn decode_seq(key: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StoreError::Corrupt {
        key: format!("{key:?}"),
        message: "sequence key is not 8 bytes".into(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

impl RocksDbOutboxStore {
    pub fn open(config: RocksDbOutboxConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| io("failed to open RocksDB", e))?;

        Ok(Self {
            db,
            config,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| StoreError::Io {
            message: format!("missing column family {name}"),
        })
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn next_seq(&self) -> Result<u64, StoreError> {
        let raw = self
            .db
            .get_cf(self.cf(CF_METADATA)?, NEXT_SEQ_KEY)
            .map_err(|e| io("read sequence", e))?;
        match raw {
            Some(bytes) => decode_seq(&bytes),
            None => Ok(1),
        }
    }

    fn entry_by_seq(&self, seq: u64) -> Result<Option<OutboxEntry>, StoreError> {
        let raw = self
            .db
            .get_cf(self.cf(CF_OUTBOX)?, seq.to_be_bytes())
            .map_err(|e| io("read entry", e))?;
        raw.map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn seq_for(&self, id: &str) -> Result<Option<u64>, StoreError> {
        let raw = self
            .db
            .get_cf(self.cf(CF_IDS)?, id.as_bytes())
            .map_err(|e| io("read id index", e))?;
        raw.map(|bytes| decode_seq(&bytes)).transpose()
    }

    fn require_entry(&self, id: &str) -> Result<OutboxEntry, StoreError> {
        let seq = self
            .seq_for(id)?
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))?;
        self.entry_by_seq(seq)?
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))
    }

    fn pending_seqs(&self, limit: usize) -> Result<Vec<u64>, StoreError> {
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_PENDING)?, IteratorMode::Start) {
            if out.len() >= limit {
                break;
            }
            let (key, _) = item.map_err(|e| io("scan pending", e))?;
            out.push(decode_seq(&key)?);
        }
        Ok(out)
    }
}

impl OutboxStore for RocksDbOutboxStore {
    fn commit(&self, batch: WriteBatch) -> Result<Vec<OutboxEntry>, StoreError> {
        let _guard = self.write_lock.lock();
        let (state, events) = batch.into_parts();
        let mut write = rocksdb::WriteBatch::default();

        for row in state {
            write.put_cf(self.cf(CF_STATE)?, row.key.as_bytes(), serde_json::to_vec(&row.value)?);
        }

        let mut seq = self.next_seq()?;
        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            let entry = OutboxEntry::from_event(seq, event);
            let key = seq.to_be_bytes();
            write.put_cf(self.cf(CF_OUTBOX)?, key, serde_json::to_vec(&entry)?);
            write.put_cf(self.cf(CF_PENDING)?, key, b"");
            write.put_cf(self.cf(CF_IDS)?, entry.id.as_bytes(), key);
            committed.push(entry);
            seq += 1;
        }
        write.put_cf(self.cf(CF_METADATA)?, NEXT_SEQ_KEY, seq.to_be_bytes());

        self.db
            .write_opt(write, &self.write_opts())
            .map_err(|e| io("batch write", e))?;
        Ok(committed)
    }

    fn get_state(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw = self
            .db
            .get_cf(self.cf(CF_STATE)?, key.as_bytes())
            .map_err(|e| io("read state", e))?;
        raw.map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn get_entry(&self, id: &str) -> Result<Option<OutboxEntry>, StoreError> {
        match self.seq_for(id)? {
            Some(seq) => self.entry_by_seq(seq),
            None => Ok(None),
        }
    }

    fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        let mut out = Vec::new();
        for seq in self.pending_seqs(limit)? {
            if let Some(entry) = self.entry_by_seq(seq)? {
                out.push(entry);
            }
        }
        Ok(out)
    }

    fn mark_published(&self, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock();
        let mut entry = self.require_entry(id)?;
        if entry.published_at.is_some() {
            return Ok(false);
        }
        entry.published_at = Some(at);

        let key = entry.seq.to_be_bytes();
        let mut write = rocksdb::WriteBatch::default();
        write.put_cf(self.cf(CF_OUTBOX)?, key, serde_json::to_vec(&entry)?);
        write.delete_cf(self.cf(CF_PENDING)?, key);
        self.db
            .write_opt(write, &self.write_opts())
            .map_err(|e| io("mark published", e))?;
        Ok(true)
    }

    fn record_failure(&self, id: &str, error: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut entry = self.require_entry(id)?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        self.db
            .put_cf_opt(
                self.cf(CF_OUTBOX)?,
                entry.seq.to_be_bytes(),
                serde_json::to_vec(&entry)?,
                &self.write_opts(),
            )
            .map_err(|e| io("record failure", e))
    }

    fn unpublished_stats(&self) -> Result<UnpublishedStats, StoreError> {
        let pending = self.pending_seqs(usize::MAX)?;
        let oldest_created_at = match pending.first() {
            Some(seq) => self.entry_by_seq(*seq)?.map(|e| e.created_at),
            None => None,
        };
        Ok(UnpublishedStats {
            count: pending.len() as u64,
            oldest_created_at,
        })
    }
}
