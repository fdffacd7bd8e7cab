use crate::domain::event::LogEntry;
use crate::domain::ports::RecordStore;
use crate::domain::verification::{VerificationId, VerificationRequest};
use crate::error::{Result, VerificationError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column Family for request snapshots, keyed by request id.
pub const CF_REQUESTS: &str = "requests";
/// Column Family for event logs, keyed by request id followed by the
/// big-endian entry sequence.
pub const CF_EVENTS: &str = "events";

/// A persistent record store implementation using RocksDB.
///
/// A commit writes the new log entries and the snapshot in one `WriteBatch`,
/// so a crash never leaves a snapshot ahead of its log.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the `requests` and `events` column families if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_requests = ColumnFamilyDescriptor::new(CF_REQUESTS, Options::default());
        let cf_events = ColumnFamilyDescriptor::new(CF_EVENTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_requests, cf_events])
            .map_err(storage)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VerificationError::Storage(format!("column family `{name}` not found")))
    }
}

fn storage(e: rocksdb::Error) -> VerificationError {
    VerificationError::Storage(format!("RocksDB error: {e}"))
}

fn event_key(id: VerificationId, sequence: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(id.as_bytes());
    key[16..].copy_from_slice(&sequence.to_be_bytes());
    key
}

#[async_trait]
impl RecordStore for RocksDBStore {
    async fn commit(&self, snapshot: &VerificationRequest, entries: &[LogEntry]) -> Result<()> {
        let events = self.cf(CF_EVENTS)?;
        let requests = self.cf(CF_REQUESTS)?;

        let mut batch = WriteBatch::default();
        for entry in entries {
            let key = event_key(snapshot.id, entry.sequence);
            if self.db.get_pinned_cf(events, key).map_err(storage)?.is_some() {
                return Err(VerificationError::Storage(format!(
                    "verification {}: log entry {} already exists",
                    snapshot.id, entry.sequence
                )));
            }
            batch.put_cf(events, key, serde_json::to_vec(entry)?);
        }
        batch.put_cf(requests, snapshot.id.as_bytes(), serde_json::to_vec(snapshot)?);

        self.db.write(batch).map_err(storage)
    }

    async fn history(&self, id: VerificationId) -> Result<Vec<LogEntry>> {
        let events = self.cf(CF_EVENTS)?;
        let prefix: &[u8] = id.as_bytes();

        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(events, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(storage)?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    async fn snapshot(&self, id: VerificationId) -> Result<Option<VerificationRequest>> {
        let requests = self.cf(CF_REQUESTS)?;
        match self.db.get_cf(requests, id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn snapshots(&self) -> Result<Vec<VerificationRequest>> {
        let requests = self.cf(CF_REQUESTS)?;

        let mut snapshots = Vec::new();
        for item in self.db.iterator_cf(requests, IteratorMode::Start) {
            let (_key, value) = item.map_err(storage)?;
            snapshots.push(serde_json::from_slice(&value)?);
        }
        Ok(snapshots)
    }
}
