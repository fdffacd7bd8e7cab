use crate::domain::event::LogEntry;
use crate::domain::ports::{BlobBackend, RecordStore};
use crate::domain::verification::{VerificationId, VerificationRequest};
use crate::error::{Result, VerificationError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Records {
    logs: HashMap<VerificationId, Vec<LogEntry>>,
    snapshots: HashMap<VerificationId, VerificationRequest>,
}

/// A thread-safe in-memory record store.
///
/// Logs and snapshots sit behind a single `RwLock`, so a commit is atomic.
/// Ideal for testing or runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn commit(&self, snapshot: &VerificationRequest, entries: &[LogEntry]) -> Result<()> {
        let mut records = self.records.write().await;
        let log = records.logs.entry(snapshot.id).or_default();

        let mut next = log.last().map_or(1, |last| last.sequence + 1);
        for entry in entries {
            if entry.sequence != next {
                return Err(VerificationError::Storage(format!(
                    "verification {}: append of sequence {} conflicts with log at {}",
                    snapshot.id,
                    entry.sequence,
                    next - 1
                )));
            }
            next += 1;
        }

        log.extend(entries.iter().cloned());
        records.snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn history(&self, id: VerificationId) -> Result<Vec<LogEntry>> {
        let records = self.records.read().await;
        Ok(records.logs.get(&id).cloned().unwrap_or_default())
    }

    async fn snapshot(&self, id: VerificationId) -> Result<Option<VerificationRequest>> {
        let records = self.records.read().await;
        Ok(records.snapshots.get(&id).cloned())
    }

    async fn snapshots(&self) -> Result<Vec<VerificationRequest>> {
        let records = self.records.read().await;
        Ok(records.snapshots.values().cloned().collect())
    }
}

/// Keeps uploaded bytes in memory, keyed by content digest.
#[derive(Default, Clone)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(key).cloned()
    }
}

#[async_trait]
impl BlobBackend for InMemoryBlobStore {
    async fn put(&self, key: &str, _media_type: &str, bytes: &[u8]) -> Result<String> {
        let mut blobs = self.blobs.write().await;
        blobs
            .entry(key.to_string())
            .or_insert_with(|| bytes.to_vec());
        Ok(format!("mem://sha256/{key}"))
    }
}
