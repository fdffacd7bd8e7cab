use crate::domain::verification::VerificationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<VerificationId, Arc<Mutex<()>>>;

/// One async mutex per verification request.
///
/// Commands on different requests run concurrently; commands on the same
/// request queue behind each other for the duration of the returned guard.
/// An entry lives only while some command holds or waits for it.
#[derive(Default)]
pub struct RequestLocks {
    locks: Arc<SyncMutex<LockMap>>,
}

/// Exclusive access to one request. Dropping it releases the request and
/// evicts its entry when no other command is queued on it.
pub struct RequestGuard {
    id: VerificationId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<SyncMutex<LockMap>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: VerificationId) -> RequestGuard {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone();
        RequestGuard {
            id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    /// Number of requests with a live entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own handle left: nobody holds or waits for it.
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_request_is_serialized() {
        let locks = Arc::new(RequestLocks::new());
        let id = VerificationId::new();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_other_requests_are_not_blocked() {
        let locks = RequestLocks::new();
        let _first = locks.acquire(VerificationId::new()).await;
        let second = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(VerificationId::new()),
        )
        .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_command_is_queued() {
        let locks = Arc::new(RequestLocks::new());
        let id = VerificationId::new();

        let first = locks.acquire(id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let guard = locks.acquire(id).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
                drop(guard);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entries_are_evicted_after_release() {
        let locks = RequestLocks::new();
        for _ in 0..100 {
            let _guard = locks.acquire(VerificationId::new()).await;
        }
        assert!(locks.is_empty());
    }
}
