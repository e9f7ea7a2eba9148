//! # Storage Locks
//!
//! Named, leased locks over store keys. A lock is owned by the handle that
//! acquired it: only that handle's `unlock` releases it, `force_unlock`
//! releases it for anyone. A lease bounds how long a crashed or stuck holder
//! can keep others out.

use crate::constants::locks::RETRY_INTERVAL;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;
use uuid::Uuid;

#[async_trait]
pub trait StorageLock: Send + Sync {
    /// The store key this lock guards
    fn key(&self) -> &str;

    /// Acquire, waiting as long as it takes. Held until unlocked or until
    /// `lease` elapses.
    async fn lock(&self, lease: Option<Duration>);

    /// Acquire only if free right now
    fn try_lock(&self, lease: Option<Duration>) -> bool;

    /// Acquire, giving up after `wait`
    async fn try_lock_for(&self, wait: Duration, lease: Option<Duration>) -> bool;

    /// Whether anyone currently holds the lock
    fn is_locked(&self) -> bool;

    /// Release if this handle holds the lock, returning whether it did
    fn unlock(&self) -> bool;

    /// Release regardless of the holder
    fn force_unlock(&self);
}

#[derive(Debug, Clone, Copy)]
struct Holder {
    owner: Uuid,
    expires_at: Option<Instant>,
}

impl Holder {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Lock holders for one store, keyed by storage key
#[derive(Debug, Default)]
pub struct LockTable {
    holders: DashMap<String, Holder>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh handle on `key` with its own owner identity
    pub fn handle(self: &Arc<Self>, key: impl Into<String>) -> LeaseLock {
        LeaseLock {
            key: key.into(),
            owner: Uuid::new_v4(),
            table: Arc::clone(self),
        }
    }

    fn try_acquire(&self, key: &str, owner: Uuid, lease: Option<Duration>) -> bool {
        let now = Instant::now();
        let holder = Holder {
            owner,
            expires_at: lease.map(|lease| now + lease),
        };
        match self.holders.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                // Re-acquiring refreshes the lease
                if current.owner == owner || !current.is_live(now) {
                    entry.insert(holder);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(holder);
                true
            }
        }
    }

    fn is_locked(&self, key: &str) -> bool {
        let now = Instant::now();
        self.holders
            .get(key)
            .map_or(false, |holder| holder.is_live(now))
    }

    fn release(&self, key: &str, owner: Uuid) -> bool {
        self.holders
            .remove_if(key, |_, holder| holder.owner == owner)
            .is_some()
    }

    fn force_release(&self, key: &str) {
        self.holders.remove(key);
    }

    pub fn clear(&self) {
        self.holders.clear();
    }
}

/// In-process [`StorageLock`] backed by a shared [`LockTable`]
#[derive(Debug, Clone)]
pub struct LeaseLock {
    key: String,
    owner: Uuid,
    table: Arc<LockTable>,
}

#[async_trait]
impl StorageLock for LeaseLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn lock(&self, lease: Option<Duration>) {
        while !self.try_lock(lease) {
            sleep(RETRY_INTERVAL).await;
        }
    }

    fn try_lock(&self, lease: Option<Duration>) -> bool {
        let acquired = self.table.try_acquire(&self.key, self.owner, lease);
        trace!(key = %self.key, acquired, "Storage lock attempt");
        acquired
    }

    async fn try_lock_for(&self, wait: Duration, lease: Option<Duration>) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            if self.try_lock(lease) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(RETRY_INTERVAL.min(deadline - now)).await;
        }
    }

    fn is_locked(&self) -> bool {
        self.table.is_locked(&self.key)
    }

    fn unlock(&self) -> bool {
        self.table.release(&self.key, self.owner)
    }

    fn force_unlock(&self) {
        self.table.force_release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_locks_are_independent_per_key() {
        let table = Arc::new(LockTable::new());
        let status = table.handle("Q:1");
        let task = table.handle("T:1");

        assert!(!status.is_locked());
        status.lock(None).await;
        assert!(status.is_locked());
        assert!(!task.is_locked());

        task.lock(None).await;
        assert!(status.unlock());
        assert!(!status.is_locked());
        assert!(task.is_locked());
    }

    #[tokio::test]
    async fn test_only_owner_unlocks() {
        let table = Arc::new(LockTable::new());
        let holder = table.handle("Q:1");
        let other = table.handle("Q:1");

        assert!(holder.try_lock(None));
        assert!(!other.try_lock(None));
        assert!(!other.unlock());
        assert!(holder.is_locked());

        other.force_unlock();
        assert!(!holder.is_locked());
        assert!(other.try_lock(None));
        assert!(!holder.unlock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_frees_lock() {
        let table = Arc::new(LockTable::new());
        let stuck = table.handle("S:1");
        let waiter = table.handle("S:1");

        assert!(stuck.try_lock(Some(Duration::from_millis(100))));
        assert!(!waiter.try_lock_for(Duration::from_millis(50), None).await);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!stuck.is_locked());
        assert!(waiter.try_lock(None));
        assert!(!stuck.unlock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_waits_for_release() {
        let table = Arc::new(LockTable::new());
        let first = table.handle("T:1");
        let second = table.handle("T:1");
        first.lock(None).await;

        let waiter = tokio::spawn(async move {
            second.lock(None).await;
            second
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(first.unlock());
        let second = waiter.await.unwrap();
        assert!(second.is_locked());
        assert!(second.unlock());
    }
}
