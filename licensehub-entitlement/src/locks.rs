//! Per-license async locks.
//!
//! Requests for different licenses never contend; requests for the same
//! license queue in arrival order on a `tokio::sync::Mutex`.

use licensehub_types::LicenseKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<LicenseKey, Arc<TokioMutex<()>>>>,
}

impl KeyLocks {
    /// Waits for exclusive access to `key`. Access ends when the guard drops.
    pub(crate) async fn acquire(&self, key: &LicenseKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only referenced by the map are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> LicenseKey {
        LicenseKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn idle_entries_are_dropped() {
        let locks = KeyLocks::default();
        let a = key("AAAA-AAAA-AAAA-AAAA");
        let b = key("BBBB-BBBB-BBBB-BBBB");

        let guard = locks.acquire(&a).await;
        drop(guard);
        let _held = locks.acquire(&b).await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::default());
        let a = key("AAAA-AAAA-AAAA-AAAA");

        let guard = locks.acquire(&a).await;
        let pending = {
            let locks = Arc::clone(&locks);
            let a = a.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&a).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        drop(guard);
        pending.await.unwrap();
    }
}
