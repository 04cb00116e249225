use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tokio::sync::{Mutex, OwnedMutexGuard};

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// A set of async locks, one per key.
/// Holding the lock of one key never blocks another key.
pub struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Waits until the lock for the key is free, and holds it until the guard is dropped
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        // The map guard must be dropped before awaiting
        let mutex = self.locks.entry(key.clone()).or_default().clone();

        mutex.lock_owned().await
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn test_random_string_length() {
        let value = random_string(32);

        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_keyed_locks_are_independent() {
        let locks = KeyedLocks::new();
        let _first = locks.lock(&"a").await;

        // A different key is available right away
        let other = timeout(Duration::from_millis(50), locks.lock(&"b")).await;
        assert!(other.is_ok());

        // The same key is not
        let same = timeout(Duration::from_millis(50), locks.lock(&"a")).await;
        assert!(same.is_err());
    }
}
