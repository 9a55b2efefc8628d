//! In-process store backend.
//!
//! Entries expire lazily: a read that finds an entry past its deadline treats
//! it as absent and drops it. Every operation holds the write lock for its
//! whole read-modify-write, which is what makes `incr_with_expiry` and
//! `compare_and_swap` atomic here. Once the map grows past a threshold, the
//! next write sweeps out everything already expired.

use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::error::StoreError;
use crate::utils::Clock;

const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<u64>,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn deadline(&self, ttl_ms: Option<u64>) -> Option<u64> {
        ttl_ms.map(|ttl| self.clock.now_ms().saturating_add(ttl))
    }

    pub async fn len(&self) -> usize {
        let now = self.clock.now_ms();
        let entries = self.entries.read().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }
}

fn sweep_if_large(entries: &mut HashMap<String, Entry>, now: u64) {
    if entries.len() < SWEEP_THRESHOLD {
        return;
    }
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    debug!("Swept {} expired store entries", before - entries.len());
}

fn live_value<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: u64,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        Ok(live_value(&mut entries, key, now).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl_ms: Option<u64>) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let expires_at = self.deadline(ttl_ms);
        let mut entries = self.entries.write().await;
        sweep_if_large(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        let expires_at = self.deadline(ttl_ms);
        let mut entries = self.entries.write().await;

        let current = live_value(&mut entries, key, now).map(|entry| entry.value.as_slice());
        if current != expected {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn incr_with_expiry(&self, key: &str, ttl_ms: u64) -> Result<i64, StoreError> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write().await;

        match live_value(&mut entries, key, now) {
            Some(entry) => {
                let current: i64 = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|text| text.parse().ok())
                    .ok_or_else(|| {
                        StoreError::Protocol(format!("value at {} is not an integer", key))
                    })?;
                let next = current + 1;
                entry.value = next.to_string().into_bytes();
                if entry.expires_at.is_none() {
                    entry.expires_at = Some(now.saturating_add(ttl_ms));
                }
                Ok(next)
            }
            None => {
                sweep_if_large(&mut entries, now);
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: b"1".to_vec(),
                        expires_at: Some(now.saturating_add(ttl_ms)),
                    },
                );
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    fn store_with_clock() -> (InMemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let store = InMemoryStore::new(clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_set_get_with_expiry() {
        let (store, clock) = store_with_clock();

        store.set("k", b"v", Some(1_000)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        clock.advance(999);
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(1);
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_without_ttl_persists() {
        let (store, clock) = store_with_clock();
        store.set("k", b"v", None).await.unwrap();
        clock.advance(u32::MAX as u64);
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let (store, _clock) = store_with_clock();

        assert!(store.compare_and_swap("k", None, b"a", None).await.unwrap());
        assert!(!store.compare_and_swap("k", None, b"b", None).await.unwrap());
        assert!(!store
            .compare_and_swap("k", Some(&b"x"[..]), b"b", None)
            .await
            .unwrap());
        assert!(store
            .compare_and_swap("k", Some(&b"a"[..]), b"b", None)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_swap_treats_expired_as_absent() {
        let (store, clock) = store_with_clock();
        store.set("k", b"a", Some(100)).await.unwrap();
        clock.advance(100);
        assert!(store.compare_and_swap("k", None, b"b", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_arms_expiry_once() {
        let (store, clock) = store_with_clock();

        assert_eq!(store.incr_with_expiry("c", 60_000).await.unwrap(), 1);
        clock.advance(30_000);
        assert_eq!(store.incr_with_expiry("c", 60_000).await.unwrap(), 2);
        assert_eq!(store.incr_with_expiry("c", 60_000).await.unwrap(), 3);

        // Later increments do not push the window out
        clock.advance(30_000);
        assert_eq!(store.incr_with_expiry("c", 60_000).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_rearms_counter_without_expiry() {
        let (store, clock) = store_with_clock();
        store.set("c", b"41", None).await.unwrap();

        assert_eq!(store.incr_with_expiry("c", 1_000).await.unwrap(), 42);
        clock.advance(1_000);
        assert!(store.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let (store, _clock) = store_with_clock();
        store.set("c", b"nope", None).await.unwrap();
        assert!(matches!(
            store.incr_with_expiry("c", 1_000).await,
            Err(StoreError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_len_ignores_expired() {
        let (store, clock) = store_with_clock();
        store.set("a", b"1", Some(10)).await.unwrap();
        store.set("b", b"1", None).await.unwrap();
        assert_eq!(store.len().await, 2);

        clock.advance(10);
        assert_eq!(store.len().await, 1);
    }
}
