//! Ranked top-N leaderboard persisted in the session store.
//!
//! The store holds the authoritative list as one JSON document. Updates are a
//! read-modify-write guarded by compare-and-swap, so concurrent submissions
//! never overwrite each other's entries. Reads also go to the store, so every
//! instance sharing it serves the same list. The in-process copy is loaded
//! once at startup, replaced after every successful read or write, and served
//! only while the store cannot be read.

use async_trait::async_trait;
use log::{debug, info, warn};
use shared::LeaderboardEntry;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ApiError, StoreError};
use crate::store::{keys, SessionStore};

const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Destination for verified scores.
#[async_trait]
pub trait LeaderboardGateway: Send + Sync {
    /// Inserts one verified entry and returns the updated top-N list.
    async fn record(&self, entry: LeaderboardEntry) -> Result<Vec<LeaderboardEntry>, ApiError>;

    /// Current top-N list. Never fails; a gateway may serve its last known
    /// list when the backing store is unavailable.
    async fn top(&self) -> Vec<LeaderboardEntry>;
}

/// Highest score first; equal scores keep the earlier submission ahead.
fn rank(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}

pub struct StoreLeaderboard {
    store: Arc<dyn SessionStore>,
    capacity: usize,
    cache: RwLock<Vec<LeaderboardEntry>>,
}

impl StoreLeaderboard {
    pub fn new(store: Arc<dyn SessionStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Fills the cache from the store. Called once before serving.
    pub async fn init(&self) -> Result<(), StoreError> {
        let (_, entries) = self.load().await?;
        info!("Loaded {} leaderboard entries", entries.len());
        *self.cache.write().await = entries;
        Ok(())
    }

    async fn load(&self) -> Result<(Option<Vec<u8>>, Vec<LeaderboardEntry>), StoreError> {
        let raw = self.store.get(keys::LEADERBOARD).await?;
        let entries = match &raw {
            Some(bytes) => serde_json::from_slice(bytes)?,
            None => Vec::new(),
        };
        Ok((raw, entries))
    }
}

#[async_trait]
impl LeaderboardGateway for StoreLeaderboard {
    async fn record(&self, entry: LeaderboardEntry) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let failed = |err| ApiError::storage("Failed to update leaderboard", err);

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (raw, mut entries) = self.load().await.map_err(failed)?;

            entries.push(entry.clone());
            entries.sort_by(rank);
            entries.truncate(self.capacity);

            let encoded = serde_json::to_vec(&entries).map_err(|err| failed(err.into()))?;
            let swapped = self
                .store
                .compare_and_swap(keys::LEADERBOARD, raw.as_deref(), &encoded, None)
                .await
                .map_err(failed)?;

            if swapped {
                *self.cache.write().await = entries.clone();
                return Ok(entries);
            }
            debug!("Leaderboard changed concurrently (attempt {})", attempt);
        }

        Err(ApiError::Storage {
            context: "Failed to update leaderboard",
            detail: format!("gave up after {} contended attempts", MAX_UPDATE_ATTEMPTS),
        })
    }

    async fn top(&self) -> Vec<LeaderboardEntry> {
        match self.load().await {
            Ok((_, entries)) => {
                *self.cache.write().await = entries.clone();
                entries
            }
            Err(err) => {
                warn!("Serving cached leaderboard, store read failed: {}", err);
                self.cache.read().await.clone()
            }
        }
    }
}
