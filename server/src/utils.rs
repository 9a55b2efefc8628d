use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

// Source of "now" in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        shared::get_timestamp()
    }
}

// Hand-driven clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// Salted hex SHA-256 of a client identity (fingerprint or network origin)
pub fn hash_identity(salt: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashed identities of the caller, as seen by one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub fingerprint_hash: Option<String>,
    pub origin_hash: Option<String>,
}

impl ClientContext {
    pub fn new(salt: &str, fingerprint: Option<&str>, origin: Option<&str>) -> Self {
        let hash = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| hash_identity(salt, v))
        };
        Self {
            fingerprint_hash: hash(fingerprint),
            origin_hash: hash(origin),
        }
    }
}
