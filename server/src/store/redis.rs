//! Redis-compatible store backend.
//!
//! Commands share one multiplexed [`ConnectionManager`], opened on first use
//! and reconnected by the client library after a drop. Every call is bounded
//! by the configured timeout. A connect failure, timeout or dropped
//! connection surfaces as `StoreError::Unavailable`; an error reply or an
//! unexpected reply type as `StoreError::Protocol`. Nothing is retried here.
//!
//! The conditional write and the counter are server-side Lua scripts, so each
//! runs as one atomic step on the store.

use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::Script;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::SessionStore;
use crate::error::StoreError;

const COMPARE_AND_SWAP_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
  if current then return 0 end
elseif current ~= ARGV[2] then
  return 0
end
if ARGV[4] == '0' then
  redis.call('SET', KEYS[1], ARGV[3])
else
  redis.call('SET', KEYS[1], ARGV[3], 'PX', ARGV[4])
end
return 1
"#;

const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) == -1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    cas_script: Script,
    counter_script: Script,
    timeout: Duration,
}

impl RedisStore {
    /// Accepts `redis://[[user]:password@]host[:port][/db]`. Does not connect.
    pub fn from_url(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        if !url.starts_with("redis://") {
            return Err(StoreError::Protocol(format!("not a redis url: {}", url)));
        }
        let client = redis::Client::open(url)
            .map_err(|err| StoreError::Protocol(format!("invalid redis url: {}", err)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            cas_script: Script::new(COMPARE_AND_SWAP_SCRIPT),
            counter_script: Script::new(INCR_WITH_EXPIRY_SCRIPT),
            timeout,
        })
    }

    pub fn addr(&self) -> String {
        self.client.get_connection_info().addr.to_string()
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                info!("Connected to store at {}", self.addr());
                Ok::<_, StoreError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "no reply from {} within {}ms",
                self.addr(),
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl_ms: Option<u64>) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(ttl) = ttl_ms {
                cmd.arg("PX").arg(ttl.max(1));
            }
            let _: () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError> {
        let expect_absent = if expected.is_none() { "1" } else { "0" };
        let ttl = ttl_ms.map_or(0, |ttl| ttl.max(1));

        self.bounded(async {
            let mut conn = self.connection().await?;
            let swapped: i64 = self
                .cas_script
                .key(key)
                .arg(expect_absent)
                .arg(expected.unwrap_or_default())
                .arg(value)
                .arg(ttl)
                .invoke_async(&mut conn)
                .await?;
            Ok(swapped == 1)
        })
        .await
    }

    async fn incr_with_expiry(&self, key: &str, ttl_ms: u64) -> Result<i64, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let count: i64 = self
                .counter_script
                .key(key)
                .arg(ttl_ms.max(1))
                .invoke_async(&mut conn)
                .await?;
            Ok(count)
        })
        .await
    }
}
