//! Shared Redis store behind the poster caches.
use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::FromRedisValue;
use std::time::Duration;
use tracing::{error, info, warn};

/// Stored in place of a value when the upstream lookup found nothing.
pub const NOT_FOUND_SENTINEL: &[u8] = b"__NOT_FOUND__";

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Single connection attempt, verified with `PING`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid REDIS_URL")?;
        let conn = tokio::time::timeout(COMMAND_TIMEOUT, client.get_multiplexed_async_connection())
            .await
            .context("Redis connection timed out")?
            .context("Redis connection failed")?;
        let store = Self { conn };
        store.ping().await?;
        Ok(store)
    }

    /// Retries a few times on startup; `None` means callers cache in process.
    pub async fn connect_with_retries(url: &str) -> Option<Self> {
        for attempt in 1..=CONNECT_ATTEMPTS {
            match Self::connect(url).await {
                Ok(store) => {
                    info!("Connected to Redis");
                    return Some(store);
                }
                Err(e) => {
                    warn!(
                        "Redis connection attempt {}/{} failed: {:#}",
                        attempt, CONNECT_ATTEMPTS, e
                    );
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }
        error!(
            "Could not connect to Redis after {} attempts, caching in process",
            CONNECT_ATTEMPTS
        );
        None
    }

    pub async fn ping(&self) -> Result<()> {
        let _: String = self
            .run(&redis::cmd("PING"))
            .await
            .context("Redis PING failed")?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.run(redis::cmd("GET").arg(key))
            .await
            .context("Redis GET failed")
    }

    /// `SET key value EX ttl`, with the expiry rounded down to whole seconds (min 1).
    pub async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let _: () = self
            .run(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl.as_secs().max(1)),
            )
            .await
            .context("Redis SET failed")?;
        Ok(())
    }

    async fn run<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T> {
        let mut conn = self.conn.clone();
        let reply = tokio::time::timeout(COMMAND_TIMEOUT, cmd.query_async(&mut conn))
            .await
            .context("Redis command timed out")?;
        Ok(reply?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_urls() {
        let err = RedisStore::connect("not a redis url").await.err();
        assert!(err.is_some());
    }

    #[tokio::test]
    async fn unreachable_server_fails_to_connect() {
        assert!(RedisStore::connect("redis://127.0.0.1:1/0").await.is_err());
    }
}
