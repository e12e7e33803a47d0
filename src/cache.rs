use crate::store::{RedisStore, NOT_FOUND_SENTINEL};
use axum::body::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

const MAX_CACHE_ENTRIES: usize = 10_000;
const MAX_CACHE_BYTES: usize = 64 * 1024 * 1024;
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Result of a cache lookup that hit a live entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached<T> {
    Hit(T),
    /// A previous lookup found nothing upstream.
    NotFound,
}

/// Values the cache can hold: weighed for the in-process budget and encoded for Redis.
pub trait CacheValue: Clone + Send + Sync {
    fn encode(&self) -> Vec<u8>;
    fn decode(raw: &[u8]) -> Option<Self>;
    fn weight(&self) -> usize;
}

impl CacheValue for Bytes {
    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        Some(Bytes::copy_from_slice(raw))
    }

    fn weight(&self) -> usize {
        self.len()
    }
}

impl CacheValue for i64 {
    fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        std::str::from_utf8(raw).ok()?.trim().parse().ok()
    }

    fn weight(&self) -> usize {
        std::mem::size_of::<i64>()
    }
}

fn decode_stored<T: CacheValue>(raw: &[u8]) -> Option<Cached<T>> {
    if raw == NOT_FOUND_SENTINEL {
        return Some(Cached::NotFound);
    }
    T::decode(raw).map(Cached::Hit)
}

struct CacheEntry<T> {
    value: Option<T>,
    weight: usize,
    expires_at: Instant,
}

struct Entries<T> {
    map: HashMap<String, CacheEntry<T>>,
    bytes: usize,
}

impl<T> Entries<T> {
    fn remove(&mut self, key: &str) {
        if let Some(old) = self.map.remove(key) {
            self.bytes -= old.weight;
        }
    }

    fn insert(&mut self, key: String, entry: CacheEntry<T>) {
        self.bytes += entry.weight;
        if let Some(old) = self.map.insert(key, entry) {
            self.bytes -= old.weight;
        }
    }

    fn drop_expired(&mut self, now: Instant) {
        self.map.retain(|_, e| e.expires_at > now);
        self.bytes = self.map.values().map(|e| e.weight).sum();
    }

    fn evict_soonest_expiring(&mut self) -> bool {
        let soonest = self
            .map
            .iter()
            .min_by_key(|(_, e)| e.expires_at)
            .map(|(k, _)| k.clone());
        match soonest {
            Some(key) => {
                self.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// TTL cache with negative entries. Reads and writes go to Redis when a store is
/// attached; the in-process map serves when there is none or a command fails.
pub struct TtlCache<T> {
    entries: Mutex<Entries<T>>,
    max_entries: usize,
    max_bytes: usize,
    redis: Option<RedisStore>,
}

impl<T: CacheValue> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(MAX_CACHE_ENTRIES, MAX_CACHE_BYTES)
    }
}

impl<T: CacheValue> TtlCache<T> {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                bytes: 0,
            }),
            max_entries,
            max_bytes,
            redis: None,
        }
    }

    pub fn with_redis(mut self, store: Option<RedisStore>) -> Self {
        self.redis = store;
        self
    }

    pub async fn get(&self, key: &str) -> Option<Cached<T>> {
        if let Some(store) = &self.redis {
            match store.get(key).await {
                Ok(Some(raw)) => match decode_stored(&raw) {
                    Some(cached) => return Some(cached),
                    None => warn!("Discarding undecodable cache value for {}", key),
                },
                Ok(None) => {}
                Err(e) => error!("Redis read error: {:#}", e),
            }
        }
        self.get_local(key).await
    }

    pub async fn put(&self, key: &str, value: T, ttl: Duration) {
        if self.redis.is_some() && self.store_remote(key, &value.encode(), ttl).await {
            return;
        }
        self.insert(key, Some(value), ttl).await;
    }

    pub async fn put_not_found(&self, key: &str, ttl: Duration) {
        if self.store_remote(key, NOT_FOUND_SENTINEL, ttl).await {
            return;
        }
        self.insert(key, None, ttl).await;
    }

    /// Entries held in process.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn bytes(&self) -> usize {
        self.entries.lock().await.bytes
    }

    async fn store_remote(&self, key: &str, raw: &[u8], ttl: Duration) -> bool {
        let Some(store) = &self.redis else {
            return false;
        };
        match store.set_ex(key, raw, ttl).await {
            Ok(()) => true,
            Err(e) => {
                error!("Redis write error: {:#}", e);
                false
            }
        }
    }

    async fn get_local(&self, key: &str) -> Option<Cached<T>> {
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        let live = match guard.map.get(key) {
            Some(entry) if entry.expires_at > now => Some(match &entry.value {
                Some(v) => Cached::Hit(v.clone()),
                None => Cached::NotFound,
            }),
            Some(_) => None,
            None => return None,
        };
        if live.is_none() {
            guard.remove(key);
        }
        live
    }

    async fn insert(&self, key: &str, value: Option<T>, ttl: Duration) {
        let now = Instant::now();
        let weight = value.as_ref().map_or(0, T::weight);
        let mut guard = self.entries.lock().await;
        guard.remove(key);
        if weight > self.max_bytes {
            debug!("Not caching {}: {} bytes over the cache budget", key, weight);
            return;
        }

        let over = |e: &Entries<T>| {
            e.map.len() >= self.max_entries || e.bytes + weight > self.max_bytes
        };
        if over(&*guard) {
            guard.drop_expired(now);
        }
        while over(&*guard) && guard.evict_soonest_expiring() {}

        guard.insert(
            key.to_string(),
            CacheEntry {
                value,
                weight,
                expires_at: now.checked_add(ttl).unwrap_or(now + MAX_TTL),
            },
        );
    }
}
