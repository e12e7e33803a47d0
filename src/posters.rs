//! Poster lookup chain: cache, then TMDB, then Fanart.tv.
use crate::artwork::{ArtworkApi, MediaType};
use crate::cache::{Cached, TtlCache};
use crate::store::RedisStore;
use axum::body::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Cache,
    Tmdb,
    Fanart,
    None,
}

impl ImageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSource::Cache => "cache",
            ImageSource::Tmdb => "tmdb",
            ImageSource::Fanart => "fanart",
            ImageSource::None => "none",
        }
    }
}

pub struct PosterService {
    api: Arc<dyn ArtworkApi>,
    images: TtlCache<Bytes>,
    tvdb_ids: TtlCache<i64>,
    ttl: Duration,
    ttl_not_found: Duration,
    redis: Option<RedisStore>,
}

impl PosterService {
    pub fn new(api: Arc<dyn ArtworkApi>, ttl: Duration, ttl_not_found: Duration) -> Self {
        Self {
            api,
            images: TtlCache::default(),
            tvdb_ids: TtlCache::default(),
            ttl,
            ttl_not_found,
            redis: None,
        }
    }

    /// Shares both caches through Redis. `None` keeps them in process.
    pub fn with_redis(self, store: Option<RedisStore>) -> Self {
        Self {
            images: self.images.with_redis(store.clone()),
            tvdb_ids: self.tvdb_ids.with_redis(store.clone()),
            redis: store,
            ..self
        }
    }

    pub async fn redis_connected(&self) -> bool {
        match &self.redis {
            Some(store) => store.ping().await.is_ok(),
            None => false,
        }
    }

    pub fn tmdb_configured(&self) -> bool {
        self.api.tmdb_configured()
    }

    pub fn fanart_configured(&self) -> bool {
        self.api.fanart_configured()
    }

    pub async fn cached_images(&self) -> usize {
        self.images.len().await
    }

    pub async fn get_image(
        &self,
        media: MediaType,
        tmdb_id: &str,
    ) -> (Option<Bytes>, ImageSource) {
        let cache_key = format!("img:{}:{}", media.as_str(), tmdb_id);

        match self.images.get(&cache_key).await {
            Some(Cached::Hit(bytes)) => return (Some(bytes), ImageSource::Cache),
            Some(Cached::NotFound) => return (None, ImageSource::None),
            None => {}
        }

        let from_tmdb = match self.api.tmdb_poster(media, tmdb_id).await {
            Ok(found) => found,
            Err(e) => {
                error!("TMDB error for {}/{}: {:#}", media.as_str(), tmdb_id, e);
                None
            }
        };
        if let Some(bytes) = from_tmdb {
            self.images.put(&cache_key, bytes.clone(), self.ttl).await;
            return (Some(bytes), ImageSource::Tmdb);
        }

        if let Some(bytes) = self.fanart_fallback(media, tmdb_id).await {
            self.images.put(&cache_key, bytes.clone(), self.ttl).await;
            return (Some(bytes), ImageSource::Fanart);
        }

        self.images.put_not_found(&cache_key, self.ttl_not_found).await;
        (None, ImageSource::None)
    }

    async fn fanart_fallback(&self, media: MediaType, tmdb_id: &str) -> Option<Bytes> {
        if !self.api.fanart_configured() {
            return None;
        }
        let lookup_id = match media {
            MediaType::Movie => tmdb_id.to_string(),
            MediaType::Show => match self.tvdb_id(tmdb_id).await {
                Some(id) => id.to_string(),
                None => {
                    info!("Fanart: no TVDB ID for show {}", tmdb_id);
                    return None;
                }
            },
        };
        match self.api.fanart_poster(media, &lookup_id).await {
            Ok(found) => found,
            Err(e) => {
                error!("Fanart error for {}/{}: {:#}", media.as_str(), tmdb_id, e);
                None
            }
        }
    }

    async fn tvdb_id(&self, tmdb_id: &str) -> Option<i64> {
        let cache_key = format!("tvdb_id:{}", tmdb_id);
        match self.tvdb_ids.get(&cache_key).await {
            Some(Cached::Hit(id)) => return Some(id),
            Some(Cached::NotFound) => return None,
            None => {}
        }
        match self.api.tvdb_id(tmdb_id).await {
            Ok(Some(id)) => {
                self.tvdb_ids.put(&cache_key, id, self.ttl).await;
                Some(id)
            }
            Ok(None) => {
                self.tvdb_ids
                    .put_not_found(&cache_key, self.ttl_not_found)
                    .await;
                None
            }
            Err(e) => {
                error!("TMDB external_ids error for tv/{}: {:#}", tmdb_id, e);
                None
            }
        }
    }
}
