use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const FANART_API_BASE: &str = "https://webservice.fanart.tv/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Show,
    Movie,
}

impl MediaType {
    /// Parses the route segment (`show` or `movie`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "show" => Some(MediaType::Show),
            "movie" => Some(MediaType::Movie),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Show => "show",
            MediaType::Movie => "movie",
        }
    }

    fn tmdb_path(self) -> &'static str {
        match self {
            MediaType::Show => "tv",
            MediaType::Movie => "movie",
        }
    }

    fn fanart_path(self) -> &'static str {
        match self {
            MediaType::Show => "tv",
            MediaType::Movie => "movies",
        }
    }

    fn fanart_poster_key(self) -> &'static str {
        match self {
            MediaType::Show => "tvposter",
            MediaType::Movie => "movieposter",
        }
    }
}

/// Upstream poster lookups. `Ok(None)` means the upstream has no poster.
#[async_trait]
pub trait ArtworkApi: Send + Sync {
    fn tmdb_configured(&self) -> bool;
    fn fanart_configured(&self) -> bool;
    async fn tmdb_poster(&self, media: MediaType, tmdb_id: &str) -> Result<Option<Bytes>>;
    async fn tvdb_id(&self, tmdb_id: &str) -> Result<Option<i64>>;
    /// `id` is a TMDB id for movies and a TVDB id for shows.
    async fn fanart_poster(&self, media: MediaType, id: &str) -> Result<Option<Bytes>>;
}

#[derive(Debug, Clone)]
pub struct ArtworkClient {
    client: Client,
    tmdb_api_key: Option<String>,
    fanart_api_key: Option<String>,
    image_size: String,
}

impl ArtworkClient {
    pub fn new(
        tmdb_api_key: Option<String>,
        fanart_api_key: Option<String>,
        image_size: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client failed")?;
        Ok(Self {
            client,
            tmdb_api_key,
            fanart_api_key,
            image_size,
        })
    }

    /// `None` for a 404, the parsed body otherwise.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<Option<T>> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", redact(url), status));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(Some(parsed))
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("image request failed")?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, status));
        }
        res.bytes().await.context("reading image failed")
    }
}

#[async_trait]
impl ArtworkApi for ArtworkClient {
    fn tmdb_configured(&self) -> bool {
        self.tmdb_api_key.is_some()
    }

    fn fanart_configured(&self) -> bool {
        self.fanart_api_key.is_some()
    }

    async fn tmdb_poster(&self, media: MediaType, tmdb_id: &str) -> Result<Option<Bytes>> {
        #[derive(Deserialize)]
        struct Detail {
            poster_path: Option<String>,
        }

        let Some(api_key) = self.tmdb_api_key.as_deref() else {
            return Ok(None);
        };
        let kind = media.tmdb_path();
        let url = format!("{TMDB_API_BASE}/{kind}/{tmdb_id}?api_key={api_key}");
        let Some(detail) = self.get_json::<Detail>(&url).await? else {
            info!("TMDB: {}/{} not found", kind, tmdb_id);
            return Ok(None);
        };
        let Some(poster_path) = detail.poster_path.filter(|p| !p.is_empty()) else {
            info!("TMDB: {}/{} has no poster", kind, tmdb_id);
            return Ok(None);
        };

        let image_url = format!("{TMDB_IMAGE_BASE}/{}{}", self.image_size, poster_path);
        let bytes = self.get_bytes(&image_url).await?;
        info!(
            "TMDB: fetched poster for {}/{} ({} bytes)",
            kind,
            tmdb_id,
            bytes.len()
        );
        Ok(Some(bytes))
    }

    async fn tvdb_id(&self, tmdb_id: &str) -> Result<Option<i64>> {
        #[derive(Deserialize)]
        struct ExternalIds {
            tvdb_id: Option<i64>,
        }

        let Some(api_key) = self.tmdb_api_key.as_deref() else {
            return Ok(None);
        };
        let url = format!("{TMDB_API_BASE}/tv/{tmdb_id}/external_ids?api_key={api_key}");
        let ids = self.get_json::<ExternalIds>(&url).await?;
        Ok(ids.and_then(|i| i.tvdb_id).filter(|id| *id > 0))
    }

    async fn fanart_poster(&self, media: MediaType, id: &str) -> Result<Option<Bytes>> {
        #[derive(Deserialize)]
        struct FanartImage {
            url: Option<String>,
        }

        let Some(api_key) = self.fanart_api_key.as_deref() else {
            return Ok(None);
        };
        let url = format!(
            "{FANART_API_BASE}/{}/{id}?api_key={api_key}",
            media.fanart_path()
        );
        let Some(data) = self.get_json::<serde_json::Value>(&url).await? else {
            return Ok(None);
        };
        let poster_url = data
            .get(media.fanart_poster_key())
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<FanartImage>>(v).ok())
            .and_then(|posters| posters.into_iter().next())
            .and_then(|p| p.url)
            .filter(|u| !u.is_empty());
        let Some(poster_url) = poster_url else {
            return Ok(None);
        };

        let bytes = self.get_bytes(&poster_url).await?;
        info!(
            "Fanart: fetched poster for {}/{} ({} bytes)",
            media.as_str(),
            id,
            bytes.len()
        );
        Ok(Some(bytes))
    }
}

/// Strips the query string so API keys stay out of logs.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// TMDB ids in routes are plain ASCII digits.
pub fn is_valid_tmdb_id(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}
