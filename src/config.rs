use crate::transform::{TransformOptions, DEFAULT_IMAGE_BASE_URL};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_IP_REFRESH_HOURS: u64 = 24;
const DEFAULT_TMDB_IMAGE_SIZE: &str = "w185";
const DEFAULT_CACHE_TTL_SECS: u64 = 604_800; // 7 days
const DEFAULT_CACHE_TTL_NOT_FOUND_SECS: u64 = 86_400; // 1 day
const DEFAULT_REDIS_URL: &str = "redis://redis:6379/0";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub image_base_url: String,
    pub enable_ip_whitelist: bool,
    pub ip_refresh_hours: u64,
    pub tmdb_api_key: Option<String>,
    pub fanart_api_key: Option<String>,
    /// `None` when `REDIS_URL` is set but blank: caches stay in process.
    pub redis_url: Option<String>,
    pub tmdb_image_size: String,
    pub cache_ttl: Duration,
    pub cache_ttl_not_found: Duration,
    pub debug: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: number(&lookup, "PORT", DEFAULT_PORT)?,
            image_base_url: non_empty("IMAGE_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
            enable_ip_whitelist: flag(lookup("ENABLE_IP_WHITELIST"), true),
            ip_refresh_hours: number(&lookup, "IP_REFRESH_HOURS", DEFAULT_IP_REFRESH_HOURS)?
                .max(1),
            tmdb_api_key: non_empty("TMDB_API_KEY"),
            fanart_api_key: non_empty("FANART_API_KEY"),
            redis_url: match lookup("REDIS_URL") {
                Some(url) => Some(url.trim().to_string()).filter(|u| !u.is_empty()),
                None => Some(DEFAULT_REDIS_URL.to_string()),
            },
            tmdb_image_size: non_empty("TMDB_IMAGE_SIZE")
                .unwrap_or_else(|| DEFAULT_TMDB_IMAGE_SIZE.to_string()),
            cache_ttl: Duration::from_secs(number(
                &lookup,
                "CACHE_TTL_SECONDS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            cache_ttl_not_found: Duration::from_secs(number(
                &lookup,
                "CACHE_TTL_NOT_FOUND_SECONDS",
                DEFAULT_CACHE_TTL_NOT_FOUND_SECS,
            )?),
            debug: flag(lookup("DEBUG"), false),
        })
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            image_base_url: self.image_base_url.clone(),
        }
    }
}

fn flag(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn number<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        None => Ok(default),
    }
}
