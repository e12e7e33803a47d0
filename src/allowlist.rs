use anyhow::{Context, Result};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub const TRMNL_IPS_API: &str = "https://trmnl.com/api/ips";
pub const LOCALHOST_IPS: [&str; 3] = ["127.0.0.1", "::1", "localhost"];

/// Client IPs permitted on the image route.
pub struct Allowlist {
    enabled: bool,
    ips: RwLock<HashSet<String>>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
}

impl Allowlist {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ips: RwLock::new(localhost()),
            last_refresh: RwLock::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn allows(&self, ip: &str) -> bool {
        !self.enabled || self.ips.read().await.contains(ip)
    }

    /// Replaces the set; localhost stays allowed.
    pub async fn replace(&self, ips: HashSet<String>) {
        let mut merged = localhost();
        merged.extend(ips);
        *self.ips.write().await = merged;
        *self.last_refresh.write().await = Some(Utc::now());
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read().await
    }

    /// Fetches the current TRMNL addresses. On failure only localhost remains.
    pub async fn refresh(&self, client: &Client) {
        let ips = match fetch_trmnl_ips(client).await {
            Ok(ips) => ips,
            Err(e) => {
                error!("Failed to fetch TRMNL IPs: {:#}", e);
                HashSet::new()
            }
        };
        self.replace(ips).await;
    }
}

fn localhost() -> HashSet<String> {
    LOCALHOST_IPS.iter().map(|s| s.to_string()).collect()
}

pub async fn fetch_trmnl_ips(client: &Client) -> Result<HashSet<String>> {
    let body: Value = client
        .get(TRMNL_IPS_API)
        .send()
        .await
        .context("request failed")?
        .error_for_status()
        .context("TRMNL IP API returned an error")?
        .json()
        .await
        .context("JSON parse failed")?;
    let ips = parse_ip_response(&body);
    info!("Loaded {} TRMNL IPs", ips.len());
    Ok(ips)
}

/// Collects `data.ipv4[]` and `data.ipv6[]`.
pub fn parse_ip_response(body: &Value) -> HashSet<String> {
    ["ipv4", "ipv6"]
        .iter()
        .filter_map(|family| body.get("data").and_then(|d| d.get(family)))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Refreshes at the top of the next hour, then every `every`.
pub fn spawn_refresh_worker(
    allowlist: Arc<Allowlist>,
    client: Client,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let until_hour = 3600 - Utc::now().timestamp().rem_euclid(3600) as u64;
        tokio::time::sleep(Duration::from_secs(until_hour)).await;
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            info!("Refreshing TRMNL IPs...");
            allowlist.refresh(&client).await;
        }
    })
}

/// Real client address, honouring the usual proxy headers.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    if let Some(ip) = header("cf-connecting-ip") {
        return ip.to_string();
    }
    if let Some(forwarded) = header("x-forwarded-for") {
        return forwarded.split(',').next().unwrap_or(forwarded).trim().to_string();
    }
    if let Some(ip) = header("x-real-ip") {
        return ip.to_string();
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
