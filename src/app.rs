use crate::allowlist::{client_ip, spawn_refresh_worker, Allowlist};
use crate::artwork::{is_valid_tmdb_id, ArtworkApi, ArtworkClient, MediaType};
use crate::config::Settings;
use crate::posters::PosterService;
use crate::store::RedisStore;
use crate::transform::{transform_str, TransformOptions};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap
const ALLOWLIST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub options: Arc<TransformOptions>,
    pub posters: Arc<PosterService>,
    pub allowlist: Arc<Allowlist>,
}

pub async fn run_server(settings: Settings) -> Result<()> {
    info!("Starting Trakt digest service");

    let artwork: Arc<dyn ArtworkApi> = Arc::new(ArtworkClient::new(
        settings.tmdb_api_key.clone(),
        settings.fanart_api_key.clone(),
        settings.tmdb_image_size.clone(),
    )?);
    if !artwork.tmdb_configured() {
        warn!("TMDB_API_KEY not set, image lookups will fail");
    }
    let redis = match settings.redis_url.as_deref() {
        Some(url) => RedisStore::connect_with_retries(url).await,
        None => {
            warn!("REDIS_URL is blank, caching in process");
            None
        }
    };
    let posters = Arc::new(
        PosterService::new(artwork, settings.cache_ttl, settings.cache_ttl_not_found)
            .with_redis(redis),
    );

    let allowlist = Arc::new(Allowlist::new(settings.enable_ip_whitelist));
    if allowlist.is_enabled() {
        info!("IP whitelist enabled");
        let client = Client::builder()
            .timeout(ALLOWLIST_TIMEOUT)
            .build()
            .context("building HTTP client failed")?;
        allowlist.refresh(&client).await;
        let every = Duration::from_secs(settings.ip_refresh_hours * 3600);
        spawn_refresh_worker(allowlist.clone(), client, every);
        info!(
            "IP refresh worker started (every {}h)",
            settings.ip_refresh_hours
        );
    } else {
        warn!("IP whitelist DISABLED, all IPs allowed");
    }

    let state = AppState {
        options: Arc::new(settings.transform_options()),
        posters,
        allowlist,
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/transform", post(handle_transform))
        .route("/image/:media_type/:tmdb_id", get(serve_image))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let redis = if state.posters.redis_connected().await {
        "connected"
    } else {
        "disconnected"
    };
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "redis": redis,
        "cache_entries": state.posters.cached_images().await,
        "tmdb_configured": state.posters.tmdb_configured(),
        "fanart_configured": state.posters.fanart_configured(),
        "ip_whitelist_enabled": state.allowlist.is_enabled(),
        "last_ip_refresh": state.allowlist.last_refresh().await.map(|t| t.to_rfc3339()),
    }))
}

async fn handle_transform(State(state): State<AppState>, body: Bytes) -> Response {
    if body.len() > MAX_BODY_BYTES {
        warn!(
            "Rejecting request: body too large ({} bytes > {} bytes)",
            body.len(),
            MAX_BODY_BYTES
        );
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({ "error": "Payload too large" })),
        )
            .into_response();
    }

    let raw = String::from_utf8_lossy(&body);
    let document = transform_str(&raw, &state.options);
    debug!(
        has_content = document.has_content,
        bytes = body.len(),
        "Served transform"
    );
    Json(document).into_response()
}

async fn serve_image(
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, String)>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    if state.allowlist.is_enabled() {
        let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
        if !state.allowlist.allows(&ip).await {
            warn!("Blocked unauthorized IP: {}", ip);
            return (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Access denied",
                    "message": "Your IP address is not authorized to access this service"
                })),
            )
                .into_response();
        }
    }

    let Some(media) = MediaType::parse(&media_type) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid media type, use \"show\" or \"movie\"" })),
        )
            .into_response();
    };
    if !is_valid_tmdb_id(&tmdb_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid TMDB ID" })),
        )
            .into_response();
    }

    let (image, source) = state.posters.get_image(media, &tmdb_id).await;
    match image {
        Some(bytes) => (
            StatusCode::OK,
            [
                ("content-type", "image/jpeg"),
                ("x-image-source", source.as_str()),
                ("cache-control", "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [
                ("x-image-source", source.as_str()),
                ("cache-control", "public, max-age=3600"),
            ],
            "Not Found",
        )
            .into_response(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
