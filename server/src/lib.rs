pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod validation;

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use room_core::{MeetingToken, Room, RoomService};
use speech_core::{SpeechSynthesizer, VoiceProfile};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{AppMetrics, DetailedMetricsResponse, SystemMetrics};
use crate::validation::validate_speech_text;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared, read-only dependencies handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// `None` when no room API key is configured.
    pub rooms: Option<Arc<dyn RoomService>>,
    pub metrics: AppMetrics,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, config: ServerConfig) -> Self {
        Self {
            synthesizer,
            rooms: None,
            metrics: AppMetrics::new(),
            config,
        }
    }

    pub fn with_rooms(mut self, rooms: Arc<dyn RoomService>) -> Self {
        self.rooms = Some(rooms);
        self
    }

    fn rooms(&self) -> Result<&Arc<dyn RoomService>, ApiError> {
        self.rooms.as_ref().ok_or(ApiError::NotConfigured("Room service"))
    }
}

#[derive(Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    room_url: Option<String>,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let _ = START_TIME.get_or_init(Instant::now);
    let config = state.config.clone();

    // `/speech` bounds its own wait for the first audio chunk (see
    // `relay::open`) so a slow upstream still gets a logged JSON error.
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/speech/voice", get(voice_info))
        .route("/rooms", post(create_room))
        .route("/rooms/token", post(meeting_token))
        .route("/metrics", get(metrics_endpoint))
        .route_layer(timeout_layer(&config))
        .route("/speech", post(speech_endpoint));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .into_inner();

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route_layer(timeout_layer(&config))
        .nest("/api", api);

    let index = config.public_dir.join("index.html");
    let router = if config.public_dir.is_dir() {
        info!(path = %config.public_dir.display(), "Serving static files");
        router.fallback_service(ServeDir::new(&config.public_dir).fallback(ServeFile::new(index)))
    } else {
        info!(path = %config.public_dir.display(), "Public directory not found, skipping static file serving");
        router
    };

    router
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}

fn timeout_layer(config: &ServerConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout())
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let Some(ref allowed_origins) = config.cors_allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

/// Tag request and response with an `x-request-id`, keeping one supplied by
/// the caller.
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .cloned()
        .or_else(|| HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok());

    if let Some(ref id) = request_id {
        request.headers_mut().insert(REQUEST_ID_HEADER, id.clone());
    }
    let mut response = next.run(request).await;
    if let Some(id) = request_id {
        response.headers_mut().insert(REQUEST_ID_HEADER, id);
    }
    response
}

fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// `POST /api/speech`: stream synthesized audio for `{ "text": ... }`.
pub async fn speech_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let text = validate_speech_text(req.text.as_deref())?;
    let request_id = request_id(&headers);

    info!(request_id, text_len = text.len(), "Speech request received");

    let body = relay::open(
        state.synthesizer.as_ref(),
        text,
        request_id,
        &state.metrics,
        state.config.request_timeout(),
    )
    .await?;

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"))],
        Body::from_stream(body),
    )
        .into_response())
}

/// `GET /api/speech/voice`: the fixed voice every request uses.
pub async fn voice_info(State(state): State<AppState>) -> Json<VoiceProfile> {
    Json(state.synthesizer.profile().clone())
}

pub async fn create_room(State(state): State<AppState>) -> Result<Json<Room>, ApiError> {
    let room = state.rooms()?.create_room().await?;
    Ok(Json(room))
}

pub async fn meeting_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<MeetingToken>, ApiError> {
    let rooms = state.rooms()?;
    let Json(req) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let room_url = req.room_url.unwrap_or_default();
    let token = rooms.meeting_token(&room_url).await?;
    Ok(Json(token))
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let cpu_usage = system.global_cpu_info().cpu_usage();
    let memory_used = system.used_memory();
    let memory_total = system.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f64 / memory_total as f64 * 100.0) as f32
    } else {
        0.0
    };

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(DetailedMetricsResponse {
        timestamp: chrono::Utc::now(),
        system: SystemMetrics {
            cpu_usage_percent: cpu_usage,
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            uptime_seconds: uptime,
            system_load: system_load(),
        },
        speech: state.metrics.speech.stats(),
        streams: state.metrics.streams.stats(),
    })
}

/// One-minute load average.
#[cfg(unix)]
fn system_load() -> Option<f64> {
    std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|loadavg| loadavg.split_whitespace().next()?.parse::<f64>().ok())
}

#[cfg(not(unix))]
fn system_load() -> Option<f64> {
    None
}
