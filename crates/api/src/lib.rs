//! Drowsiness Monitor API Server
//!
//! HTTP sessions fed with landmark frames from a browser-side detector,
//! alert streaming over SSE, plus the offline `watch` and `replay` drivers.

use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use dms::DetectionConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

pub mod error;
pub mod replay;
mod routes;
pub mod session;
pub mod settings;
pub mod watch;

pub use error::ApiError;
pub use session::{AlertNotice, FrameInput, Session, SessionStatus};
pub use settings::Settings;

/// Application state shared across handlers
pub struct AppState {
    /// Live sessions by id
    pub sessions: HashMap<Uuid, Arc<Session>>,
    /// Config given to new sessions
    pub defaults: DetectionConfig,
    /// Idle time after which a session is dropped; `None` keeps sessions
    pub session_idle: Option<Duration>,
    /// Rendered alert tone (WAV)
    pub alert_tone: Bytes,
    /// Prometheus recorder, when installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: &Settings) -> Result<Self, alerting::NotifyError> {
        let tone = alerting::ToneSequence::default().to_wav(settings.alerts.tone_sample_rate)?;
        Ok(Self {
            sessions: HashMap::new(),
            defaults: settings.detection,
            session_idle: Some(settings.server.session_idle_secs)
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            alert_tone: Bytes::from(tone),
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Drop sessions idle for at least `ttl`; returns how many were dropped
    pub async fn evict_idle(&mut self, ttl: Duration) -> usize {
        let mut idle = Vec::new();
        for (id, session) in &self.sessions {
            if session.is_idle(ttl).await {
                idle.push(*id);
            }
        }

        for id in &idle {
            self.sessions.remove(id);
            info!("Session {} dropped after {}s idle", id, ttl.as_secs());
        }
        if !idle.is_empty() {
            metrics::gauge!("api_sessions_active").set(self.sessions.len() as f64);
        }
        idle.len()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub sessions: usize,
}

/// Create the application router
pub fn create_router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/sessions", post(routes::sessions::create_session))
        .route(
            "/api/v1/sessions/:id",
            get(routes::sessions::get_session).delete(routes::sessions::delete_session),
        )
        .route("/api/v1/sessions/:id/config", put(routes::sessions::update_config))
        .route("/api/v1/sessions/:id/frames", post(routes::sessions::post_frame))
        .route("/api/v1/sessions/:id/alerts", get(routes::alerts::stream_alerts))
        .route("/api/v1/sessions/:id/alerts/ack", post(routes::alerts::acknowledge))
        .route("/api/v1/sessions/:id/alerts/test", post(routes::alerts::send_test_alert))
        .route("/api/v1/alert-tone.wav", get(routes::alerts::alert_tone))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sessions: state.sessions.len(),
    })
}

async fn metrics_handler(State(state): State<Arc<RwLock<AppState>>>) -> Result<String, ApiError> {
    let state = state.read().await;
    let handle = state.metrics.as_ref().ok_or(ApiError::MetricsDisabled)?;
    Ok(handle.render())
}

/// Initialize logging.
///
/// `RUST_LOG` wins over the verbosity count when set.
pub fn init_logging(verbosity: u8, json: bool) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Periodically drop idle sessions
fn spawn_idle_sweep(state: Arc<RwLock<AppState>>, ttl: Duration) -> tokio::task::JoinHandle<()> {
    let period = ttl.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = state.write().await.evict_idle(ttl).await;
            if evicted > 0 {
                debug!("Idle sweep dropped {} sessions", evicted);
            }
        }
    })
}

/// Run the server
pub async fn run_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let session_idle = state.session_idle;
    let state = Arc::new(RwLock::new(state));
    if let Some(ttl) = session_idle {
        spawn_idle_sweep(state.clone(), ttl);
        info!("Idle sessions expire after {}s", ttl.as_secs());
    }
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
