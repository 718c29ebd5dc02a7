//! Session Routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dms::{ControlUpdate, DetectionConfig, FrameReport};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::session::{FrameInput, Session, SessionStatus};
use crate::AppState;

/// Response for session creation
#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub id: Uuid,
    pub config: DetectionConfig,
}

pub(crate) async fn find(
    state: &Arc<RwLock<AppState>>,
    id: Uuid,
) -> Result<Arc<Session>, ApiError> {
    state
        .read()
        .await
        .sessions
        .get(&id)
        .cloned()
        .ok_or(ApiError::SessionNotFound(id))
}

/// Create a session, optionally with initial controls
pub async fn create_session(
    State(state): State<Arc<RwLock<AppState>>>,
    body: Option<Json<ControlUpdate>>,
) -> (StatusCode, Json<CreatedSession>) {
    let mut state = state.write().await;
    let mut config = state.defaults;
    if let Some(Json(update)) = body {
        config.apply_controls(&update);
    }

    let session = Arc::new(Session::new(config));
    let id = session.id;
    state.sessions.insert(id, session);
    metrics::gauge!("api_sessions_active").set(state.sessions.len() as f64);
    info!("Session {} created", id);

    (StatusCode::CREATED, Json(CreatedSession { id, config }))
}

pub async fn delete_session(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut state = state.write().await;
    state.sessions.remove(&id).ok_or(ApiError::SessionNotFound(id))?;
    metrics::gauge!("api_sessions_active").set(state.sessions.len() as f64);
    info!("Session {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, ApiError> {
    let session = find(&state, id).await?;
    Ok(Json(session.status().await))
}

pub async fn update_config(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
    Json(update): Json<ControlUpdate>,
) -> Result<Json<DetectionConfig>, ApiError> {
    let session = find(&state, id).await?;
    Ok(Json(session.update_config(&update).await))
}

/// Run one frame of landmarks through the session
pub async fn post_frame(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
    Json(input): Json<FrameInput>,
) -> Result<Json<FrameReport>, ApiError> {
    let session = find(&state, id).await?;
    Ok(Json(session.ingest(&input).await?))
}
