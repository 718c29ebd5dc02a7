//! Alert Routes

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::sessions::find;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub acknowledged: bool,
}

#[derive(Debug, Serialize)]
pub struct TestAlertResponse {
    /// Alert streams that received the notice
    pub listeners: usize,
}

/// Stream alert events for a session as they fire
pub async fn stream_alerts(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = find(&state, id).await?;
    debug!("Alert stream opened for session {}", id);

    let stream = BroadcastStream::new(session.subscribe()).filter_map(|item| match item {
        Ok(notice) => match Event::default().event("alert").json_data(notice) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Failed to encode alert event: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Alert stream lagged: {}", e);
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub async fn acknowledge(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AckResponse>, ApiError> {
    let session = find(&state, id).await?;
    Ok(Json(AckResponse {
        acknowledged: session.acknowledge().await,
    }))
}

/// Push a manual alert to the session's streams so clients can check their audio
pub async fn send_test_alert(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TestAlertResponse>, ApiError> {
    let session = find(&state, id).await?;
    Ok(Json(TestAlertResponse {
        listeners: session.send_test_alert().await,
    }))
}

/// The alert beep sequence as a WAV file
pub async fn alert_tone(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let wav = state.read().await.alert_tone.clone();
    ([(header::CONTENT_TYPE, "audio/wav")], wav)
}
