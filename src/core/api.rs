//! HTTP + WebSocket API for Moodlab sessions
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /session/new - Create session (simulation or external readings)
//! - GET /session/:id - Session status
//! - DELETE /session/:id - Stop the session and return its final export
//! - POST /session/:id/reading - Push one classifier reading (external mode)
//! - POST /session/:id/click - Record a click on the ad on screen
//! - POST /session/:id/pause, /session/:id/resume - Lifecycle
//! - PUT /session/:id/config - Replace experiment config
//! - GET /session/:id/export - Export record
//! - WS /ws/:id - Live tick notifications

use axum::{
    extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::core::{Classifier, SessionHandle};
use crate::types::{
    ClassifierError, ClickOutcome, ConfidenceVector, Counters, ExperimentConfig, ExportRecord,
    Label, SessionConfig, SessionError, SessionState, SignalSource, TickInput, TickNotification,
};

/// App state
pub struct AppState {
    pub sessions: RwLock<HashMap<String, SessionHandle>>,
    pub defaults: SessionConfig,
    next_id: AtomicU64,
}

/// Where a new session's readings come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Server-side simulation, ticking on its own
    #[default]
    Simulation,
    /// Client pushes readings to /session/:id/reading
    External,
}

/// Create new session request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    pub mode: Option<SessionMode>,
    pub config: Option<ExperimentConfig>,
    pub seed: Option<u64>,
    pub tick_interval_ms: Option<u64>,
}

/// Create new session response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Session status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub state: SessionState,
    pub source: Option<SignalSource>,
    pub label: Label,
    pub ticks: u64,
    pub counters: Counters,
    pub config: ExperimentConfig,
}

/// One classifier reading; `expressions: null` means no face was found
#[derive(Debug, Deserialize)]
pub struct ReadingRequest {
    pub expressions: Option<HashMap<String, f64>>,
}

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// Create the API router
pub fn create_router(defaults: SessionConfig) -> Router {
    let state = Arc::new(AppState {
        sessions: RwLock::new(HashMap::new()),
        defaults,
        next_id: AtomicU64::new(0),
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/reading", post(push_reading))
        .route("/session/:id/click", post(record_click))
        .route("/session/:id/pause", post(pause_session))
        .route("/session/:id/resume", post(resume_session))
        .route("/session/:id/config", put(update_config))
        .route("/session/:id/export", get(export_session))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Map controller errors onto HTTP status codes
fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::NotRunning(_) | SessionError::Failed(_) => StatusCode::CONFLICT,
        SessionError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Export(_) | SessionError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, StatusCode> {
    let mut config = state.defaults.clone();
    if let Some(experiment) = req.config {
        config.experiment = experiment;
    }
    if let Some(seed) = req.seed {
        config.seed = Some(seed);
    }
    if let Some(ms) = req.tick_interval_ms {
        config.tick_interval = Duration::from_millis(ms);
    }

    let mode = req.mode.unwrap_or_default();
    let handle = match mode {
        SessionMode::Simulation => {
            config.fallback_to_simulation = true;
            SessionHandle::launch(config, async {
                Err::<Box<dyn Classifier>, _>(ClassifierError::AdapterUnavailable(
                    "no classifier attached to server".into(),
                ))
            })
            .await
        }
        SessionMode::External => SessionHandle::external(config),
    }
    .map_err(|e| status_for(&e))?;

    let session_id = generate_session_id(&state.next_id);
    info!(%session_id, ?mode, "session created");
    state.sessions.write().await.insert(session_id.clone(), handle);

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
    }))
}

async fn status_of(id: String, handle: &SessionHandle) -> SessionStatusResponse {
    let c = handle.controller.lock().await;
    SessionStatusResponse {
        session_id: id,
        state: c.state(),
        source: c.source(),
        label: c.current_label(),
        ticks: c.tick_count(),
        counters: c.counters(),
        config: c.config().experiment,
    }
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(status_of(id, handle).await))
}

/// Stop a session's tick loop and drop it
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExportRecord>, StatusCode> {
    let handle = state.sessions.write().await.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
    let record = handle.controller.lock().await.export();
    handle.shutdown().await;
    info!(%id, "session deleted");
    Ok(Json(record))
}

/// Push a reading into an external-mode session
async fn push_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReadingRequest>,
) -> Result<Json<TickNotification>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    if handle.is_scheduled() {
        return Err(StatusCode::CONFLICT);
    }

    let input = match req.expressions {
        Some(expressions) => {
            let vector = ConfidenceVector::from_expressions(
                expressions.iter().map(|(name, score)| (name.as_str(), *score)),
            );
            if vector.is_empty() {
                TickInput::NoDetection
            } else {
                TickInput::Reading(vector)
            }
        }
        None => TickInput::NoDetection,
    };

    handle
        .push(input)
        .await
        .map_err(|e| status_for(&e))?
        .map(Json)
        .ok_or(StatusCode::CONFLICT)
}

/// Record a click
async fn record_click(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClickOutcome>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let outcome = handle.controller.lock().await.record_click().map_err(|e| status_for(&e))?;
    Ok(Json(outcome))
}

/// Pause ticking
async fn pause_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    handle.pause().await.map_err(|e| status_for(&e))?;
    Ok(Json(status_of(id, handle).await))
}

/// Resume ticking
async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    handle.resume().await.map_err(|e| status_for(&e))?;
    Ok(Json(status_of(id, handle).await))
}

/// Replace the experiment config
async fn update_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(config): Json<ExperimentConfig>,
) -> Result<Json<ExperimentConfig>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let mut c = handle.controller.lock().await;
    c.set_config(config).map_err(|e| {
        warn!(%id, error = %e, "config rejected");
        status_for(&e)
    })?;
    Ok(Json(c.config().experiment))
}

/// Export counters
async fn export_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExportRecord>, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let record = handle.controller.lock().await.export();
    Ok(Json(record))
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let sessions = state.sessions.read().await;
    let handle = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let rx = handle.controller.lock().await.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    }))
}

/// Forward notifications until the client goes away
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<TickNotification>) {
    loop {
        match rx.recv().await {
            Ok(update) => {
                let json = serde_json::to_string(&update).unwrap_or_default();
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "websocket subscriber lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Generate session ID
fn generate_session_id(counter: &AtomicU64) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let n = counter.fetch_add(1, Ordering::Relaxed);
    format!("session_{:x}_{}", millis, n)
}

/// Run the API server
pub async fn run_server(addr: &str, defaults: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(defaults);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "moodlab API listening");
    println!("Moodlab API running on {}", addr);
    println!("  POST /session/new          - Create session");
    println!("  GET  /session/:id          - Get status");
    println!("  DELETE /session/:id        - Stop session");
    println!("  POST /session/:id/reading  - Push reading");
    println!("  POST /session/:id/click    - Record click");
    println!("  POST /session/:id/pause    - Pause");
    println!("  POST /session/:id/resume   - Resume");
    println!("  PUT  /session/:id/config   - Update config");
    println!("  GET  /session/:id/export   - Export record");
    println!("  WS   /ws/:id               - Live updates");
    println!("  GET  /health               - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
