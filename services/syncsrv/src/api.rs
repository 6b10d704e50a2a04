//! Control and status API
//!
//! Small HTTP surface over the sync loop: health, status, recent activity,
//! and explicit start/stop. Handlers never touch the stores directly; all
//! they see is the shared status and the engine handle.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::SyncEngine;
use crate::status::SyncStatus;
use crate::storage::{DestinationStore, SourceStore};
use crate::{SERVICE_NAME, SERVICE_VERSION};

pub type SharedState<S, D> = Arc<ApiState<S, D>>;

/// State shared with every handler.
pub struct ApiState<S: SourceStore, D: DestinationStore> {
    engine: Arc<SyncEngine<S, D>>,
    status: Arc<SyncStatus>,
    /// Cancellation handle of the active loop task, if one was started
    active: Mutex<Option<(CancellationToken, tokio::task::JoinHandle<()>)>>,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(serde::Serialize)]
struct ControlResponse {
    success: bool,
    message: String,
}

impl<S: SourceStore, D: DestinationStore> ApiState<S, D> {
    pub fn new(engine: Arc<SyncEngine<S, D>>, status: Arc<SyncStatus>) -> Self {
        Self {
            engine,
            status,
            active: Mutex::new(None),
        }
    }

    /// Spawn the sync loop if it is not already running.
    ///
    /// Returns `false` when a loop is active. The running flag is raised
    /// here, before the task is spawned, so two concurrent starts cannot
    /// both succeed.
    pub fn start_loop(&self) -> bool {
        let mut active = self.active.lock();
        if self.status.is_running() {
            return false;
        }
        self.status.mark_started();

        let token = CancellationToken::new();
        let engine = self.engine.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            engine.run(task_token).await;
        });
        *active = Some((token, handle));
        true
    }

    /// Ask the running loop to stop at its next wait point.
    ///
    /// Returns `false` when no loop is running. The stop is observed at
    /// the sleep boundary and between chunk fetches; the in-flight batch
    /// still finishes its write before the loop exits.
    pub fn stop_loop(&self) -> bool {
        let active = self.active.lock();
        if !self.status.is_running() {
            return false;
        }
        if let Some((token, _)) = active.as_ref() {
            token.cancel();
        }
        true
    }

    /// Stop the loop and wait for the task to finish. Used at shutdown.
    pub async fn shutdown(&self) {
        let taken = { self.active.lock().take() };
        if let Some((token, handle)) = taken {
            token.cancel();
            let _ = handle.await;
        }
    }
}

pub fn create_router<S: SourceStore, D: DestinationStore>(state: SharedState<S, D>) -> Router {
    Router::new()
        .route("/health", get(health::<S, D>))
        .route("/api/status", get(get_status::<S, D>))
        .route("/api/logs", get(get_logs::<S, D>))
        .route("/api/sync/start", post(start_sync::<S, D>))
        .route("/api/sync/stop", post(stop_sync::<S, D>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health<S: SourceStore, D: DestinationStore>(
    State(state): State<SharedState<S, D>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "sync_state": state.status.state().as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_status<S: SourceStore, D: DestinationStore>(
    State(state): State<SharedState<S, D>>,
) -> impl IntoResponse {
    Json(json!({
        "state": state.status.state(),
        "running": state.status.is_running(),
        "stats": state.status.stats(),
    }))
}

async fn get_logs<S: SourceStore, D: DestinationStore>(
    State(state): State<SharedState<S, D>>,
) -> impl IntoResponse {
    Json(state.status.logs())
}

async fn start_sync<S: SourceStore, D: DestinationStore>(
    State(state): State<SharedState<S, D>>,
) -> impl IntoResponse {
    if state.start_loop() {
        (
            StatusCode::ACCEPTED,
            Json(ControlResponse {
                success: true,
                message: "sync started".to_string(),
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "sync is already running".to_string(),
            }),
        )
            .into_response()
    }
}

async fn stop_sync<S: SourceStore, D: DestinationStore>(
    State(state): State<SharedState<S, D>>,
) -> impl IntoResponse {
    if state.stop_loop() {
        (
            StatusCode::ACCEPTED,
            Json(ControlResponse {
                success: true,
                message: "sync stopping".to_string(),
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "sync is not running".to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryDestinationStore, MemorySourceStore};
    use crate::tags::{TagDictionary, TagEntry};
    use std::time::Duration;

    fn test_state() -> ApiState<MemorySourceStore, MemoryDestinationStore> {
        let dict = TagDictionary::new(&[TagEntry {
            index: 1,
            column: "a".to_string(),
        }]);
        let status = Arc::new(SyncStatus::new());
        let engine = Arc::new(SyncEngine::new(
            Arc::new(MemorySourceStore::new()),
            Arc::new(MemoryDestinationStore::new()),
            dict,
            status.clone(),
            Duration::from_secs(3600),
            100,
        ));
        ApiState::new(engine, status)
    }

    #[tokio::test]
    async fn test_start_then_duplicate_start_rejected() {
        let state = test_state();

        assert!(state.start_loop());
        assert!(!state.start_loop());

        state.shutdown().await;
        assert!(!state.status.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_start_rejected() {
        let state = test_state();

        assert!(!state.stop_loop());
    }

    #[tokio::test]
    async fn test_start_stop_cycle_can_repeat() {
        let state = test_state();

        assert!(state.start_loop());
        state.shutdown().await;
        assert!(!state.status.is_running());

        assert!(state.start_loop());
        state.shutdown().await;
        assert!(!state.status.is_running());
    }
}
