use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use syncoor_store::{CompleteRequest, EventData, KeepaliveRequest, ProgressPoint};

use crate::error::ApiError;
use crate::state::AppState;

/// Wraps a successful payload in the `{ "data": ... }` envelope (§6.1).
fn ok<T: Serialize>(status: StatusCode, payload: T) -> impl IntoResponse {
    (status, Json(json!({ "data": payload })))
}

// ── Health & metrics ──────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let active = state.store.list_summaries(true).await.len();
    let total = state.store.list_summaries(false).await.len();
    ok(StatusCode::OK, json!({ "status": "ok", "active_tests": active, "total_tests": total }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let all = state.store.list_summaries(false).await;
    let running = all.iter().filter(|s| s.is_running).count();
    let completed = all.len() - running;
    ok(
        StatusCode::OK,
        json!({ "process": { "total_tests": all.len(), "running": running, "completed": completed } }),
    )
}

// ── Runner-facing ingestion ───────────────────────────────────────────────────

pub async fn post_keepalive(
    State(state): State<AppState>,
    Json(req): Json<KeepaliveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (summary, created) = state.store.keepalive(req).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok(ok(status, summary))
}

pub async fn post_progress(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(point): Json<ProgressPoint>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.update_progress(&run_id, point).await?;
    Ok(ok(StatusCode::OK, json!({ "status": "updated" })))
}

pub async fn post_complete(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.complete_test(&run_id, req).await?;
    Ok(ok(StatusCode::OK, json!({ "status": "completed" })))
}

// ── Read-only test views ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListTestsQuery {
    pub active: Option<bool>,
}

pub async fn list_tests(
    State(state): State<AppState>,
    Query(q): Query<ListTestsQuery>,
) -> impl IntoResponse {
    let summaries = state.store.list_summaries(q.active.unwrap_or(false)).await;
    ok(StatusCode::OK, summaries)
}

pub async fn get_test(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .store
        .get_detail(&run_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("test '{}' not found", run_id)))?;
    Ok(ok(StatusCode::OK, detail))
}

// ── SSE event stream ──────────────────────────────────────────────────────────

fn event_name(data: &EventData) -> &'static str {
    match data {
        EventData::Start { .. } => "test_start",
        EventData::Progress(_) => "test_progress",
        EventData::Complete { .. } => "test_complete",
    }
}

pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.hub.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(event) => {
            let name = event_name(&event.data);
            let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(name).data(payload)))
        }
        // A lagged receiver just means we missed some events; keep streaming.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
