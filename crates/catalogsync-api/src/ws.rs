//! `GET /sync/progress?syncId=<id|all>` — WebSocket progress stream
//! (spec §4.7, §6.3).

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use catalogsync_bus::ProgressEvent;
use catalogsync_core::domain::SyncStage;
use serde::Deserialize;
use tracing::debug;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    #[serde(rename = "syncId")]
    sync_id: Option<String>,
}

pub async fn progress_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<ProgressQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_progress(socket, state, query.sync_id))
}

async fn stream_progress(mut socket: WebSocket, state: AppState, sync_id: Option<String>) {
    let mut subscription = match sync_id.as_deref() {
        None | Some("*") | Some("all") => state.bus.subscribe_all(),
        Some(id) => state.bus.subscribe_one(id),
    };

    // spec §8 boundary behavior: a subscriber that attaches after the run
    // started must still see the current progress as its first event,
    // not just whatever is published after it connects.
    if let Some(run) = state.engine.current() {
        let addressed = match sync_id.as_deref() {
            None | Some("*") | Some("all") => true,
            Some(id) => id == run.id.as_str(),
        };
        if addressed {
            let snapshot = ProgressEvent::Progress {
                sync_id: run.id.clone(),
                stage: run.progress.stage.unwrap_or(SyncStage::Preparing),
                current: run.progress.current,
                total: run.progress.total,
                current_operation: run.progress.current_operation.clone(),
                estimated_time_remaining_secs: None,
            };
            if let Ok(text) = serde_json::to_string(&snapshot.to_frame()) {
                if socket.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    debug!("progress bus closed, ending websocket stream");
                    break;
                };
                let frame = event.to_frame();
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
