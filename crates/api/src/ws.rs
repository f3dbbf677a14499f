//! WebSocket subscription endpoint.
//!
//! Clients connect to `/api/v1/ws/{instance_id}` and receive every
//! event published for that instance as a JSON frame. The socket is
//! one-way: inbound frames other than ping/close are ignored.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use zapgate_core::types::DbId;
use zapgate_events::InstanceEvent;

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, instance_id))
}

/// Manage a single subscriber after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then
/// drives both with one `select!` loop: events from the bus are
/// serialized onto the sink, inbound close frames or errors end the
/// session.
async fn handle_socket(socket: WebSocket, state: AppState, instance_id: DbId) {
    tracing::info!(instance_id, "WebSocket subscriber connected");

    let mut rx = state.event_bus.subscribe(instance_id);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if forward_event(&mut sink, &event).await.is_err() {
                        tracing::debug!(instance_id, "WebSocket sink closed");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Slow consumer; resume from the current position.
                    tracing::warn!(instance_id, skipped, "WebSocket subscriber lagged");
                }
                Err(RecvError::Closed) => {
                    // Instance deleted while subscribed.
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: axum::extract::ws::close_code::NORMAL,
                            reason: "instance removed".into(),
                        })))
                        .await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(instance_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    tracing::info!(instance_id, "WebSocket subscriber disconnected");
}

async fn forward_event(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &InstanceEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize event for WebSocket");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await
}

/// Mount the WebSocket route, merged into `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws/{instance_id}", get(ws_handler))
}
