//! WebSocket transport for the coding channel.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::coding::controller::SessionController;
use crate::coding::protocol::ServerEvent;
use crate::state::AppState;

/// GET /ws/session/:session_id/coding/:task_id
pub async fn coding_ws_handler(
    ws: WebSocketUpgrade,
    Path((session_id, task_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let controller = state.controller.clone();
    ws.on_upgrade(move |socket| run_channel(socket, controller, session_id, task_id))
}

async fn run_channel(
    socket: WebSocket,
    controller: Arc<SessionController>,
    session_id: String,
    task_id: String,
) {
    let (sender, receiver) = socket.split();
    serve_channel(sender, receiver, controller, session_id, task_id).await;
}

/// Services one channel until the client goes away.
///
/// Frames are handled one at a time on this task. A spawned writer drains the
/// session's outbound queue into `sender`; it finishes once the registry
/// drops the queue's sender on disconnect or when a newer channel replaces
/// this one.
async fn serve_channel<W, R, E>(
    sender: W,
    mut receiver: R,
    controller: Arc<SessionController>,
    session_id: String,
    task_id: String,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();

    let handle = controller.connect(&session_id, &task_id, tx).await;
    let writer = tokio::spawn(write_events(sender, rx));

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => controller.handle_text(&handle, &text).await,
            Ok(Message::Binary(bytes)) => {
                controller
                    .handle_text(&handle, &String::from_utf8_lossy(&bytes))
                    .await
            }
            Ok(Message::Close(_)) => break,
            // ping/pong are answered by axum
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for session {session_id}: {e}");
                break;
            }
        }

        if !controller.is_current(&handle).await {
            info!("Closing superseded channel for session {session_id}");
            break;
        }
    }

    controller.disconnect(&handle).await;
    if let Err(e) = writer.await {
        warn!("Writer task for session {session_id} ended abnormally: {e}");
    }
}

async fn write_events<W>(mut sender: W, mut rx: mpsc::UnboundedReceiver<ServerEvent>)
where
    W: Sink<Message> + Unpin,
{
    while let Some(event) = rx.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize outbound event: {e}");
                continue;
            }
        };
        if sender.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}
