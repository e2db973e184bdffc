use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::connection_channel;
use crate::ws::protocol::{ServerEvent, ERROR_MALFORMED};
use crate::ws::session::Session;

/// Run the actor-per-connection pattern for an accepted WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: decodes client events one at a time and dispatches them
///
/// Events from one connection are handled strictly in arrival order, so a
/// sender's messages are persisted and pushed in the order they were sent.
/// Any other task reaches this client through the connection's handle.
pub async fn run_connection(socket: WebSocket, state: AppState, authenticated: Option<String>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (handle, rx) = connection_channel();
    let connection_id = handle.id();
    let session = Session::new(handle, authenticated);

    tracing::info!(connection_id, "WebSocket actor started");

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    session.handle_text(&state, text.as_str()).await;
                }
                Message::Binary(_) => {
                    tracing::debug!(connection_id, "Received binary frame (expected JSON text)");
                    if let Some(reply) =
                        ServerEvent::error(ERROR_MALFORMED, "Expected a JSON text frame").to_message()
                    {
                        session.handle().send(reply);
                    }
                }
                Message::Ping(data) => {
                    session.handle().send(Message::Pong(data));
                }
                Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::info!(connection_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(connection_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Unregister before stopping the writer so no delivery targets a dead queue
    session.close(&state);
    writer_handle.abort();

    tracing::info!(connection_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}
