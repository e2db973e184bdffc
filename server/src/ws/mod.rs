pub mod actor;
pub mod handler;
pub mod protocol;
pub mod session;

use axum::extract::ws::{CloseFrame, Message};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// The connection's writer task drains the matching receiver into the socket.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Process-unique id of one accepted WebSocket.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable reference to one live connection's outbound queue.
///
/// Holding a handle does not keep the socket open: once the connection's
/// writer task ends every send through the handle fails.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: ConnectionSender,
}

impl ConnectionHandle {
    /// Wrap a fresh outbound channel with a new connection id.
    pub fn new(tx: ConnectionSender) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for the writer task. Returns false if the connection is gone.
    pub fn send(&self, msg: Message) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Queue a Close frame; the peer's close reply ends the reader loop.
    pub fn close(&self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let _ = self.tx.send(Message::Close(Some(frame)));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// Build a handle plus the receiver its writer task will drain.
pub fn connection_channel() -> (ConnectionHandle, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ConnectionHandle::new(tx), rx)
}
