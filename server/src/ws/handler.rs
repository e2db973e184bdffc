use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid or missing
/// 4005 = session replaced (see ws::session)
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws[?token=JWT]
/// WebSocket upgrade endpoint. A token, when given, pins the identity the
/// connection may bind to; it is mandatory when `require_ws_auth` is set.
/// On auth failure, upgrades then immediately closes with the matching code.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = match params.token {
        Some(token) => token,
        None if state.realtime.require_ws_auth => {
            tracing::warn!("WebSocket upgrade without required token");
            return reject(ws, CLOSE_TOKEN_INVALID, "Token required");
        }
        None => {
            return ws.on_upgrade(move |socket| handle_connection(socket, state, None));
        }
    };

    match jwt::validate_access_token(&state.jwt_secret, &token) {
        Ok(claims) => {
            tracing::info!(user_id = %claims.sub, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| handle_connection(socket, state, Some(claims.sub)))
        }
        Err(err) => {
            let (close_code, reason) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };

            tracing::warn!(
                close_code = close_code,
                reason = reason,
                "WebSocket auth failed"
            );
            reject(ws, close_code, reason)
        }
    }
}

/// Upgrade the connection, then immediately close with the error code.
fn reject(ws: WebSocketUpgrade, close_code: u16, reason: &'static str) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        let close_frame = CloseFrame {
            code: close_code,
            reason: reason.into(),
        };
        let _ = socket.send(Message::Close(Some(close_frame))).await;
    })
}

async fn handle_connection(socket: WebSocket, state: AppState, authenticated: Option<String>) {
    actor::run_connection(socket, state, authenticated).await;
}
