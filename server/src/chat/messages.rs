//! One-to-one chat: persist-then-deliver send path and the history query.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::middleware::Claims;
use crate::chat::delivery::deliver;
use crate::db::{self, models::ChatMessage};
use crate::error::StoreError;
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;

/// Persist a chat message, then push the stored copy to the receiver and
/// echo it to the sender.
///
/// Nothing is pushed unless the write succeeded. The echo carries the
/// generated id and timestamp so the sender renders the canonical record.
pub async fn send_chat_message(
    state: &AppState,
    sender_id: &str,
    receiver_id: &str,
    content: &str,
) -> Result<ChatMessage, StoreError> {
    let (sender, receiver, body) = (
        sender_id.to_string(),
        receiver_id.to_string(),
        content.to_string(),
    );
    let message = db::run(&state.db, move |conn| {
        db::chat::insert_chat_message(conn, &sender, &receiver, &body)
    })
    .await?;

    let event = ServerEvent::ReceiveMessage(message.clone());
    let to_receiver = deliver(&state.presence, &message.receiver, &event);
    let to_sender = deliver(&state.presence, &message.sender, &event);

    tracing::debug!(
        message_id = %message.id,
        sender = %message.sender,
        receiver = %message.receiver,
        to_receiver,
        to_sender,
        "Chat message stored"
    );

    Ok(message)
}

/// GET /api/chat/history/{user_id}
/// Messages between the caller and `user_id`, oldest first. JWT auth required.
pub async fn get_chat_history(
    State(state): State<AppState>,
    claims: Claims,
    Path(other_user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    let history = db::run(&state.db, move |conn| {
        db::chat::chat_history(conn, &claims.sub, &other_user_id)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to load chat history");
        StatusCode::from(e)
    })?;

    Ok(Json(history))
}
