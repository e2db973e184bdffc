//! Notifications: the "notify identity X with message M" contract used by
//! status updates and broadcasts, plus the recipient-facing REST queries.

pub mod broadcast;
pub mod status;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::chat::delivery::deliver;
use crate::db::{self, models::Notification};
use crate::error::StoreError;
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;

/// Persist one notification for `recipient`, then push it if they are online.
/// Returns the stored row and whether a live push happened.
pub async fn notify_user(
    state: &AppState,
    recipient: &str,
    message: &str,
    link: Option<&str>,
) -> Result<(Notification, bool), StoreError> {
    let (recipient, message, link) = (
        recipient.to_string(),
        message.to_string(),
        link.map(str::to_string),
    );
    let notification = db::run(&state.db, move |conn| {
        db::notifications::insert_notification(conn, &recipient, &message, link.as_deref())
    })
    .await?;

    let pushed = deliver(
        &state.presence,
        &notification.recipient,
        &ServerEvent::NewNotification(notification.clone()),
    );
    Ok((notification, pushed))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub user_id: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

/// GET /api/notifications — caller's notifications, newest first. JWT auth required.
pub async fn get_notifications(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<Notification>>, StatusCode> {
    let rows = db::run(&state.db, move |conn| {
        db::notifications::notifications_for(conn, &claims.sub)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to load notifications");
        StatusCode::from(e)
    })?;

    Ok(Json(rows))
}

/// PUT /api/notifications/mark-read — mark all of the caller's notifications read.
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<MarkReadResponse>, StatusCode> {
    let updated = db::run(&state.db, move |conn| {
        db::notifications::mark_all_read(conn, &claims.sub)
    })
    .await
    .map_err(StatusCode::from)?;

    Ok(Json(MarkReadResponse { updated }))
}

/// POST /api/notifications — notify one user (proctor only).
/// Body: { "userId": "...", "message": "...", "link": "/optional" }
pub async fn create_notification(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), StatusCode> {
    claims.require_proctor()?;

    if body.user_id.trim().is_empty() || body.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (notification, pushed) =
        notify_user(&state, &body.user_id, &body.message, body.link.as_deref())
            .await
            .map_err(|e| {
                tracing::warn!(recipient = %body.user_id, error = %e, "Failed to store notification");
                StatusCode::from(e)
            })?;

    tracing::info!(
        recipient = %notification.recipient,
        created_by = %claims.sub,
        pushed,
        "Notification created"
    );

    Ok((StatusCode::CREATED, Json(notification)))
}
