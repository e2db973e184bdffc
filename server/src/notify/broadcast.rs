//! Broadcast fan-out: one notification per member of a recipient class.
//!
//! Recipients are processed one after another. Each recipient's write and
//! push is independent; a failed write is logged and skipped so the rest of
//! the class still hears about it. There is no rollback across recipients.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::{self, models::Role};
use crate::error::StoreError;
use crate::notify::notify_user;
use crate::state::AppState;

/// Per-broadcast tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    /// Roster members in the target class
    pub recipients: usize,
    pub persisted: usize,
    /// Live pushes (recipients online at the time of their turn)
    pub delivered: usize,
    pub failed: usize,
}

/// Text stored for an announcement.
pub fn announcement_text(sender_name: &str, content: &str) -> String {
    format!("Announcement from {}: {}", sender_name, content)
}

/// Persist and deliver `message` to every roster member holding `role`.
///
/// Only a failure to enumerate the class is returned as an error; per
/// recipient failures are counted in the report.
pub async fn broadcast_to_role(
    state: &AppState,
    role: Role,
    message: &str,
    link: Option<&str>,
) -> Result<BroadcastReport, StoreError> {
    let recipients = db::run(&state.db, move |conn| db::users::user_ids_by_role(conn, role)).await?;

    let mut report = BroadcastReport {
        recipients: recipients.len(),
        ..Default::default()
    };

    for recipient in &recipients {
        match notify_user(state, recipient, message, link).await {
            Ok((_, pushed)) => {
                report.persisted += 1;
                if pushed {
                    report.delivered += 1;
                }
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    recipient = %recipient,
                    error = %e,
                    "Broadcast notification not stored, skipping recipient"
                );
            }
        }
    }

    tracing::info!(
        role = %role,
        recipients = report.recipients,
        persisted = report.persisted,
        delivered = report.delivered,
        failed = report.failed,
        "Broadcast complete"
    );

    Ok(report)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub sender_name: String,
    pub content: String,
}

/// POST /api/broadcast — announce to the configured recipient class (proctor only).
/// Body: { "senderName": "...", "content": "..." }
pub async fn post_broadcast(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<BroadcastReport>, StatusCode> {
    claims.require_proctor()?;

    if body.sender_name.trim().is_empty() || body.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let text = announcement_text(&body.sender_name, &body.content);
    let report = broadcast_to_role(
        &state,
        state.realtime.broadcast_role,
        &text,
        Some(state.realtime.broadcast_link.as_str()),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to enumerate broadcast recipients");
        StatusCode::from(e)
    })?;

    Ok(Json(report))
}
