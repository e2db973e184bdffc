//! Status-change notifications raised by the document and project workflows.
//! Each status update produces exactly one notification for the student.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::models::Notification;
use crate::notify::notify_user;
use crate::state::AppState;

/// What kind of submission changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Document,
    Project,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub kind: SubmissionKind,
    pub student_id: String,
    /// File name or project title shown to the student.
    pub title: String,
    /// New status, e.g. "approved", "rejected", "graded".
    pub status: String,
}

impl StatusChange {
    pub fn message(&self) -> String {
        match self.kind {
            SubmissionKind::Document => {
                format!("Your document '{}' has been {}.", self.title, self.status)
            }
            SubmissionKind::Project => {
                format!("Your project '{}' has been {}.", self.title, self.status)
            }
        }
    }

    /// Page the student lands on when opening the notification.
    pub fn link(&self) -> &'static str {
        match self.kind {
            SubmissionKind::Document => "/student/documents",
            SubmissionKind::Project => "/student/projects",
        }
    }
}

/// POST /api/notifications/status — status-change trigger (proctor only).
/// Body: { "kind": "document", "studentId": "...", "title": "...", "status": "approved" }
pub async fn notify_status_change(
    State(state): State<AppState>,
    claims: Claims,
    Json(change): Json<StatusChange>,
) -> Result<(StatusCode, Json<Notification>), StatusCode> {
    claims.require_proctor()?;

    if change.student_id.trim().is_empty() || change.status.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (notification, pushed) =
        notify_user(&state, &change.student_id, &change.message(), Some(change.link()))
            .await
            .map_err(|e| {
                tracing::warn!(student_id = %change.student_id, error = %e, "Failed to store status notification");
                StatusCode::from(e)
            })?;

    tracing::info!(
        student_id = %change.student_id,
        kind = ?change.kind,
        status = %change.status,
        pushed,
        "Status change notified"
    );

    Ok((StatusCode::CREATED, Json(notification)))
}
