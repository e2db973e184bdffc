//! Roster sync from the user-account service.
//! Broadcasts enumerate their recipient class from this table.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::{
    self,
    models::{Role, User},
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub name: String,
    pub role: Role,
}

/// PUT /api/directory/{user_id} — create or update a roster entry (proctor only).
/// Body: { "name": "...", "role": "student"|"proctor" }
pub async fn upsert_directory_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<String>,
    Json(body): Json<UpsertUserRequest>,
) -> Result<Json<User>, StatusCode> {
    claims.require_proctor()?;

    if user_id.trim().is_empty() || body.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user = User {
        id: user_id,
        name: body.name.trim().to_string(),
        role: body.role,
    };
    let stored = user.clone();
    db::run(&state.db, move |conn| db::users::upsert_user(conn, &stored))
        .await
        .map_err(StatusCode::from)?;

    tracing::info!(user_id = %user.id, role = %user.role, "Roster entry updated");
    Ok(Json(user))
}

/// GET /api/directory/{user_id} — look up a roster entry. JWT auth required.
pub async fn get_directory_user(
    State(state): State<AppState>,
    _claims: Claims,
    Path(user_id): Path<String>,
) -> Result<Json<User>, StatusCode> {
    let user = db::run(&state.db, move |conn| db::users::find_user(conn, &user_id))
        .await
        .map_err(StatusCode::from)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(user))
}
