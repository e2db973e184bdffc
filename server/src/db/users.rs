//! Roster mirrored from the user-account service. Broadcast fan-out
//! enumerates recipients from here.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Role, User};
use crate::db::{format_timestamp, now};
use crate::error::StoreError;

pub fn upsert_user(conn: &Connection, user: &User) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users (id, name, role, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role,
                                       updated_at = excluded.updated_at",
        params![user.id, user.name, user.role.as_str(), format_timestamp(now())],
    )?;
    Ok(())
}

pub fn find_user(conn: &Connection, user_id: &str) -> Result<Option<User>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, role FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    Ok(row.and_then(|(id, name, role)| {
        role.parse().ok().map(|role| User { id, name, role })
    }))
}

/// Ids of every roster member holding `role`.
pub fn user_ids_by_role(conn: &Connection, role: Role) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM users WHERE role = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![role.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
