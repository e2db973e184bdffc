//! Notification persistence: insert, newest-first listing, bulk mark-read.

use rusqlite::{params, Connection, Row};

use crate::db::models::Notification;
use crate::db::{format_timestamp, now, parse_timestamp};
use crate::error::StoreError;

pub fn insert_notification(
    conn: &Connection,
    recipient_id: &str,
    message: &str,
    link: Option<&str>,
) -> Result<Notification, StoreError> {
    let notification = Notification {
        id: uuid::Uuid::now_v7().to_string(),
        recipient: recipient_id.to_string(),
        message: message.to_string(),
        link: link.map(str::to_string),
        is_read: false,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO notifications (id, recipient_id, message, link, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![
            notification.id,
            notification.recipient,
            notification.message,
            notification.link,
            format_timestamp(notification.created_at),
        ],
    )?;

    Ok(notification)
}

/// Every notification for one recipient, newest first.
pub fn notifications_for(
    conn: &Connection,
    recipient_id: &str,
) -> Result<Vec<Notification>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, message, link, is_read, created_at
         FROM notifications
         WHERE recipient_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt
        .query_map(params![recipient_id], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Flip every unread notification of `recipient_id` to read.
/// Returns how many rows changed.
pub fn mark_all_read(conn: &Connection, recipient_id: &str) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient_id],
    )?;
    Ok(changed)
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let created_at: String = row.get(5)?;
    Ok(Notification {
        id: row.get(0)?,
        recipient: row.get(1)?,
        message: row.get(2)?,
        link: row.get(3)?,
        is_read: row.get(4)?,
        created_at: parse_timestamp(&created_at, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    #[test]
    fn test_notifications_listed_newest_first() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        insert_notification(&conn, "bob", "older", None).unwrap();
        insert_notification(&conn, "bob", "newer", Some("/student/documents")).unwrap();
        insert_notification(&conn, "carol", "not bob's", None).unwrap();

        let rows = notifications_for(&conn, "bob").unwrap();
        let messages: Vec<&str> = rows.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["newer", "older"]);
        assert_eq!(rows[0].link.as_deref(), Some("/student/documents"));
        assert!(rows.iter().all(|n| !n.is_read));
    }

    #[test]
    fn test_mark_all_read_is_scoped_to_recipient() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        insert_notification(&conn, "bob", "one", None).unwrap();
        insert_notification(&conn, "bob", "two", None).unwrap();
        insert_notification(&conn, "carol", "three", None).unwrap();

        assert_eq!(mark_all_read(&conn, "bob").unwrap(), 2);
        assert_eq!(mark_all_read(&conn, "bob").unwrap(), 0);

        assert!(notifications_for(&conn, "bob").unwrap().iter().all(|n| n.is_read));
        assert!(notifications_for(&conn, "carol").unwrap().iter().all(|n| !n.is_read));
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        let row = insert_notification(&conn, "bob", "one", None).unwrap();
        conn.execute(
            "UPDATE notifications SET created_at = '' WHERE id = ?1",
            params![row.id],
        )
        .unwrap();

        assert!(matches!(
            notifications_for(&conn, "bob"),
            Err(StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(5, _, _)))
        ));
    }
}
