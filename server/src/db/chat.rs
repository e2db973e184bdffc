//! Chat message persistence. Rows are written once and never updated.

use rusqlite::{params, Connection, Row};

use crate::db::models::ChatMessage;
use crate::db::{format_timestamp, now, parse_timestamp};
use crate::error::StoreError;

/// Persist a new chat message and return it with its generated id and timestamp.
pub fn insert_chat_message(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
    content: &str,
) -> Result<ChatMessage, StoreError> {
    let message = ChatMessage {
        id: uuid::Uuid::now_v7().to_string(),
        sender: sender_id.to_string(),
        receiver: receiver_id.to_string(),
        content: content.to_string(),
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO chat_messages (id, sender_id, receiver_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.id,
            message.sender,
            message.receiver,
            message.content,
            format_timestamp(message.created_at),
        ],
    )?;

    Ok(message)
}

/// All messages exchanged between two identities, oldest first.
pub fn chat_history(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<Vec<ChatMessage>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, content, created_at
         FROM chat_messages
         WHERE (sender_id = ?1 AND receiver_id = ?2)
            OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let messages = stmt
        .query_map(params![user_a, user_b], row_to_message)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(messages)
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let created_at: String = row.get(4)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        sender: row.get(1)?,
        receiver: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_timestamp(&created_at, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    #[test]
    fn test_history_covers_both_directions_in_order() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        insert_chat_message(&conn, "alice", "bob", "first").unwrap();
        insert_chat_message(&conn, "bob", "alice", "second").unwrap();
        insert_chat_message(&conn, "alice", "carol", "elsewhere").unwrap();
        insert_chat_message(&conn, "alice", "bob", "third").unwrap();

        let history = chat_history(&conn, "bob", "alice").unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_inserted_row_matches_history_row() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        let sent = insert_chat_message(&conn, "alice", "bob", "hello").unwrap();
        let history = chat_history(&conn, "alice", "bob").unwrap();
        assert_eq!(history, vec![sent]);
    }

    #[test]
    fn test_history_is_stable_across_reads() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        for i in 0..5 {
            insert_chat_message(&conn, "alice", "bob", &format!("msg {}", i)).unwrap();
        }

        let first = chat_history(&conn, "alice", "bob").unwrap();
        let second = chat_history(&conn, "alice", "bob").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_history_empty_for_strangers() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();
        assert!(chat_history(&conn, "nobody", "noone").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_timestamp_fails_history_read() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        let sent = insert_chat_message(&conn, "alice", "bob", "hello").unwrap();
        conn.execute(
            "UPDATE chat_messages SET created_at = 'yesterday' WHERE id = ?1",
            params![sent.id],
        )
        .unwrap();

        let err = chat_history(&conn, "alice", "bob").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(4, _, _))
        ));
    }
}
