use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use bidtech_types::models::Notification;

use crate::format_ts;
use crate::models::{parsed, parsed_opt, timestamp};

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: parsed(row, 0)?,
        user_id: parsed(row, 1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        kind: parsed(row, 4)?,
        is_read: row.get(5)?,
        related_id: parsed_opt(row, 6)?,
        created_at: timestamp(row, 7)?,
    })
}

pub fn insert(conn: &Connection, n: &Notification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, title, message, type, is_read, related_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            n.id.to_string(),
            n.user_id.to_string(),
            n.title,
            n.message,
            n.kind.as_str(),
            n.is_read,
            n.related_id.map(|id| id.to_string()),
            format_ts(&n.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_for_user(conn: &Connection, user_id: Uuid, limit: u32) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, message, type, is_read, related_id, created_at
         FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id.to_string(), limit], notification_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `false` when the notification does not exist or is someone else's.
pub fn mark_read(conn: &Connection, id: Uuid, user_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id.to_string(), user_id.to_string()],
    )?;
    Ok(changed > 0)
}

pub fn mark_all_read(conn: &Connection, user_id: Uuid) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        [user_id.to_string()],
    )?;
    Ok(changed)
}

pub fn unread_count(conn: &Connection, user_id: Uuid) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        [user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}
