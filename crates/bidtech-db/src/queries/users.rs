use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use bidtech_types::models::User;

use super::OptionalExt;
use crate::format_ts;
use crate::models::{UserRow, parsed, timestamp};

const USER_COLUMNS: &str = "id, email, role, first_name, last_name, phone, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parsed(row, 0)?,
        email: row.get(1)?,
        role: parsed(row, 2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

pub fn insert(conn: &Connection, user: &User, password_hash: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, password, role, first_name, last_name, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.email,
            password_hash,
            user.role.as_str(),
            user.first_name,
            user.last_name,
            user.phone,
            format_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS}, password FROM users WHERE email = ?1");
    conn.query_row(&sql, [email], |row| {
        Ok(UserRow {
            user: user_from_row(row)?,
            password: row.get(7)?,
        })
    })
    .optional()
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], user_from_row).optional()
}

pub fn password_hash(conn: &Connection, id: Uuid) -> Result<Option<String>> {
    conn.query_row("SELECT password FROM users WHERE id = ?1", [id.to_string()], |row| row.get(0))
        .optional()
}

pub fn update_profile(
    conn: &Connection,
    id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET first_name = ?2, last_name = ?3, phone = ?4 WHERE id = ?1",
        params![id.to_string(), first_name, last_name, phone],
    )?;
    Ok(changed > 0)
}

pub fn update_password(conn: &Connection, id: Uuid, password_hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password = ?2 WHERE id = ?1",
        params![id.to_string(), password_hash],
    )?;
    Ok(changed > 0)
}
