use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use bidtech_types::api::{MyRequirement, RequirementListing};
use bidtech_types::models::{Requirement, RequirementStatus};

use super::OptionalExt;
use crate::format_ts;
use crate::models::{encode_tags, parsed, tags, timestamp};

const REQUIREMENT_COLUMNS: &str = "r.id, r.customer_id, r.title, r.description, r.budget, \
     r.tags, r.expiry_date, r.status, r.created_at";

fn requirement_from_row(row: &Row<'_>) -> rusqlite::Result<Requirement> {
    Ok(Requirement {
        id: parsed(row, 0)?,
        customer_id: parsed(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        budget: row.get(4)?,
        tags: tags(row, 5)?,
        expiry_date: timestamp(row, 6)?,
        status: parsed(row, 7)?,
        created_at: timestamp(row, 8)?,
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<RequirementListing> {
    Ok(RequirementListing {
        requirement: requirement_from_row(row)?,
        first_name: row.get(9)?,
        last_name: row.get(10)?,
        email: row.get(11)?,
    })
}

pub fn insert(conn: &Connection, req: &Requirement) -> Result<()> {
    conn.execute(
        "INSERT INTO requirements (id, customer_id, title, description, budget, tags, expiry_date, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            req.id.to_string(),
            req.customer_id.to_string(),
            req.title,
            req.description,
            req.budget,
            encode_tags(&req.tags),
            format_ts(&req.expiry_date),
            req.status.as_str(),
            format_ts(&req.created_at),
        ],
    )?;
    Ok(())
}

/// The requirement if it is `active` and not yet past its expiry.
pub fn open_for_bids(conn: &Connection, id: Uuid, now: DateTime<Utc>) -> Result<Option<Requirement>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM requirements r
         WHERE r.id = ?1 AND r.status = 'active' AND r.expiry_date > ?2"
    );
    conn.query_row(&sql, params![id.to_string(), format_ts(&now)], requirement_from_row)
        .optional()
}

/// The requirement only if `customer_id` owns it.
pub fn owned_by(conn: &Connection, id: Uuid, customer_id: Uuid) -> Result<Option<Requirement>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM requirements r
         WHERE r.id = ?1 AND r.customer_id = ?2"
    );
    conn.query_row(
        &sql,
        params![id.to_string(), customer_id.to_string()],
        requirement_from_row,
    )
    .optional()
}

pub fn listing(conn: &Connection, id: Uuid) -> Result<Option<RequirementListing>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS}, u.first_name, u.last_name, u.email
         FROM requirements r JOIN users u ON r.customer_id = u.id
         WHERE r.id = ?1"
    );
    conn.query_row(&sql, [id.to_string()], listing_from_row).optional()
}

/// Public board: `active` and unexpired, newest first. The expiry check is
/// applied even when the stored status still reads `active`.
pub fn list_active(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<RequirementListing>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS}, u.first_name, u.last_name, u.email
         FROM requirements r JOIN users u ON r.customer_id = u.id
         WHERE r.status = 'active' AND r.expiry_date > ?1
         ORDER BY r.created_at DESC, r.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([format_ts(&now)], listing_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_for_customer(conn: &Connection, customer_id: Uuid) -> Result<Vec<MyRequirement>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS},
            (SELECT COUNT(*) FROM bids b WHERE b.requirement_id = r.id AND b.status = 'pending')
         FROM requirements r
         WHERE r.customer_id = ?1
         ORDER BY r.created_at DESC, r.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([customer_id.to_string()], |row| {
            Ok(MyRequirement {
                requirement: requirement_from_row(row)?,
                pending_bids: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_status(conn: &Connection, id: Uuid, status: RequirementStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE requirements SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    Ok(changed > 0)
}

/// Direct overwrite restricted to the owner; `false` when the row is missing
/// or belongs to someone else.
pub fn set_status_owned(
    conn: &Connection,
    id: Uuid,
    customer_id: Uuid,
    status: RequirementStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE requirements SET status = ?3 WHERE id = ?1 AND customer_id = ?2",
        params![id.to_string(), customer_id.to_string(), status.as_str()],
    )?;
    Ok(changed > 0)
}
