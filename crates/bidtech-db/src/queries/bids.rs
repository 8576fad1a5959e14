use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use bidtech_types::api::{BidWithRequirement, BidWithShop};
use bidtech_types::models::{Bid, BidStatus};

use super::OptionalExt;
use crate::models::{BidContext, RejectedSibling, parsed, timestamp};
use crate::{format_ts, is_constraint_violation};

const BID_COLUMNS: &str = "b.id, b.requirement_id, b.shop_id, b.price, b.warranty_details, \
     b.message, b.status, b.expiry_date, b.created_at";

fn bid_from_row(row: &Row<'_>) -> rusqlite::Result<Bid> {
    Ok(Bid {
        id: parsed(row, 0)?,
        requirement_id: parsed(row, 1)?,
        shop_id: parsed(row, 2)?,
        price: row.get(3)?,
        warranty_details: row.get(4)?,
        message: row.get(5)?,
        status: parsed(row, 6)?,
        expiry_date: timestamp(row, 7)?,
        created_at: timestamp(row, 8)?,
    })
}

/// Returns `false` when the shop already has a bid on this requirement.
pub fn insert(conn: &Connection, bid: &Bid) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO bids (id, requirement_id, shop_id, price, warranty_details, message, status, expiry_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            bid.id.to_string(),
            bid.requirement_id.to_string(),
            bid.shop_id.to_string(),
            bid.price,
            bid.warranty_details,
            bid.message,
            bid.status.as_str(),
            format_ts(&bid.expiry_date),
            format_ts(&bid.created_at),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        // A foreign key failure is also a constraint violation; only the
        // (requirement, shop) pair counts as a duplicate.
        Err(e) if is_constraint_violation(&e) => {
            if exists(conn, bid.requirement_id, bid.shop_id)? {
                Ok(false)
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub fn exists(conn: &Connection, requirement_id: Uuid, shop_id: Uuid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM bids WHERE requirement_id = ?1 AND shop_id = ?2",
            params![requirement_id.to_string(), shop_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<Bid>> {
    let sql = format!("SELECT {BID_COLUMNS} FROM bids b WHERE b.id = ?1");
    conn.query_row(&sql, [id.to_string()], bid_from_row).optional()
}

/// Bids on one requirement that have not expired, newest first, with the
/// bidding shop's identity and rating.
pub fn list_for_requirement(
    conn: &Connection,
    requirement_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<BidWithShop>> {
    let sql = format!(
        "SELECT {BID_COLUMNS}, s.shop_name, s.average_rating, s.total_reviews, u.email, u.phone
         FROM bids b
         JOIN shops s ON b.shop_id = s.id
         JOIN users u ON s.user_id = u.id
         WHERE b.requirement_id = ?1 AND b.expiry_date > ?2
         ORDER BY b.created_at DESC, b.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![requirement_id.to_string(), format_ts(&now)], |row| {
            Ok(BidWithShop {
                bid: bid_from_row(row)?,
                shop_name: row.get(9)?,
                average_rating: row.get(10)?,
                total_reviews: row.get(11)?,
                email: row.get(12)?,
                phone: row.get(13)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Everything a shop has bid on, newest first.
pub fn list_for_shop(conn: &Connection, shop_id: Uuid) -> Result<Vec<BidWithRequirement>> {
    let sql = format!(
        "SELECT {BID_COLUMNS}, r.title, r.budget, r.status, u.first_name, u.last_name, u.email
         FROM bids b
         JOIN requirements r ON b.requirement_id = r.id
         JOIN users u ON r.customer_id = u.id
         WHERE b.shop_id = ?1
         ORDER BY b.created_at DESC, b.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([shop_id.to_string()], |row| {
            Ok(BidWithRequirement {
                bid: bid_from_row(row)?,
                title: row.get(9)?,
                budget: row.get(10)?,
                requirement_status: parsed(row, 11)?,
                first_name: row.get(12)?,
                last_name: row.get(13)?,
                email: row.get(14)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn context(conn: &Connection, id: Uuid) -> Result<Option<BidContext>> {
    let sql = format!(
        "SELECT {BID_COLUMNS}, r.customer_id, s.user_id, s.shop_name
         FROM bids b
         JOIN requirements r ON b.requirement_id = r.id
         JOIN shops s ON b.shop_id = s.id
         WHERE b.id = ?1"
    );
    conn.query_row(&sql, [id.to_string()], |row| {
        Ok(BidContext {
            bid: bid_from_row(row)?,
            customer_id: parsed(row, 9)?,
            shop_owner_id: parsed(row, 10)?,
            shop_name: row.get(11)?,
        })
    })
    .optional()
}

/// The bid only if it is `accepted` and its requirement belongs to
/// `customer_id`.
pub fn accepted_for_customer(conn: &Connection, id: Uuid, customer_id: Uuid) -> Result<Option<BidContext>> {
    Ok(context(conn, id)?.filter(|ctx| {
        ctx.bid.status == BidStatus::Accepted && ctx.customer_id == customer_id
    }))
}

pub fn set_status(conn: &Connection, id: Uuid, status: BidStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE bids SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    Ok(changed > 0)
}

/// Rejects every other bid on the requirement and reports all of them,
/// including bids that were already rejected.
pub fn reject_siblings(conn: &Connection, requirement_id: Uuid, keep: Uuid) -> Result<Vec<RejectedSibling>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, s.user_id
         FROM bids b JOIN shops s ON b.shop_id = s.id
         WHERE b.requirement_id = ?1 AND b.id != ?2",
    )?;
    let siblings = stmt
        .query_map(params![requirement_id.to_string(), keep.to_string()], |row| {
            Ok(RejectedSibling {
                bid_id: parsed(row, 0)?,
                shop_owner_id: parsed(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    conn.execute(
        "UPDATE bids SET status = 'rejected' WHERE requirement_id = ?1 AND id != ?2",
        params![requirement_id.to_string(), keep.to_string()],
    )?;

    Ok(siblings)
}
