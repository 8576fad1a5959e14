use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use bidtech_types::api::ShopListing;
use bidtech_types::models::{Shop, VerificationStatus};

use super::OptionalExt;
use crate::format_ts;
use crate::models::{ShopTags, encode_tags, parsed, tags, timestamp};

const SHOP_COLUMNS: &str = "s.id, s.user_id, s.shop_name, s.address, s.business_license, \
     s.verification_status, s.tags, s.average_rating, s.total_reviews, s.created_at";

fn shop_from_row(row: &Row<'_>) -> rusqlite::Result<Shop> {
    Ok(Shop {
        id: parsed(row, 0)?,
        user_id: parsed(row, 1)?,
        shop_name: row.get(2)?,
        address: row.get(3)?,
        business_license: row.get(4)?,
        verification_status: parsed(row, 5)?,
        tags: tags(row, 6)?,
        average_rating: row.get(7)?,
        total_reviews: row.get(8)?,
        created_at: timestamp(row, 9)?,
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ShopListing> {
    Ok(ShopListing {
        shop: shop_from_row(row)?,
        email: row.get(10)?,
        phone: row.get(11)?,
    })
}

pub fn insert(conn: &Connection, shop: &Shop) -> Result<()> {
    conn.execute(
        "INSERT INTO shops (id, user_id, shop_name, address, business_license,
                            verification_status, tags, average_rating, total_reviews, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            shop.id.to_string(),
            shop.user_id.to_string(),
            shop.shop_name,
            shop.address,
            shop.business_license,
            shop.verification_status.as_str(),
            encode_tags(&shop.tags),
            shop.average_rating,
            shop.total_reviews,
            format_ts(&shop.created_at),
        ],
    )?;
    Ok(())
}

pub fn by_owner(conn: &Connection, user_id: Uuid) -> Result<Option<Shop>> {
    let sql = format!("SELECT {SHOP_COLUMNS} FROM shops s WHERE s.user_id = ?1");
    conn.query_row(&sql, [user_id.to_string()], shop_from_row).optional()
}

pub fn id_for_owner(conn: &Connection, user_id: Uuid) -> Result<Option<Uuid>> {
    conn.query_row(
        "SELECT id FROM shops WHERE user_id = ?1",
        [user_id.to_string()],
        |row| parsed(row, 0),
    )
    .optional()
}

pub fn listing(conn: &Connection, shop_id: Uuid) -> Result<Option<ShopListing>> {
    let sql = format!(
        "SELECT {SHOP_COLUMNS}, u.email, u.phone
         FROM shops s JOIN users u ON s.user_id = u.id
         WHERE s.id = ?1"
    );
    conn.query_row(&sql, [shop_id.to_string()], listing_from_row).optional()
}

/// Best rated first, newest first among equals.
pub fn list_verified(conn: &Connection) -> Result<Vec<ShopListing>> {
    let sql = format!(
        "SELECT {SHOP_COLUMNS}, u.email, u.phone
         FROM shops s JOIN users u ON s.user_id = u.id
         WHERE s.verification_status = 'verified'
         ORDER BY s.average_rating DESC, s.created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], listing_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every verified shop's tag set, for the matching filter.
pub fn verified_tags(conn: &Connection) -> Result<Vec<ShopTags>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, tags FROM shops WHERE verification_status = 'verified'",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ShopTags {
                shop_id: parsed(row, 0)?,
                user_id: parsed(row, 1)?,
                tags: tags(row, 2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_profile(
    conn: &Connection,
    user_id: Uuid,
    shop_name: &str,
    address: Option<&str>,
    tags: &[String],
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE shops SET shop_name = ?2, address = ?3, tags = ?4 WHERE user_id = ?1",
        params![user_id.to_string(), shop_name, address, encode_tags(tags)],
    )?;
    Ok(changed > 0)
}

pub fn set_verification(conn: &Connection, shop_id: Uuid, status: VerificationStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE shops SET verification_status = ?2 WHERE id = ?1",
        params![shop_id.to_string(), status.as_str()],
    )?;
    Ok(changed > 0)
}

/// Only the rating aggregator writes these two columns.
pub fn set_rating(conn: &Connection, shop_id: Uuid, average_rating: f64, total_reviews: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE shops SET average_rating = ?2, total_reviews = ?3 WHERE id = ?1",
        params![shop_id.to_string(), average_rating, total_reviews],
    )?;
    Ok(changed > 0)
}
