//! Row types and column decoders. Rows are decoded straight into the
//! bidtech-types models; the structs here only cover shapes that never
//! leave the server (credentials, lifecycle lookups).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use bidtech_types::models::{Bid, User};

/// A user together with the stored password hash.
pub struct UserRow {
    pub user: User,
    pub password: String,
}

/// Minimal shop projection used by the matching filter.
#[derive(Debug, Clone)]
pub struct ShopTags {
    pub shop_id: Uuid,
    pub user_id: Uuid,
    pub tags: Vec<String>,
}

/// A bid joined with the parties needed to authorize and notify.
pub struct BidContext {
    pub bid: Bid,
    pub customer_id: Uuid,
    pub shop_owner_id: Uuid,
    pub shop_name: String,
}

/// A sibling bid left `rejected` by an acceptance.
#[derive(Debug, Clone)]
pub struct RejectedSibling {
    pub bid_id: Uuid,
    pub shop_owner_id: Uuid,
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Decode a text column through `FromStr` (UUIDs, status enums).
pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parsed_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    crate::parse_ts(&text).map_err(|e| conversion_error(idx, e))
}

/// Tags are stored as a JSON array of strings.
pub(crate) fn tags(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}
