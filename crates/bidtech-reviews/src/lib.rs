//! Review store.
//!
//! Reviews are kept apart from the ledger database: each review is a JSON
//! document in its own SQLite file, with the lookup keys copied into indexed
//! columns. The only integrity rule enforced here is one review per
//! (customer, bid); links back to bids and shops are not checked.

use anyhow::{Result, anyhow};
use chrono::SecondsFormat;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use bidtech_types::models::Review;

/// Shop pages show at most this many reviews.
pub const SHOP_PAGE_LIMIT: u32 = 50;

pub struct ReviewStore {
    conn: Mutex<Connection>,
}

impl ReviewStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init(&conn)?;

        info!("Review store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("Review store lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Stores the review. Returns `false` if this customer already reviewed
    /// this bid.
    pub fn insert(&self, review: &Review) -> Result<bool> {
        let doc = serde_json::to_string(review)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO reviews (id, customer_id, shop_id, bid_id, created_at, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    review.id.to_string(),
                    review.customer_id.to_string(),
                    review.shop_id.to_string(),
                    review.bid_id.to_string(),
                    review.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    doc,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn find_by_customer_and_bid(&self, customer_id: Uuid, bid_id: Uuid) -> Result<Option<Review>> {
        self.with_conn(|conn| {
            let docs = query_docs(
                conn,
                "SELECT doc FROM reviews WHERE customer_id = ?1 AND bid_id = ?2",
                params![customer_id.to_string(), bid_id.to_string()],
            )?;
            Ok(docs.into_iter().next())
        })
    }

    /// Newest first, capped at `limit`.
    pub fn list_for_shop(&self, shop_id: Uuid, limit: u32) -> Result<Vec<Review>> {
        self.with_conn(|conn| {
            query_docs(
                conn,
                "SELECT doc FROM reviews WHERE shop_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                params![shop_id.to_string(), limit],
            )
        })
    }

    /// Newest first, uncapped.
    pub fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Review>> {
        self.with_conn(|conn| {
            query_docs(
                conn,
                "SELECT doc FROM reviews WHERE customer_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
                params![customer_id.to_string()],
            )
        })
    }

    /// Every rating ever given to the shop.
    pub fn ratings_for_shop(&self, shop_id: Uuid) -> Result<Vec<u8>> {
        self.with_conn(|conn| {
            let docs = query_docs(
                conn,
                "SELECT doc FROM reviews WHERE shop_id = ?1",
                params![shop_id.to_string()],
            )?;
            Ok(docs.into_iter().map(|r| r.rating).collect())
        })
    }
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reviews (
            id          TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            shop_id     TEXT NOT NULL,
            bid_id      TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            doc         TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_customer_bid
            ON reviews(customer_id, bid_id);

        CREATE INDEX IF NOT EXISTS idx_reviews_shop
            ON reviews(shop_id, created_at);
        ",
    )?;
    Ok(())
}

fn query_docs(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Review>> {
    let mut stmt = conn.prepare(sql)?;
    let docs = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    docs.iter()
        .map(|doc| serde_json::from_str(doc).map_err(|e| anyhow!("Corrupt review document: {}", e)))
        .collect()
}
