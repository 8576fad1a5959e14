use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Ledger DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('customer', 'shop_owner')),
                first_name  TEXT,
                last_name   TEXT,
                phone       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE shops (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                shop_name           TEXT NOT NULL,
                address             TEXT,
                business_license    TEXT,
                verification_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (verification_status IN ('pending', 'verified', 'rejected')),
                tags                TEXT NOT NULL DEFAULT '[]',
                average_rating      REAL NOT NULL DEFAULT 0,
                total_reviews       INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_shops_verification ON shops(verification_status);

            CREATE TABLE requirements (
                id          TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT,
                budget      REAL NOT NULL,
                tags        TEXT NOT NULL DEFAULT '[]',
                expiry_date TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'expired', 'fulfilled')),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_requirements_status ON requirements(status, expiry_date);
            CREATE INDEX idx_requirements_customer ON requirements(customer_id, created_at);

            CREATE TABLE bids (
                id               TEXT PRIMARY KEY,
                requirement_id   TEXT NOT NULL REFERENCES requirements(id) ON DELETE CASCADE,
                shop_id          TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                price            REAL NOT NULL,
                warranty_details TEXT,
                message          TEXT,
                status           TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'accepted', 'rejected', 'expired')),
                expiry_date      TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                UNIQUE (requirement_id, shop_id)
            );

            CREATE INDEX idx_bids_shop ON bids(shop_id, created_at);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                type        TEXT NOT NULL CHECK (type IN (
                    'bid_received', 'bid_accepted', 'bid_rejected',
                    'requirement_matched', 'review_received'
                )),
                is_read     INTEGER NOT NULL DEFAULT 0,
                related_id  TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, is_read, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
