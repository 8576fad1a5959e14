//! Query functions take a plain `&Connection` so they compose inside
//! `Database::transaction` as well as the pooled read/write helpers.

pub mod bids;
pub mod notifications;
pub mod requirements;
pub mod shops;
pub mod users;

use anyhow::Result;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    use bidtech_types::models::{
        Bid, BidStatus, Requirement, RequirementStatus, Role, Shop, User, VerificationStatus,
    };

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    pub fn user(conn: &Connection, email: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            first_name: Some("Kasun".into()),
            last_name: Some("Perera".into()),
            phone: Some("0771234567".into()),
            created_at: t0(),
        };
        super::users::insert(conn, &user, "hash").unwrap();
        user
    }

    pub fn shop(conn: &Connection, email: &str, status: VerificationStatus, tags: &[&str]) -> (User, Shop) {
        let owner = user(conn, email, Role::ShopOwner);
        let shop = Shop {
            id: Uuid::new_v4(),
            user_id: owner.id,
            shop_name: format!("{email} store"),
            address: None,
            business_license: None,
            verification_status: status,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            average_rating: 0.0,
            total_reviews: 0,
            created_at: t0(),
        };
        super::shops::insert(conn, &shop).unwrap();
        (owner, shop)
    }

    pub fn requirement(conn: &Connection, customer: Uuid, created_at: DateTime<Utc>, expires_in: Duration) -> Requirement {
        let req = Requirement {
            id: Uuid::new_v4(),
            customer_id: customer,
            title: "Gaming laptop".into(),
            description: None,
            budget: 250_000.0,
            tags: vec!["Laptop".into()],
            expiry_date: created_at + expires_in,
            status: RequirementStatus::Active,
            created_at,
        };
        super::requirements::insert(conn, &req).unwrap();
        req
    }

    pub fn bid(conn: &Connection, requirement: Uuid, shop: Uuid, created_at: DateTime<Utc>) -> Bid {
        let bid = Bid {
            id: Uuid::new_v4(),
            requirement_id: requirement,
            shop_id: shop,
            price: 240_000.0,
            warranty_details: Some("1 year".into()),
            message: None,
            status: BidStatus::Pending,
            expiry_date: created_at + Duration::days(3),
            created_at,
        };
        assert!(super::bids::insert(conn, &bid).unwrap());
        bid
    }
}
