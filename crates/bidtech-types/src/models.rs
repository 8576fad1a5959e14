use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted status string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Status-like enums are stored as their snake_case names in SQLite and
/// serialized the same way on the wire.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

string_enum!(
    /// Fixed at registration.
    Role, "role" {
        Customer => "customer",
        ShopOwner => "shop_owner",
    }
);

string_enum!(
    VerificationStatus, "verification status" {
        Pending => "pending",
        Verified => "verified",
        Rejected => "rejected",
    }
);

string_enum!(
    RequirementStatus, "requirement status" {
        Active => "active",
        Expired => "expired",
        Fulfilled => "fulfilled",
    }
);

string_enum!(
    BidStatus, "bid status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Expired => "expired",
    }
);

string_enum!(
    NotificationKind, "notification type" {
        BidReceived => "bid_received",
        BidAccepted => "bid_accepted",
        BidRejected => "bid_rejected",
        RequirementMatched => "requirement_matched",
        ReviewReceived => "review_received",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// "first last", trimmed; `None` when both parts are blank.
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shop_name: String,
    pub address: Option<String>,
    pub business_license: Option<String>,
    pub verification_status: VerificationStatus,
    pub tags: Vec<String>,
    pub average_rating: f64,
    pub total_reviews: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub budget: f64,
    pub tags: Vec<String>,
    pub expiry_date: DateTime<Utc>,
    pub status: RequirementStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub shop_id: Uuid,
    pub price: f64,
    pub warranty_details: Option<String>,
    pub message: Option<String>,
    pub status: BidStatus,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub related_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Reviews live in their own store; `bid_id` and `shop_id` are not
/// enforced against the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub bid_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
}
