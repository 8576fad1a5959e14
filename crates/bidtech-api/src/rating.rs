//! Shop rating aggregation.
//!
//! The shop's `average_rating` / `total_reviews` are recomputed from the full
//! set of its reviews after every accepted review, never incrementally.

use tracing::debug;
use uuid::Uuid;

use bidtech_db::queries;

use crate::auth::AppStateInner;
use crate::error::ApiError;

/// Mean rounded to two decimals; `None` for no ratings.
pub fn average(ratings: &[u8]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
    let mean = f64::from(sum) / ratings.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

/// Rescans the shop's reviews and stores the new aggregate. A shop with no
/// reviews keeps whatever value it has.
pub fn refresh_shop_rating(state: &AppStateInner, shop_id: Uuid) -> Result<(), ApiError> {
    let ratings = state.reviews.ratings_for_shop(shop_id)?;
    let Some(avg) = average(&ratings) else {
        return Ok(());
    };
    let total = ratings.len() as i64;

    state
        .db
        .with_conn_mut(|c| queries::shops::set_rating(c, shop_id, avg, total))?;
    debug!("Shop {} rating now {} over {} review(s)", shop_id, avg, total);
    Ok(())
}
