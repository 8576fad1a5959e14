//! Requirement-to-shop matching.
//!
//! A verified shop matches when its tag set shares at least one tag with the
//! requirement. Comparison is exact string equality.

use std::collections::HashSet;

use bidtech_db::Connection;
use bidtech_db::models::ShopTags;
use bidtech_db::queries;

/// Trim, drop blanks, dedup keeping first occurrence.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn matching_shops<'a>(tags: &[String], shops: &'a [ShopTags]) -> Vec<&'a ShopTags> {
    if tags.is_empty() {
        return Vec::new();
    }
    let wanted: HashSet<&str> = tags.iter().map(String::as_str).collect();
    shops
        .iter()
        .filter(|shop| shop.tags.iter().any(|t| wanted.contains(t.as_str())))
        .collect()
}

/// Verified shops whose tags intersect `tags`.
pub fn find_matching_shops(conn: &Connection, tags: &[String]) -> anyhow::Result<Vec<ShopTags>> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let shops = queries::shops::verified_tags(conn)?;
    Ok(matching_shops(tags, &shops).into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn shop(tags: &[&str]) -> ShopTags {
        ShopTags {
            shop_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn strings(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn any_shared_tag_matches() {
        let shops = vec![shop(&["Mobile"]), shop(&["Laptop", "Desktop"])];
        let matched = matching_shops(&strings(&["Laptop", "Gaming"]), &shops);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].shop_id, shops[1].shop_id);
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let shops = vec![shop(&["laptop"])];
        assert!(matching_shops(&strings(&["Laptop"]), &shops).is_empty());
    }

    #[test]
    fn empty_tags_match_nothing() {
        let shops = vec![shop(&["Laptop"]), shop(&[])];
        assert!(matching_shops(&[], &shops).is_empty());
    }

    #[test]
    fn normalization() {
        let tags = strings(&[" Laptop ", "", "Gaming", "Laptop", "   "]);
        assert_eq!(normalize_tags(&tags), strings(&["Laptop", "Gaming"]));
    }

    #[test]
    fn only_verified_shops_are_candidates() {
        use crate::testing;
        use bidtech_types::models::VerificationStatus;

        let state = testing::state();
        let (_, verified) = testing::shop_owner(&state, "v@shop.lk", VerificationStatus::Verified, &["Laptop"]);
        testing::shop_owner(&state, "p@shop.lk", VerificationStatus::Pending, &["Laptop"]);
        testing::shop_owner(&state, "r@shop.lk", VerificationStatus::Rejected, &["Laptop"]);

        let matched = state
            .db
            .with_conn(|c| find_matching_shops(c, &strings(&["Laptop"])))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].shop_id, verified.id);
    }
}
