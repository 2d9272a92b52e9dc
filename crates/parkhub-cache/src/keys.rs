//! Cache key builders for every memoized read.
//!
//! Keys are relative; [`ReadCache`](crate::ReadCache) adds its namespace
//! and generation prefix.

use uuid::Uuid;

/// Namespace shared by all read-cache entries.
pub const READ_NAMESPACE: &str = "read";

/// All lots with live counts.
pub fn lot_list() -> String {
    "lots".to_string()
}

/// One lot with its spots.
pub fn lot_detail(lot_id: Uuid) -> String {
    format!("lot:{lot_id}")
}

/// All users.
pub fn user_list() -> String {
    "users".to_string()
}

/// A user's reservation history.
pub fn user_reservations(user_id: Uuid) -> String {
    format!("user:{user_id}:reservations")
}

/// A user's analytics aggregates.
pub fn user_analytics(user_id: Uuid) -> String {
    format!("user:{user_id}:analytics")
}

/// Lot keyword search results.
pub fn lot_search(query: &str) -> String {
    format!("search:lots:{}", query.trim().to_lowercase())
}

/// User keyword search results.
pub fn user_search(query: &str) -> String {
    format!("search:users:{}", query.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_keys_normalise_query() {
        assert_eq!(lot_search("  MG Road "), "search:lots:mg road");
        assert_ne!(lot_search("x"), user_search("x"));
    }
}
