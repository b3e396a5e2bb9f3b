//! Time-ordered identifiers.
//!
//! Refresh token records and watchlist entries take UUIDv7 ids generated
//! app-side so they sort by creation time. User ids come from the same
//! helper in the in-memory store and from `gen_random_uuid()` in PostgreSQL.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_is_monotonic() {
        let a = uuidv7();
        let b = uuidv7();
        // later ids sort after earlier ones
        assert!(b >= a);
    }
}
