//! Query layer over the connection pool.
//!
//! Handlers never build SQL themselves; they go through these repositories,
//! which also own transactions, row locks and cascade deletes.

pub mod users;
pub mod listings;
pub mod bookings;
pub mod reviews;

pub use bookings::{BookingFilter, BookingRepository};
pub use listings::{ListingFilter, ListingRepository};
pub use reviews::{ReviewFilter, ReviewRepository};
pub use users::{NewUser, UserRepository};

/// LIMIT/OFFSET window of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32, max_size: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(default_size).clamp(1, max_size.max(1));
        Page {
            limit: i64::from(page_size),
            offset: (i64::from(page) - 1) * i64::from(page_size),
        }
    }
}

/// Turns a `?ordering=` value into an ORDER BY clause.
///
/// Only columns from `allowed` are accepted; a leading `-` means descending.
/// Unknown fields fall back to `default`. `id_column` breaks ties.
pub(crate) fn order_clause(
    ordering: Option<&str>,
    allowed: &[(&str, &str)],
    id_column: &str,
    default: &str,
) -> String {
    let Some(raw) = ordering.map(str::trim).filter(|o| !o.is_empty()) else {
        return default.to_string();
    };

    let (field, direction) = match raw.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (raw, "ASC"),
    };

    match allowed.iter().find(|(name, _)| *name == field) {
        Some((_, column)) => format!("{} {}, {} {}", column, direction, id_column, direction),
        None => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[(&str, &str)] = &[("price_per_night", "l.price_per_night"), ("created_at", "l.created_at")];

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::new(None, None, 20, 100), Page { limit: 20, offset: 0 });
        assert_eq!(Page::new(Some(3), Some(10), 20, 100), Page { limit: 10, offset: 20 });
        assert_eq!(Page::new(Some(0), Some(1000), 20, 100), Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(Some(2), Some(0), 20, 100), Page { limit: 1, offset: 1 });
    }

    #[test]
    fn ordering_is_whitelisted() {
        let default = "l.created_at DESC, l.id DESC";
        assert_eq!(
            order_clause(Some("-price_per_night"), FIELDS, "l.id", default),
            "l.price_per_night DESC, l.id DESC"
        );
        assert_eq!(
            order_clause(Some("created_at"), FIELDS, "l.id", default),
            "l.created_at ASC, l.id ASC"
        );
        assert_eq!(
            order_clause(Some("title; DROP TABLE users"), FIELDS, "l.id", default),
            default
        );
        assert_eq!(order_clause(None, FIELDS, "l.id", default), default);
    }
}
