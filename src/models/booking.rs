use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{ListingSummary, ReviewResponse, UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Pending and confirmed bookings hold their dates; the rest do not.
    pub fn holds_dates(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Booking {
    pub id: i64,
    pub listing_id: i64,
    pub guest_id: i64,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guests_count: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: i64,
    pub listing_id: i64,
    pub listing: Option<ListingSummary>,
    pub guest: Option<UserSummary>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guests_count: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub review: Option<ReviewResponse>,
}

impl BookingResponse {
    pub fn new(
        booking: Booking,
        listing: Option<ListingSummary>,
        guest: Option<UserSummary>,
        review: Option<ReviewResponse>,
    ) -> Self {
        BookingResponse {
            id: booking.id,
            listing_id: booking.listing_id,
            listing,
            guest,
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            guests_count: booking.guests_count,
            total_price: booking.total_price,
            status: booking.status,
            created_at: booking.created_at,
            review,
        }
    }
}

// POST /api/bookings, PUT /api/bookings/{id}
//
// total_price is derived server-side, so it is not part of the payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingPayload {
    #[validate(range(min = 1))]
    pub listing_id: i64,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    #[validate(range(min = 1))]
    pub guests_count: i32,
    /// Pending on create; left as is on PUT when omitted.
    pub status: Option<BookingStatus>,
}

// PATCH /api/bookings/{id}
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BookingPatch {
    #[validate(range(min = 1))]
    pub listing_id: Option<i64>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub guests_count: Option<i32>,
    pub status: Option<BookingStatus>,
}

impl From<BookingPayload> for BookingPatch {
    fn from(p: BookingPayload) -> Self {
        BookingPatch {
            listing_id: Some(p.listing_id),
            check_in_date: Some(p.check_in_date),
            check_out_date: Some(p.check_out_date),
            guests_count: Some(p.guests_count),
            status: p.status,
        }
    }
}

impl Booking {
    /// Returns the booking as it would look after `patch`, without touching
    /// total_price.
    pub fn patched(&self, patch: &BookingPatch) -> Booking {
        Booking {
            listing_id: patch.listing_id.unwrap_or(self.listing_id),
            check_in_date: patch.check_in_date.unwrap_or(self.check_in_date),
            check_out_date: patch.check_out_date.unwrap_or(self.check_out_date),
            guests_count: patch.guests_count.unwrap_or(self.guests_count),
            status: patch.status.unwrap_or(self.status),
            ..self.clone()
        }
    }

    /// True when the change affects the price: another listing or other dates.
    pub fn reprices(&self, other: &Booking) -> bool {
        self.listing_id != other.listing_id
            || self.check_in_date != other.check_in_date
            || self.check_out_date != other.check_out_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn booking() -> Booking {
        Booking {
            id: 7,
            listing_id: 1,
            guest_id: 2,
            check_in_date: date("2024-01-01"),
            check_out_date: date("2024-01-04"),
            guests_count: 2,
            total_price: dec!(300.00),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_defaults_to_pending() {
        let p: BookingPayload = serde_json::from_value(json!({
            "listing_id": 1,
            "check_in_date": "2024-01-01",
            "check_out_date": "2024-01-04",
            "guests_count": 2
        }))
        .unwrap();
        assert_eq!(p.status, None);
        assert_eq!(p.status.unwrap_or_default(), BookingStatus::Pending);
    }

    #[test]
    fn put_without_status_keeps_current_status() {
        let current = Booking {
            status: BookingStatus::Confirmed,
            ..booking()
        };
        let p: BookingPayload = serde_json::from_value(json!({
            "listing_id": 1,
            "check_in_date": "2024-01-02",
            "check_out_date": "2024-01-05",
            "guests_count": 3
        }))
        .unwrap();

        let next = current.patched(&BookingPatch::from(p));
        assert_eq!(next.status, BookingStatus::Confirmed);
        assert_eq!(next.guests_count, 3);
    }

    #[test]
    fn client_total_price_is_ignored() {
        let p: BookingPayload = serde_json::from_value(json!({
            "listing_id": 1,
            "check_in_date": "2024-01-01",
            "check_out_date": "2024-01-04",
            "guests_count": 2,
            "total_price": "1.00"
        }))
        .unwrap();
        assert_eq!(p.guests_count, 2);
    }

    #[test]
    fn only_pending_and_confirmed_hold_dates() {
        assert!(BookingStatus::Pending.holds_dates());
        assert!(BookingStatus::Confirmed.holds_dates());
        assert!(!BookingStatus::Cancelled.holds_dates());
        assert!(!BookingStatus::Completed.holds_dates());
    }

    #[test]
    fn status_change_does_not_reprice() {
        let current = booking();
        let next = current.patched(&BookingPatch {
            status: Some(BookingStatus::Completed),
            ..Default::default()
        });
        assert_eq!(next.status, BookingStatus::Completed);
        assert!(!current.reprices(&next));
    }

    #[test]
    fn date_change_reprices() {
        let current = booking();
        let next = current.patched(&BookingPatch {
            check_out_date: Some(date("2024-01-06")),
            ..Default::default()
        });
        assert_eq!(next.check_in_date, current.check_in_date);
        assert!(current.reprices(&next));
    }

    #[test]
    fn zero_guests_is_rejected() {
        let patch = BookingPatch {
            guests_count: Some(0),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}
