//! availability.rs
//!
//! Проверка бронирования перед записью:
//! - дата выезда строго позже даты заезда;
//! - число гостей не превышает вместимость объявления;
//! - нет пересечения с активными (pending/confirmed) бронями того же объявления.
//!
//! Граница включительная: заезд в день чужого выезда считается конфликтом.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::BookingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BookingValidationError {
    #[error("Check-out date must be after check-in date")]
    InvalidDateRange,

    #[error("This listing can only accommodate {max_guests} guests")]
    GuestCountExceeded { max_guests: i32 },

    #[error("This listing is already booked for the selected dates")]
    DateConflict,
}

/// Booking being created or updated. `exclude_id` is the booking's own id on
/// update so that it never conflicts with itself.
#[derive(Debug, Clone, Copy)]
pub struct BookingCandidate {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests_count: i32,
    pub exclude_id: Option<i64>,
}

/// Date range already taken on the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedRange {
    pub id: i64,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub status: BookingStatus,
}

pub fn ranges_overlap(
    a_in: NaiveDate,
    a_out: NaiveDate,
    b_in: NaiveDate,
    b_out: NaiveDate,
) -> bool {
    a_in <= b_out && a_out >= b_in
}

pub fn validate_booking(
    candidate: &BookingCandidate,
    max_guests: i32,
    existing: &[BookedRange],
) -> Result<(), BookingValidationError> {
    if candidate.check_in >= candidate.check_out {
        return Err(BookingValidationError::InvalidDateRange);
    }

    if candidate.guests_count > max_guests {
        return Err(BookingValidationError::GuestCountExceeded { max_guests });
    }

    let conflict = existing
        .iter()
        .filter(|b| b.status.holds_dates())
        .filter(|b| Some(b.id) != candidate.exclude_id)
        .any(|b| {
            ranges_overlap(
                candidate.check_in,
                candidate.check_out,
                b.check_in_date,
                b.check_out_date,
            )
        });

    if conflict {
        return Err(BookingValidationError::DateConflict);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn candidate(check_in: &str, check_out: &str, guests: i32) -> BookingCandidate {
        BookingCandidate {
            check_in: date(check_in),
            check_out: date(check_out),
            guests_count: guests,
            exclude_id: None,
        }
    }

    fn booked(id: i64, check_in: &str, check_out: &str, status: BookingStatus) -> BookedRange {
        BookedRange {
            id,
            check_in_date: date(check_in),
            check_out_date: date(check_out),
            status,
        }
    }

    #[test]
    fn accepts_free_dates() {
        let existing = [booked(1, "2024-02-01", "2024-02-05", BookingStatus::Confirmed)];
        assert_eq!(
            validate_booking(&candidate("2024-01-01", "2024-01-04", 2), 4, &existing),
            Ok(())
        );
    }

    #[test]
    fn rejects_checkout_not_after_checkin() {
        let res = validate_booking(&candidate("2024-01-04", "2024-01-04", 1), 4, &[]);
        assert_eq!(res, Err(BookingValidationError::InvalidDateRange));

        let res = validate_booking(&candidate("2024-01-05", "2024-01-04", 1), 4, &[]);
        assert_eq!(res, Err(BookingValidationError::InvalidDateRange));
    }

    #[test]
    fn rejects_too_many_guests() {
        let res = validate_booking(&candidate("2024-01-01", "2024-01-04", 5), 4, &[]);
        assert_eq!(
            res,
            Err(BookingValidationError::GuestCountExceeded { max_guests: 4 })
        );
        assert_eq!(
            res.unwrap_err().to_string(),
            "This listing can only accommodate 4 guests"
        );
    }

    #[test]
    fn date_range_is_checked_before_capacity() {
        let res = validate_booking(&candidate("2024-01-04", "2024-01-01", 50), 4, &[]);
        assert_eq!(res, Err(BookingValidationError::InvalidDateRange));
    }

    #[test]
    fn rejects_overlap_with_confirmed_booking() {
        let existing = [booked(1, "2024-01-01", "2024-01-05", BookingStatus::Confirmed)];
        let res = validate_booking(&candidate("2024-01-04", "2024-01-06", 2), 4, &existing);
        assert_eq!(res, Err(BookingValidationError::DateConflict));
    }

    #[test]
    fn turnover_day_counts_as_conflict() {
        let existing = [booked(1, "2024-01-01", "2024-01-05", BookingStatus::Pending)];

        let res = validate_booking(&candidate("2024-01-05", "2024-01-08", 2), 4, &existing);
        assert_eq!(res, Err(BookingValidationError::DateConflict));

        let res = validate_booking(&candidate("2023-12-28", "2024-01-01", 2), 4, &existing);
        assert_eq!(res, Err(BookingValidationError::DateConflict));
    }

    #[test]
    fn cancelled_and_completed_bookings_free_their_dates() {
        let existing = [
            booked(1, "2024-01-01", "2024-01-05", BookingStatus::Cancelled),
            booked(2, "2024-01-01", "2024-01-05", BookingStatus::Completed),
        ];
        assert!(validate_booking(&candidate("2024-01-02", "2024-01-03", 1), 4, &existing).is_ok());
    }

    #[test]
    fn update_does_not_conflict_with_itself() {
        let existing = [booked(9, "2024-01-01", "2024-01-05", BookingStatus::Confirmed)];
        let mut c = candidate("2024-01-02", "2024-01-06", 2);
        c.exclude_id = Some(9);
        assert!(validate_booking(&c, 4, &existing).is_ok());

        c.exclude_id = Some(10);
        assert_eq!(
            validate_booking(&c, 4, &existing),
            Err(BookingValidationError::DateConflict)
        );
    }

    fn arb_range() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
        (0i64..365, 1i64..30).prop_map(|(offset, nights)| {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset);
            (start, start + Duration::days(nights))
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric((a_in, a_out) in arb_range(), (b_in, b_out) in arb_range()) {
            prop_assert_eq!(
                ranges_overlap(a_in, a_out, b_in, b_out),
                ranges_overlap(b_in, b_out, a_in, a_out)
            );
        }

        #[test]
        fn accepted_bookings_never_overlap(ranges in prop::collection::vec(arb_range(), 1..20)) {
            // Accept greedily, as sequential requests would, then check pairwise.
            let mut accepted: Vec<BookedRange> = Vec::new();
            for (i, (check_in, check_out)) in ranges.into_iter().enumerate() {
                let c = BookingCandidate { check_in, check_out, guests_count: 1, exclude_id: None };
                if validate_booking(&c, 2, &accepted).is_ok() {
                    accepted.push(BookedRange {
                        id: i as i64,
                        check_in_date: check_in,
                        check_out_date: check_out,
                        status: BookingStatus::Confirmed,
                    });
                }
            }

            for a in &accepted {
                prop_assert!(a.check_in_date < a.check_out_date);
                for b in &accepted {
                    if a.id != b.id {
                        prop_assert!(!ranges_overlap(
                            a.check_in_date, a.check_out_date, b.check_in_date, b.check_out_date
                        ));
                    }
                }
            }
        }

        #[test]
        fn guest_limit_is_enforced(guests in 1i32..20, max_guests in 1i32..20) {
            let c = BookingCandidate {
                check_in: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                guests_count: guests,
                exclude_id: None,
            };
            prop_assert_eq!(validate_booking(&c, max_guests, &[]).is_ok(), guests <= max_guests);
        }
    }
}
