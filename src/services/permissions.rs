//! permissions.rs
//!
//! Правила доступа для изменяющих запросов. Каждое действие - отдельный
//! вариант `Permission`, проверяется против `AccessContext` запроса.

use crate::error::AppError;

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext {
    pub user_id: i64,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Update/delete a booking: its guest or staff.
    BookingOwnerOrAdmin { guest_id: i64 },
    /// Update/delete a review: its author or staff.
    ReviewerOrAdmin { reviewer_id: i64 },
    /// Create a review: requester has a completed booking on the listing.
    BookingGuest { has_completed_booking: bool },
    /// Update/delete a listing: its host or staff.
    ListingHostOrAdmin { host_id: i64 },
}

impl Permission {
    pub fn is_granted(&self, ctx: &AccessContext) -> bool {
        match *self {
            Permission::BookingOwnerOrAdmin { guest_id } => ctx.is_staff || ctx.user_id == guest_id,
            Permission::ReviewerOrAdmin { reviewer_id } => {
                ctx.is_staff || ctx.user_id == reviewer_id
            }
            Permission::BookingGuest {
                has_completed_booking,
            } => has_completed_booking,
            Permission::ListingHostOrAdmin { host_id } => ctx.is_staff || ctx.user_id == host_id,
        }
    }

    fn denial_message(&self) -> &'static str {
        match self {
            Permission::BookingOwnerOrAdmin { .. } => {
                "Only the guest who made this booking or an admin can modify it"
            }
            Permission::ReviewerOrAdmin { .. } => {
                "Only the author of this review or an admin can modify it"
            }
            Permission::BookingGuest { .. } => {
                "Only guests with a completed booking for this listing can review it"
            }
            Permission::ListingHostOrAdmin { .. } => {
                "Only the host of this listing or an admin can modify it"
            }
        }
    }

    pub fn check(&self, ctx: &AccessContext) -> Result<(), AppError> {
        if self.is_granted(ctx) {
            Ok(())
        } else {
            tracing::debug!(user_id = ctx.user_id, permission = ?self, "permission denied");
            Err(AppError::Forbidden(self.denial_message().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUEST: AccessContext = AccessContext {
        user_id: 10,
        is_staff: false,
    };
    const STRANGER: AccessContext = AccessContext {
        user_id: 11,
        is_staff: false,
    };
    const ADMIN: AccessContext = AccessContext {
        user_id: 1,
        is_staff: true,
    };

    #[test]
    fn booking_owner_or_admin() {
        let p = Permission::BookingOwnerOrAdmin { guest_id: 10 };
        assert!(p.is_granted(&GUEST));
        assert!(p.is_granted(&ADMIN));
        assert!(!p.is_granted(&STRANGER));
    }

    #[test]
    fn reviewer_or_admin() {
        let p = Permission::ReviewerOrAdmin { reviewer_id: 11 };
        assert!(p.is_granted(&STRANGER));
        assert!(p.is_granted(&ADMIN));
        assert!(!p.is_granted(&GUEST));
    }

    #[test]
    fn review_requires_completed_booking_even_for_staff() {
        let denied = Permission::BookingGuest {
            has_completed_booking: false,
        };
        assert!(!denied.is_granted(&ADMIN));
        assert!(matches!(denied.check(&GUEST), Err(AppError::Forbidden(_))));

        let allowed = Permission::BookingGuest {
            has_completed_booking: true,
        };
        assert!(allowed.check(&GUEST).is_ok());
    }

    #[test]
    fn listing_host_or_admin() {
        let p = Permission::ListingHostOrAdmin { host_id: 10 };
        assert!(p.check(&GUEST).is_ok());
        assert!(p.check(&ADMIN).is_ok());
        assert!(p.check(&STRANGER).is_err());
    }
}
