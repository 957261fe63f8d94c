use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::UserSummary;

#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: i64,
    pub listing_id: i64,
    pub reviewer_id: i64,
    pub booking_id: Option<i64>,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub listing: i64,
    pub reviewer: Option<UserSummary>,
    pub booking: Option<i64>,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewResponse {
    pub fn new(review: Review, reviewer: Option<UserSummary>) -> Self {
        ReviewResponse {
            id: review.id,
            listing: review.listing_id,
            reviewer,
            booking: review.booking_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

// POST /api/reviews
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewPayload {
    #[validate(range(min = 1))]
    pub listing: i64,
    #[validate(range(min = 1))]
    pub booking: Option<i64>,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    pub comment: String,
}

// PUT/PATCH /api/reviews/{id}
//
// The listing and booking a review belongs to are fixed at creation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewPatch {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i16>,
    pub comment: Option<String>,
}
