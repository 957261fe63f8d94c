use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::{order_clause, Page, UserRepository};
use crate::error::{AppError, AppResult};
use crate::models::{Booking, Review, ReviewPatch, ReviewPayload, ReviewResponse};

const REVIEW_ORDERING: &[(&str, &str)] = &[("rating", "r.rating"), ("created_at", "r.created_at")];
const DEFAULT_REVIEW_ORDER: &str = "r.created_at DESC, r.id DESC";

/// Query-string filters of `GET /api/reviews`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFilter {
    pub listing: Option<i64>,
    pub reviewer: Option<i64>,
    pub rating: Option<i16>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &ReviewFilter, page: Page) -> AppResult<Vec<Review>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT r.* FROM reviews r WHERE TRUE");
        if let Some(listing) = filter.listing {
            qb.push(" AND r.listing_id = ").push_bind(listing);
        }
        if let Some(reviewer) = filter.reviewer {
            qb.push(" AND r.reviewer_id = ").push_bind(reviewer);
        }
        if let Some(rating) = filter.rating {
            qb.push(" AND r.rating = ").push_bind(rating);
        }
        qb.push(" ORDER BY ");
        qb.push(order_clause(
            filter.ordering.as_deref(),
            REVIEW_ORDERING,
            "r.id",
            DEFAULT_REVIEW_ORDER,
        ));
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset);

        let reviews = qb.build_query_as::<Review>().fetch_all(self.pool).await?;
        Ok(reviews)
    }

    pub async fn find(&self, id: i64) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(review)
    }

    pub async fn get(&self, id: i64) -> AppResult<Review> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review {} not found", id)))
    }

    pub async fn for_listings(&self, listing_ids: &[i64]) -> AppResult<Vec<Review>> {
        if listing_ids.is_empty() {
            return Ok(Vec::new());
        }
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE listing_id = ANY($1) ORDER BY created_at DESC, id DESC",
        )
        .bind(listing_ids)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    pub async fn for_bookings(&self, booking_ids: &[i64]) -> AppResult<Vec<Review>> {
        if booking_ids.is_empty() {
            return Ok(Vec::new());
        }
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE booking_id = ANY($1)",
        )
        .bind(booking_ids)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Inserts a review by `reviewer_id`. The permission check (completed
    /// booking on the listing) is done by the caller.
    pub async fn create(&self, reviewer_id: i64, payload: &ReviewPayload) -> AppResult<Review> {
        if let Some(booking_id) = payload.booking {
            let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(self.pool)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Booking {} does not exist", booking_id)))?;
            check_review_booking(&booking, payload.listing, reviewer_id)?;
        }

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (listing_id, reviewer_id, booking_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(payload.listing)
        .bind(reviewer_id)
        .bind(payload.booking)
        .bind(payload.rating)
        .bind(&payload.comment)
        .fetch_one(self.pool)
        .await?;

        info!(review_id = review.id, listing_id = review.listing_id, "review created");
        Ok(review)
    }

    pub async fn update(&self, id: i64, patch: &ReviewPatch) -> AppResult<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews SET
                rating = COALESCE($2, rating),
                comment = COALESCE($3, comment),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.rating)
        .bind(&patch.comment)
        .fetch_optional(self.pool)
        .await?;

        review.ok_or_else(|| AppError::NotFound(format!("Review {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", id)));
        }
        Ok(())
    }

    /// Attaches reviewer summaries.
    pub async fn hydrate(&self, reviews: Vec<Review>) -> AppResult<Vec<ReviewResponse>> {
        let reviewer_ids: Vec<i64> = reviews.iter().map(|r| r.reviewer_id).collect();
        let reviewers = UserRepository::new(self.pool).summaries(&reviewer_ids).await?;

        Ok(reviews
            .into_iter()
            .map(|review| {
                let reviewer = reviewers.get(&review.reviewer_id).cloned();
                ReviewResponse::new(review, reviewer)
            })
            .collect())
    }

    pub async fn hydrate_one(&self, review: Review) -> AppResult<ReviewResponse> {
        self.hydrate(vec![review])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("review vanished during hydration".to_string()))
    }
}

/// A review may only point at the reviewer's own booking of the same listing.
fn check_review_booking(booking: &Booking, listing_id: i64, reviewer_id: i64) -> AppResult<()> {
    if booking.listing_id != listing_id {
        return Err(AppError::Validation(
            "The booking does not belong to this listing".to_string(),
        ));
    }
    if booking.guest_id != reviewer_id {
        return Err(AppError::Validation(
            "You can only review your own booking".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn booking(listing_id: i64, guest_id: i64) -> Booking {
        Booking {
            id: 1,
            listing_id,
            guest_id,
            check_in_date: "2024-01-01".parse().unwrap(),
            check_out_date: "2024-01-03".parse().unwrap(),
            guests_count: 1,
            total_price: dec!(200),
            status: BookingStatus::Completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn own_booking_of_same_listing_is_accepted() {
        assert!(check_review_booking(&booking(5, 9), 5, 9).is_ok());
    }

    #[test]
    fn foreign_booking_is_rejected() {
        assert!(matches!(
            check_review_booking(&booking(5, 9), 6, 9),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_review_booking(&booking(5, 9), 5, 10),
            Err(AppError::Validation(_))
        ));
    }
}
