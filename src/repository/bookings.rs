use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::{order_clause, Page, ReviewRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingPatch, BookingPayload, BookingResponse, BookingStatus, ListingSummary,
};
use crate::services::availability::{validate_booking, BookedRange, BookingCandidate};
use crate::services::permissions::AccessContext;
use crate::services::pricing;

const BOOKING_ORDERING: &[(&str, &str)] = &[
    ("check_in_date", "b.check_in_date"),
    ("check_out_date", "b.check_out_date"),
    ("created_at", "b.created_at"),
];
const DEFAULT_BOOKING_ORDER: &str = "b.created_at DESC, b.id DESC";

/// Query-string filters of `GET /api/bookings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub listing: Option<i64>,
    pub guest: Option<i64>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Row shape of an active booking on the listing being written.
#[derive(Debug, Clone, FromRow)]
struct BookedRow {
    id: i64,
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    status: BookingStatus,
}

impl From<BookedRow> for BookedRange {
    fn from(row: BookedRow) -> Self {
        BookedRange {
            id: row.id,
            check_in_date: row.check_in_date,
            check_out_date: row.check_out_date,
            status: row.status,
        }
    }
}

/// What the write path needs to know about the listing being booked.
#[derive(Debug, Clone, FromRow)]
struct ListingTerms {
    id: i64,
    price_per_night: Decimal,
    max_guests: i32,
}

pub struct BookingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookingRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Staff see every booking; everybody else only bookings they made or
    /// bookings of listings they host.
    pub async fn list_visible(
        &self,
        ctx: &AccessContext,
        filter: &BookingFilter,
        page: Page,
    ) -> AppResult<Vec<Booking>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT b.* FROM bookings b JOIN listings l ON l.id = b.listing_id WHERE TRUE",
        );
        push_visibility(&mut qb, ctx);
        if let Some(status) = filter.status {
            qb.push(" AND b.status = ").push_bind(status);
        }
        if let Some(listing) = filter.listing {
            qb.push(" AND b.listing_id = ").push_bind(listing);
        }
        if let Some(guest) = filter.guest {
            qb.push(" AND b.guest_id = ").push_bind(guest);
        }
        qb.push(" ORDER BY ");
        qb.push(order_clause(
            filter.ordering.as_deref(),
            BOOKING_ORDERING,
            "b.id",
            DEFAULT_BOOKING_ORDER,
        ));
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset);

        let bookings = qb.build_query_as::<Booking>().fetch_all(self.pool).await?;
        Ok(bookings)
    }

    pub async fn find_visible(&self, id: i64, ctx: &AccessContext) -> AppResult<Option<Booking>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT b.* FROM bookings b JOIN listings l ON l.id = b.listing_id WHERE b.id = ",
        );
        qb.push_bind(id);
        push_visibility(&mut qb, ctx);

        let booking = qb.build_query_as::<Booking>().fetch_optional(self.pool).await?;
        Ok(booking)
    }

    pub async fn get_visible(&self, id: i64, ctx: &AccessContext) -> AppResult<Booking> {
        self.find_visible(id, ctx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }

    pub async fn has_completed_booking(&self, guest_id: i64, listing_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE listing_id = $1 AND guest_id = $2 AND status = $3)",
        )
        .bind(listing_id)
        .bind(guest_id)
        .bind(BookingStatus::Completed)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Validates and inserts a booking in one transaction. The listing row is
    /// locked first, so two requests for the same listing cannot both pass
    /// the overlap check.
    pub async fn create(&self, guest_id: i64, payload: &BookingPayload) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let listing = lock_listing(&mut tx, payload.listing_id).await?;
        let existing = booked_ranges(&mut tx, listing.id).await?;

        let candidate = BookingCandidate {
            check_in: payload.check_in_date,
            check_out: payload.check_out_date,
            guests_count: payload.guests_count,
            exclude_id: None,
        };
        validate_booking(&candidate, listing.max_guests, &existing)?;

        let total_price = pricing::ensure_storable(pricing::total_price(
            listing.price_per_night,
            payload.check_in_date,
            payload.check_out_date,
        ))
        .map_err(AppError::Validation)?;

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings
                (listing_id, guest_id, check_in_date, check_out_date, guests_count, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(listing.id)
        .bind(guest_id)
        .bind(payload.check_in_date)
        .bind(payload.check_out_date)
        .bind(payload.guests_count)
        .bind(total_price)
        .bind(payload.status.unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            booking_id = booking.id,
            listing_id = booking.listing_id,
            guest_id,
            total_price = %booking.total_price,
            "booking created"
        );
        Ok(booking)
    }

    /// Re-validates the booking as it will look after `patch`, excluding
    /// itself from the overlap check. The price is recomputed when the
    /// listing or the dates change.
    pub async fn update(&self, id: i64, patch: &BookingPatch) -> AppResult<Booking> {
        let before = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))?;

        let mut tx = self.pool.begin().await?;

        // listing first, then the booking row: same lock order as create
        let mut listing =
            lock_listing(&mut tx, patch.listing_id.unwrap_or(before.listing_id)).await?;

        let current = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))?;

        let next = current.patched(patch);
        if next.listing_id != listing.id {
            listing = lock_listing(&mut tx, next.listing_id).await?;
        }

        let existing = booked_ranges(&mut tx, listing.id).await?;
        let candidate = BookingCandidate {
            check_in: next.check_in_date,
            check_out: next.check_out_date,
            guests_count: next.guests_count,
            exclude_id: Some(id),
        };
        validate_booking(&candidate, listing.max_guests, &existing)?;

        let total_price = if current.reprices(&next) {
            pricing::ensure_storable(pricing::total_price(
                listing.price_per_night,
                next.check_in_date,
                next.check_out_date,
            ))
            .map_err(AppError::Validation)?
        } else {
            current.total_price
        };

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET
                listing_id = $2,
                check_in_date = $3,
                check_out_date = $4,
                guests_count = $5,
                status = $6,
                total_price = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.listing_id)
        .bind(next.check_in_date)
        .bind(next.check_out_date)
        .bind(next.guests_count)
        .bind(next.status)
        .bind(total_price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if current.status != booking.status {
            info!(
                booking_id = id,
                from = current.status.as_str(),
                to = booking.status.as_str(),
                "booking status changed"
            );
        }
        Ok(booking)
    }

    /// Deletes a booking and the review attached to it.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reviews WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Booking {} not found", id)));
        }

        tx.commit().await?;
        info!(booking_id = id, "booking deleted");
        Ok(())
    }

    /// Attaches listing summary, guest and review to each booking.
    pub async fn hydrate(&self, bookings: Vec<Booking>) -> AppResult<Vec<BookingResponse>> {
        let ids: Vec<i64> = bookings.iter().map(|b| b.id).collect();
        let listing_ids: Vec<i64> = bookings.iter().map(|b| b.listing_id).collect();
        let guest_ids: Vec<i64> = bookings.iter().map(|b| b.guest_id).collect();

        let listings: HashMap<i64, ListingSummary> = if listing_ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, ListingSummary>(
                r#"
                SELECT id, title, city, country, price_per_night, max_guests, host_id
                FROM listings
                WHERE id = ANY($1)
                "#,
            )
            .bind(&listing_ids)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect()
        };

        let guests = UserRepository::new(self.pool).summaries(&guest_ids).await?;

        let reviews_repo = ReviewRepository::new(self.pool);
        let mut reviews: HashMap<i64, _> = HashMap::new();
        for review in reviews_repo
            .hydrate(reviews_repo.for_bookings(&ids).await?)
            .await?
        {
            if let Some(booking_id) = review.booking {
                reviews.insert(booking_id, review);
            }
        }

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let listing = listings.get(&booking.listing_id).cloned();
                let guest = guests.get(&booking.guest_id).cloned();
                let review = reviews.remove(&booking.id);
                BookingResponse::new(booking, listing, guest, review)
            })
            .collect())
    }

    pub async fn hydrate_one(&self, booking: Booking) -> AppResult<BookingResponse> {
        self.hydrate(vec![booking])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("booking vanished during hydration".to_string()))
    }
}

fn push_visibility(qb: &mut QueryBuilder<'_, Postgres>, ctx: &AccessContext) {
    if ctx.is_staff {
        return;
    }
    qb.push(" AND (b.guest_id = ")
        .push_bind(ctx.user_id)
        .push(" OR l.host_id = ")
        .push_bind(ctx.user_id)
        .push(")");
}

// SELECT ... FOR UPDATE: держим строку объявления до конца транзакции
async fn lock_listing(conn: &mut PgConnection, listing_id: i64) -> AppResult<ListingTerms> {
    sqlx::query_as::<_, ListingTerms>(
        "SELECT id, price_per_night, max_guests FROM listings WHERE id = $1 FOR UPDATE",
    )
    .bind(listing_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::Validation(format!("Listing {} does not exist", listing_id)))
}

async fn booked_ranges(conn: &mut PgConnection, listing_id: i64) -> AppResult<Vec<BookedRange>> {
    let rows = sqlx::query_as::<_, BookedRow>(
        r#"
        SELECT id, check_in_date, check_out_date, status
        FROM bookings
        WHERE listing_id = $1 AND status IN ('pending', 'confirmed')
        "#,
    )
    .bind(listing_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(BookedRange::from).collect())
}
