use std::collections::HashMap;

use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::{order_clause, Page, ReviewRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::models::{Listing, ListingPatch, ListingPayload, ListingResponse, PropertyType};
use crate::services::rating::average_rating;

const SEARCH_COLUMNS: [&str; 5] = ["l.title", "l.description", "l.address", "l.city", "l.country"];

const LISTING_ORDERING: &[(&str, &str)] = &[
    ("price_per_night", "l.price_per_night"),
    ("created_at", "l.created_at"),
];
const DEFAULT_LISTING_ORDER: &str = "l.created_at DESC, l.id DESC";

/// Query-string filters of `GET /api/listings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    pub city: Option<String>,
    pub country: Option<String>,
    pub property_type: Option<PropertyType>,
    pub max_guests: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub has_wifi: Option<bool>,
    pub has_kitchen: Option<bool>,
    pub has_air_conditioning: Option<bool>,
    pub has_heating: Option<bool>,
    pub has_tv: Option<bool>,
    pub has_parking: Option<bool>,
    pub has_pool: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListingFilter {
    fn amenities(&self) -> [(&'static str, Option<bool>); 7] {
        [
            ("l.has_wifi", self.has_wifi),
            ("l.has_kitchen", self.has_kitchen),
            ("l.has_air_conditioning", self.has_air_conditioning),
            ("l.has_heating", self.has_heating),
            ("l.has_tv", self.has_tv),
            ("l.has_parking", self.has_parking),
            ("l.has_pool", self.has_pool),
        ]
    }

    fn push_conditions<'q>(&'q self, qb: &mut QueryBuilder<'q, Postgres>) {
        if let Some(city) = &self.city {
            qb.push(" AND l.city = ").push_bind(city);
        }
        if let Some(country) = &self.country {
            qb.push(" AND l.country = ").push_bind(country);
        }
        if let Some(property_type) = self.property_type {
            qb.push(" AND l.property_type = ").push_bind(property_type);
        }
        if let Some(max_guests) = self.max_guests {
            qb.push(" AND l.max_guests = ").push_bind(max_guests);
        }
        if let Some(bedrooms) = self.bedrooms {
            qb.push(" AND l.bedrooms = ").push_bind(bedrooms);
        }
        if let Some(bathrooms) = self.bathrooms {
            qb.push(" AND l.bathrooms = ").push_bind(bathrooms);
        }
        for (column, wanted) in self.amenities() {
            if let Some(wanted) = wanted {
                qb.push(format!(" AND {} = ", column)).push_bind(wanted);
            }
        }
        if let Some(search) = &self.search {
            // каждое слово должно найтись хотя бы в одном поле
            for term in search.split_whitespace() {
                let pattern = format!("%{}%", escape_like(term));
                qb.push(" AND (");
                for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(format!("{} ILIKE ", column)).push_bind(pattern.clone());
                }
                qb.push(")");
            }
        }
    }
}

fn check_capacity(max_guests: i32, largest_active: Option<i32>) -> AppResult<()> {
    match largest_active {
        Some(guests) if guests > max_guests => Err(AppError::Validation(format!(
            "max_guests cannot be lower than {} guests of an active booking",
            guests
        ))),
        _ => Ok(()),
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub struct ListingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ListingRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &ListingFilter, page: Page) -> AppResult<Vec<Listing>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT l.* FROM listings l WHERE TRUE");
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY ");
        qb.push(order_clause(
            filter.ordering.as_deref(),
            LISTING_ORDERING,
            "l.id",
            DEFAULT_LISTING_ORDER,
        ));
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset);

        let listings = qb.build_query_as::<Listing>().fetch_all(self.pool).await?;
        Ok(listings)
    }

    pub async fn find(&self, id: i64) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(listing)
    }

    pub async fn get(&self, id: i64) -> AppResult<Listing> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))
    }

    pub async fn create(&self, host_id: i64, payload: &ListingPayload) -> AppResult<Listing> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                host_id, title, description, address, city, country, price_per_night,
                property_type, max_guests, bedrooms, bathrooms, has_wifi, has_kitchen,
                has_air_conditioning, has_heating, has_tv, has_parking, has_pool
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(host_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.address)
        .bind(&payload.city)
        .bind(&payload.country)
        .bind(payload.price_per_night)
        .bind(payload.property_type)
        .bind(payload.max_guests)
        .bind(payload.bedrooms)
        .bind(payload.bathrooms)
        .bind(payload.has_wifi)
        .bind(payload.has_kitchen)
        .bind(payload.has_air_conditioning)
        .bind(payload.has_heating)
        .bind(payload.has_tv)
        .bind(payload.has_parking)
        .bind(payload.has_pool)
        .fetch_one(self.pool)
        .await?;

        info!(listing_id = listing.id, host_id, "listing created");
        Ok(listing)
    }

    /// Applies the fields present in `patch`. Existing bookings are not
    /// re-priced when the nightly rate changes, but capacity cannot drop
    /// below an active booking's guest count.
    pub async fn update(&self, id: i64, patch: &ListingPatch) -> AppResult<Listing> {
        let mut tx = self.pool.begin().await?;

        // тот же замок строки, что берёт запись брони
        sqlx::query_scalar::<_, i64>("SELECT id FROM listings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

        if let Some(max_guests) = patch.max_guests {
            let largest_active = sqlx::query_scalar::<_, Option<i32>>(
                r#"
                SELECT MAX(guests_count)
                FROM bookings
                WHERE listing_id = $1 AND status IN ('pending', 'confirmed')
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            check_capacity(max_guests, largest_active)?;
        }

        let listing = sqlx::query_as::<_, Listing>(
            r#"
            UPDATE listings SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                country = COALESCE($6, country),
                price_per_night = COALESCE($7, price_per_night),
                property_type = COALESCE($8, property_type),
                max_guests = COALESCE($9, max_guests),
                bedrooms = COALESCE($10, bedrooms),
                bathrooms = COALESCE($11, bathrooms),
                has_wifi = COALESCE($12, has_wifi),
                has_kitchen = COALESCE($13, has_kitchen),
                has_air_conditioning = COALESCE($14, has_air_conditioning),
                has_heating = COALESCE($15, has_heating),
                has_tv = COALESCE($16, has_tv),
                has_parking = COALESCE($17, has_parking),
                has_pool = COALESCE($18, has_pool),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.address)
        .bind(&patch.city)
        .bind(&patch.country)
        .bind(patch.price_per_night)
        .bind(patch.property_type)
        .bind(patch.max_guests)
        .bind(patch.bedrooms)
        .bind(patch.bathrooms)
        .bind(patch.has_wifi)
        .bind(patch.has_kitchen)
        .bind(patch.has_air_conditioning)
        .bind(patch.has_heating)
        .bind(patch.has_tv)
        .bind(patch.has_parking)
        .bind(patch.has_pool)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(listing)
    }

    /// Deletes a listing together with its reviews and bookings.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let reviews = sqlx::query("DELETE FROM reviews WHERE listing_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let bookings = sqlx::query("DELETE FROM bookings WHERE listing_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Listing {} not found", id)));
        }

        tx.commit().await?;

        info!(
            listing_id = id,
            bookings = bookings.rows_affected(),
            reviews = reviews.rows_affected(),
            "listing deleted"
        );
        Ok(())
    }

    /// Attaches host, reviews and the average rating to each listing.
    pub async fn hydrate(&self, listings: Vec<Listing>) -> AppResult<Vec<ListingResponse>> {
        let ids: Vec<i64> = listings.iter().map(|l| l.id).collect();
        let host_ids: Vec<i64> = listings.iter().map(|l| l.host_id).collect();

        let hosts = UserRepository::new(self.pool).summaries(&host_ids).await?;

        let reviews = ReviewRepository::new(self.pool);
        let mut by_listing: HashMap<i64, Vec<_>> = HashMap::new();
        for review in reviews.hydrate(reviews.for_listings(&ids).await?).await? {
            by_listing.entry(review.listing).or_default().push(review);
        }

        Ok(listings
            .into_iter()
            .map(|listing| {
                let reviews = by_listing.remove(&listing.id).unwrap_or_default();
                let ratings: Vec<i16> = reviews.iter().map(|r| r.rating).collect();
                let host = hosts.get(&listing.host_id).cloned();
                ListingResponse::new(listing, host, reviews, average_rating(&ratings))
            })
            .collect())
    }

    pub async fn hydrate_one(&self, listing: Listing) -> AppResult<ListingResponse> {
        self.hydrate(vec![listing])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("listing vanished during hydration".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Austin"), "Austin");
    }

    #[test]
    fn filter_reads_amenities_from_query() {
        let filter: ListingFilter =
            serde_json::from_value(serde_json::json!({ "has_pool": true, "city": "Miami" })).unwrap();
        let requested: Vec<_> = filter
            .amenities()
            .into_iter()
            .filter_map(|(column, wanted)| wanted.map(|w| (column, w)))
            .collect();
        assert_eq!(requested, vec![("l.has_pool", true)]);
    }

    #[test]
    fn filter_builds_parameterised_sql() {
        let filter = ListingFilter {
            city: Some("Miami".into()),
            has_wifi: Some(true),
            search: Some("beach".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT l.* FROM listings l WHERE TRUE");
        filter.push_conditions(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("l.city = $1"));
        assert!(sql.contains("l.has_wifi = $2"));
        assert!(sql.contains("l.title ILIKE $3"));
        assert!(!sql.contains("beach"));
    }

    #[test]
    fn every_search_term_must_match_some_field() {
        let filter = ListingFilter {
            search: Some("  beach   house ".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT l.* FROM listings l WHERE TRUE");
        filter.push_conditions(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("(l.title ILIKE $1 OR l.description ILIKE $2"));
        assert!(sql.contains("l.country ILIKE $5) AND (l.title ILIKE $6"));
        assert!(sql.ends_with("l.country ILIKE $10)"));
    }

    #[test]
    fn blank_search_adds_no_condition() {
        let filter = ListingFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT l.* FROM listings l WHERE TRUE");
        filter.push_conditions(&mut qb);
        assert_eq!(qb.sql(), "SELECT l.* FROM listings l WHERE TRUE");
    }

    #[test]
    fn capacity_cannot_drop_below_active_bookings() {
        assert!(check_capacity(4, None).is_ok());
        assert!(check_capacity(4, Some(4)).is_ok());
        assert!(matches!(check_capacity(1, Some(4)), Err(AppError::Validation(_))));
    }
}
