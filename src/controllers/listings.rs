use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

use super::extract::{AppJson, AppPath, AppQuery};
use super::page_of;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{ListingPatch, ListingPayload};
use crate::repository::{BookingFilter, ListingFilter, ReviewFilter};
use crate::services::permissions::Permission;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/listings", get(list_listings).post(create_listing))
        .route(
            "/listings/{id}",
            get(get_listing)
                .put(replace_listing)
                .patch(update_listing)
                .delete(delete_listing),
        )
        .route("/listings/{id}/bookings", get(listing_bookings))
        .route("/listings/{id}/reviews", get(listing_reviews))
}

/* ---------- LISTINGS ---------- */

// GET /api/listings
async fn list_listings(
    State(state): State<Arc<AppState>>,
    AppQuery(filter): AppQuery<ListingFilter>,
) -> AppResult<impl IntoResponse> {
    let page = page_of(&state, filter.page, filter.page_size);
    let repo = state.db.listings();
    let listings = repo.list(&filter, page).await?;

    Ok(Json(repo.hydrate(listings).await?))
}

// POST /api/listings
async fn create_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<ListingPayload>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let repo = state.db.listings();
    let listing = repo.create(user.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(repo.hydrate_one(listing).await?)))
}

// GET /api/listings/{id}
async fn get_listing(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.listings();
    let listing = repo.get(id).await?;

    Ok(Json(repo.hydrate_one(listing).await?))
}

// PUT /api/listings/{id}
async fn replace_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<ListingPayload>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.listings();
    let listing = repo.get(id).await?;
    Permission::ListingHostOrAdmin { host_id: listing.host_id }.check(&user.access())?;
    payload.validate()?;

    let listing = repo.update(id, &ListingPatch::from(payload)).await?;
    Ok(Json(repo.hydrate_one(listing).await?))
}

// PATCH /api/listings/{id}
async fn update_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<ListingPatch>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.listings();
    let listing = repo.get(id).await?;
    Permission::ListingHostOrAdmin { host_id: listing.host_id }.check(&user.access())?;
    patch.validate()?;

    let listing = repo.update(id, &patch).await?;
    Ok(Json(repo.hydrate_one(listing).await?))
}

// DELETE /api/listings/{id}
async fn delete_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.listings();
    let listing = repo.get(id).await?;
    Permission::ListingHostOrAdmin { host_id: listing.host_id }.check(&user.access())?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/listings/{id}/bookings
async fn listing_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppQuery(filter): AppQuery<BookingFilter>,
) -> AppResult<impl IntoResponse> {
    state.db.listings().get(id).await?;

    let filter = BookingFilter {
        listing: Some(id),
        ..filter
    };
    let page = page_of(&state, filter.page, filter.page_size);
    let repo = state.db.bookings();
    let bookings = repo.list_visible(&user.access(), &filter, page).await?;

    Ok(Json(repo.hydrate(bookings).await?))
}

// GET /api/listings/{id}/reviews
async fn listing_reviews(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i64>,
    AppQuery(filter): AppQuery<ReviewFilter>,
) -> AppResult<impl IntoResponse> {
    state.db.listings().get(id).await?;

    let filter = ReviewFilter {
        listing: Some(id),
        ..filter
    };
    let page = page_of(&state, filter.page, filter.page_size);
    let repo = state.db.reviews();
    let reviews = repo.list(&filter, page).await?;

    Ok(Json(repo.hydrate(reviews).await?))
}
