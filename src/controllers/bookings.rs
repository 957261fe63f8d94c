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
use crate::models::{BookingPatch, BookingPayload};
use crate::repository::BookingFilter;
use crate::services::permissions::Permission;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route(
            "/bookings/{id}",
            get(get_booking)
                .put(replace_booking)
                .patch(update_booking)
                .delete(delete_booking),
        )
}

/* ---------- BOOKINGS ---------- */

// GET /api/bookings
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(filter): AppQuery<BookingFilter>,
) -> AppResult<impl IntoResponse> {
    let page = page_of(&state, filter.page, filter.page_size);
    let repo = state.db.bookings();
    let bookings = repo.list_visible(&user.access(), &filter, page).await?;

    Ok(Json(repo.hydrate(bookings).await?))
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<BookingPayload>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let repo = state.db.bookings();
    let booking = repo.create(user.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(repo.hydrate_one(booking).await?)))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.bookings();
    let booking = repo.get_visible(id, &user.access()).await?;

    Ok(Json(repo.hydrate_one(booking).await?))
}

// PUT /api/bookings/{id}
async fn replace_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<BookingPayload>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;
    apply_changes(&state, &user, id, BookingPatch::from(payload)).await
}

// PATCH /api/bookings/{id}
async fn update_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<BookingPatch>,
) -> AppResult<impl IntoResponse> {
    patch.validate()?;
    apply_changes(&state, &user, id, patch).await
}

async fn apply_changes(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    patch: BookingPatch,
) -> AppResult<Json<crate::models::BookingResponse>> {
    let ctx = user.access();
    let repo = state.db.bookings();
    let booking = repo.get_visible(id, &ctx).await?;
    Permission::BookingOwnerOrAdmin { guest_id: booking.guest_id }.check(&ctx)?;

    let booking = repo.update(id, &patch).await?;
    Ok(Json(repo.hydrate_one(booking).await?))
}

// DELETE /api/bookings/{id}
async fn delete_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let ctx = user.access();
    let repo = state.db.bookings();
    let booking = repo.get_visible(id, &ctx).await?;
    Permission::BookingOwnerOrAdmin { guest_id: booking.guest_id }.check(&ctx)?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
