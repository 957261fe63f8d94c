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
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{ReviewPatch, ReviewPayload, ReviewResponse};
use crate::repository::ReviewFilter;
use crate::services::permissions::Permission;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reviews", get(list_reviews).post(create_review))
        .route(
            "/reviews/{id}",
            get(get_review)
                .put(replace_review)
                .patch(update_review)
                .delete(delete_review),
        )
}

/* ---------- REVIEWS ---------- */

// GET /api/reviews
async fn list_reviews(
    State(state): State<Arc<AppState>>,
    AppQuery(filter): AppQuery<ReviewFilter>,
) -> AppResult<impl IntoResponse> {
    let page = page_of(&state, filter.page, filter.page_size);
    let repo = state.db.reviews();
    let reviews = repo.list(&filter, page).await?;

    Ok(Json(repo.hydrate(reviews).await?))
}

// POST /api/reviews
async fn create_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<ReviewPayload>,
) -> AppResult<impl IntoResponse> {
    // только гости с завершённой бронью этого объявления
    let has_completed_booking = state
        .db
        .bookings()
        .has_completed_booking(user.user_id, payload.listing)
        .await?;
    Permission::BookingGuest { has_completed_booking }.check(&user.access())?;
    payload.validate()?;

    let repo = state.db.reviews();
    let review = repo.create(user.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(repo.hydrate_one(review).await?)))
}

// GET /api/reviews/{id}
async fn get_review(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.reviews();
    let review = repo.get(id).await?;

    Ok(Json(repo.hydrate_one(review).await?))
}

// PUT /api/reviews/{id}
async fn replace_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<ReviewPatch>,
) -> AppResult<impl IntoResponse> {
    if patch.rating.is_none() || patch.comment.is_none() {
        return Err(AppError::Validation(
            "rating and comment are required".to_string(),
        ));
    }
    apply_changes(&state, &user, id, patch).await
}

// PATCH /api/reviews/{id}
async fn update_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<ReviewPatch>,
) -> AppResult<impl IntoResponse> {
    apply_changes(&state, &user, id, patch).await
}

async fn apply_changes(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    patch: ReviewPatch,
) -> AppResult<Json<ReviewResponse>> {
    let repo = state.db.reviews();
    let review = repo.get(id).await?;
    Permission::ReviewerOrAdmin { reviewer_id: review.reviewer_id }.check(&user.access())?;
    patch.validate()?;

    let review = repo.update(id, &patch).await?;
    Ok(Json(repo.hydrate_one(review).await?))
}

// DELETE /api/reviews/{id}
async fn delete_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let repo = state.db.reviews();
    let review = repo.get(id).await?;
    Permission::ReviewerOrAdmin { reviewer_id: review.reviewer_id }.check(&user.access())?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
