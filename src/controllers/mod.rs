pub mod listings;
pub mod bookings;
pub mod reviews;
pub mod extract;

use axum::Router;
use std::sync::Arc;

use crate::repository::Page;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(listings::routes())
        .merge(bookings::routes())
        .merge(reviews::routes())
}

/// LIMIT/OFFSET for `?page=&page_size=`, bounded by the configured sizes.
fn page_of(state: &AppState, page: Option<u32>, page_size: Option<u32>) -> Page {
    let limits = &state.config.pagination;
    Page::new(page, page_size, limits.default_page_size, limits.max_page_size)
}
