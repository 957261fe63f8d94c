pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod controllers;
pub mod middleware;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
}

impl AppState {
    /// Connects, migrates and bootstraps the configured superuser.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database).await?;
        info!("Database connected");

        db.run_migrations().await?;

        if let Some(admin) = &config.admin {
            if !db.users().ensure_superuser(admin).await? {
                info!("Superuser {} already exists", admin.username);
            }
        }

        Ok(Arc::new(Self { db, config }))
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}

pub fn app(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(|| async { "Travel Listings API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    match cors_layer(&state.config.app.cors_allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}
