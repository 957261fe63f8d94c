use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::availability::BookingValidationError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingValidationError),

    #[error("{0}")]
    Validation(String),

    #[error("authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Booking(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            match db.code().as_deref() {
                // exclusion constraint bookings_no_overlap
                Some("23P01") => return AppError::Booking(BookingValidationError::DateConflict),
                Some("23505") => {
                    let message = match db.constraint() {
                        Some("reviews_booking_id_key") => {
                            "This booking has already been reviewed".to_string()
                        }
                        Some("reviews_listing_reviewer_booking_key") => {
                            "The fields listing, reviewer, booking must make a unique set".to_string()
                        }
                        Some(other) => format!("Duplicate value violates {}", other),
                        None => "Duplicate value".to_string(),
                    };
                    return AppError::Validation(message);
                }
                Some("23503") => {
                    return AppError::Validation("Referenced object does not exist".to_string())
                }
                // numeric field overflow
                Some("22003") => {
                    return AppError::Validation(
                        "Numeric value is out of range for its field".to_string(),
                    )
                }
                Some("23514") => {
                    return AppError::Validation(format!(
                        "Value violates {}",
                        db.constraint().unwrap_or("a check constraint")
                    ))
                }
                _ => {}
            }
        }
        AppError::Database(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

// Отказы экстракторов axum отдаём в том же формате {"error": ...}
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_are_bad_requests() {
        assert_eq!(
            AppError::from(BookingValidationError::InvalidDateRange).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Validation("rating: out of range".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn permission_denial_is_forbidden() {
        let response = AppError::Forbidden("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn database_errors_hide_details() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
