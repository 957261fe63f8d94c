use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::error::AppError;
use crate::repository::UserRepository;
use crate::services::permissions::AccessContext;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl AuthUser {
    pub fn access(&self) -> AccessContext {
        AccessContext {
            user_id: self.user_id,
            is_staff: self.is_staff,
        }
    }
}

/// Splits an `Authorization: Basic ...` header value into username and password.
pub fn parse_basic_credentials(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (username, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic_credentials)
            .ok_or(AppError::Unauthorized)?;

        let users = UserRepository::new(&state.db.pool);
        let user = users
            .find_active_by_username(&username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        // bcrypt::verify is CPU-bound
        let verified = tokio::task::spawn_blocking({
            let user = user.clone();
            move || user.verify_password(&password)
        })
        .await
        .map_err(|e| AppError::Internal(format!("password check task failed: {}", e)))?;

        if !verified {
            tracing::debug!("rejected credentials for {}", username);
            return Err(AppError::Unauthorized);
        }

        // Ошибку обновления last_login игнорируем
        if let Err(e) = users.touch_last_login(user.id).await {
            tracing::warn!("failed to update last_login for {}: {:?}", user.id, e);
        }

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            is_staff: user.is_staff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(raw: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    #[test]
    fn parses_username_and_password() {
        assert_eq!(
            parse_basic_credentials(&basic("alice:pa:ss")),
            Some(("alice".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(parse_basic_credentials("Bearer abc"), None);
        assert_eq!(parse_basic_credentials("Basic !!!"), None);
        assert_eq!(parse_basic_credentials(&basic("no-colon")), None);
        assert_eq!(parse_basic_credentials(&basic(":password")), None);
    }
}
