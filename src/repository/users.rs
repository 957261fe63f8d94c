use std::collections::HashMap;

use sqlx::PgPool;
use tracing::info;

use crate::config::AdminConfig;
use crate::error::{AppError, AppResult};
use crate::models::{User, UserSummary};

const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // Найти активного пользователя по username
    pub async fn find_active_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND is_active = TRUE",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn touch_last_login(&self, user_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Public summaries for the given ids, keyed by id.
    pub async fn summaries(&self, ids: &[i64]) -> AppResult<HashMap<i64, UserSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, email, first_name, last_name FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|u| (u.id, u)).collect())
    }

    pub async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let password_hash = hash_password(new_user.password).await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, is_staff)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.is_staff)
        .fetch_one(self.pool)
        .await?;

        Ok(user)
    }

    /// Creates the configured superuser unless the username is already taken.
    /// Returns whether a user was created.
    pub async fn ensure_superuser(&self, admin: &AdminConfig) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(&admin.username)
        .fetch_one(self.pool)
        .await?;

        if exists {
            return Ok(false);
        }

        self.create(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: true,
        })
        .await?;

        info!("Superuser {} created", admin.username);
        Ok(true)
    }
}

// bcrypt is CPU-bound, keep it off the async workers
async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}
