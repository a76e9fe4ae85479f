use chrono::Utc;
use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{User, UserCreate, UserOut};

#[derive(Clone)]
pub struct UserService {
    db: Database,
    allow_admin_registration: bool,
}

impl UserService {
    pub fn new(db: Database, allow_admin_registration: bool) -> Self {
        Self {
            db,
            allow_admin_registration,
        }
    }

    pub async fn register(&self, user_in: UserCreate) -> Result<UserOut, AppError> {
        let email = user_in.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(AppError::Validation(
                "value is not a valid email address".to_string(),
            ));
        }
        if user_in.password.is_empty() {
            return Err(AppError::Validation("password must not be empty".to_string()));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(duplicate_email());
        }

        let is_admin = self.allow_admin_registration && user_in.is_admin.unwrap_or(false);
        let password = user_in.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash, is_admin, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, email, password_hash, is_admin",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(is_admin)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(self.db.pool())
        .await
        .map_err(insert_error)?;

        info!("Registered user {} (admin: {})", user.id, user.is_admin);
        Ok(user.into())
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        let rejected = || AppError::BadRequest("Incorrect email or password".to_string());
        let Some(user) = self.find_by_email(&email).await? else {
            return Err(rejected());
        };

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
        if verified {
            Ok(user)
        } else {
            Err(rejected())
        }
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_admin FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_admin FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }
}

fn duplicate_email() -> AppError {
    AppError::BadRequest("Email already registered".to_string())
}

/// A concurrent registration can pass the lookup and still lose on the
/// UNIQUE(email) constraint.
fn insert_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => duplicate_email(),
        other => AppError::Database(other),
    }
}

/// Loose address check: one `@`, non-empty local part, dotted domain.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split('.')
                    .filter(|label| !label.is_empty())
                    .count()
                    >= 2
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
