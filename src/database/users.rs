//! User persistence.

use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::database::connection::DatabaseConnection;
use crate::database::models::{FromRow, NewUser, User};
use crate::error::AppError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// `email` must already be normalised (trimmed, lower-case).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Fails with [`AppError::Conflict`] when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    /// Store `new_hash` only while the row still holds `current_hash`.
    /// Returns `false` when nothing was updated.
    async fn replace_password_hash(&self, id: Uuid, current_hash: &str, new_hash: &str) -> Result<bool, AppError>;

    /// Returns `false` when the account was already verified.
    async fn mark_verified(&self, id: Uuid) -> Result<bool, AppError>;
}

fn to_user(row: &tokio_postgres::Row) -> Result<User, AppError> {
    Ok(User::from_row(row)?)
}

#[async_trait]
impl UserRepository for DatabaseConnection {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let client = self.pool().get().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE id = $1", &[&id])
            .await?;
        row.as_ref().map(to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let client = self.pool().get().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE email = $1", &[&email])
            .await?;
        row.as_ref().map(to_user).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let client = self.pool().get().await?;
        let id = Uuid::new_v4();
        let row = client
            .query_one(
                "INSERT INTO users (id, email, name, password_hash, is_verified) \
                 VALUES ($1, $2, $3, $4, FALSE) RETURNING *",
                &[&id, &user.email, &user.name, &user.password_hash],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::Conflict("email already registered".into())
                } else {
                    AppError::from(e)
                }
            })?;
        to_user(&row)
    }

    async fn replace_password_hash(&self, id: Uuid, current_hash: &str, new_hash: &str) -> Result<bool, AppError> {
        let client = self.pool().get().await?;
        let n = client
            .execute(
                "UPDATE users SET password_hash = $1, updated_at = NOW() \
                 WHERE id = $2 AND password_hash = $3",
                &[&new_hash, &id, &current_hash],
            )
            .await?;
        Ok(n == 1)
    }

    async fn mark_verified(&self, id: Uuid) -> Result<bool, AppError> {
        let client = self.pool().get().await?;
        let n = client
            .execute(
                "UPDATE users SET is_verified = TRUE, updated_at = NOW() \
                 WHERE id = $1 AND is_verified = FALSE",
                &[&id],
            )
            .await?;
        Ok(n == 1)
    }
}
