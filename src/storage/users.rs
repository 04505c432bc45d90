use async_trait::async_trait;
use sqlx::SqlitePool;
use validator::Validate;

use crate::models::{NewUser, Recipient, User};
use crate::storage::RecipientDirectory;
use crate::utils::error::{AppError, Result};

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        new_user.validate()?;
        let user = User::new(new_user);

        sqlx::query(
            "INSERT INTO users (id, name, email, telegram, chat_id, created_at) VALUES (?, ?, ?, ?, NULL, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.telegram)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::AlreadyExists { .. } => AppError::already_exists(format!("user {}", user.email)),
            other => other,
        })?;

        tracing::info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    #[cfg(test)]
    async fn find_by_telegram(&self, telegram: &str) -> Result<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, telegram, chat_id, created_at FROM users WHERE telegram = ?",
        )
        .bind(telegram)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user @{}", telegram)))
    }

    /// Subscribe `chat_id` to chat reports on behalf of a registered telegram user.
    pub async fn set_chat_id(&self, telegram: &str, chat_id: i64) -> Result<()> {
        match self.bound_chat(telegram).await? {
            Some(bound) if bound == chat_id => {
                return Err(AppError::already_exists(format!("chat for @{}", telegram)));
            }
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "@{} is already subscribed from another chat",
                    telegram
                )));
            }
            None => {}
        }

        sqlx::query("UPDATE users SET chat_id = ? WHERE telegram = ?")
            .bind(chat_id)
            .bind(telegram)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn drop_chat_id(&self, telegram: &str, chat_id: i64) -> Result<()> {
        if self.bound_chat(telegram).await? != Some(chat_id) {
            return Err(AppError::not_found(format!("subscription for @{}", telegram)));
        }

        sqlx::query("UPDATE users SET chat_id = NULL WHERE telegram = ? AND chat_id = ?")
            .bind(telegram)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn bound_chat(&self, telegram: &str) -> Result<Option<i64>> {
        let chat_id: Option<Option<i64>> = sqlx::query_scalar("SELECT chat_id FROM users WHERE telegram = ?")
            .bind(telegram)
            .fetch_optional(&self.pool)
            .await?;

        chat_id.ok_or_else(|| AppError::not_found(format!("user @{}", telegram)))
    }
}

#[async_trait]
impl RecipientDirectory for UserRepository {
    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        let recipients = sqlx::query_as::<_, Recipient>("SELECT email, chat_id FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(recipients)
    }
}
