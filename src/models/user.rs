use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub telegram: Option<String>,
    #[serde(skip)]
    pub chat_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "telegram username cannot be empty"))]
    pub telegram: Option<String>,
}

/// A notification target. Either half may be missing, never both in practice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub chat_id: Option<i64>,
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        Self {
            id: generate_id(),
            name: new_user.name.trim().to_string(),
            email: new_user.email.trim().to_string(),
            telegram: new_user
                .telegram
                .map(|t| t.trim().trim_start_matches('@').to_string()),
            chat_id: None,
            created_at: Utc::now(),
        }
    }
}

impl Recipient {
    pub fn email_only(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            chat_id: None,
        }
    }

    pub fn chat_only(chat_id: i64) -> Self {
        Self {
            email: String::new(),
            chat_id: Some(chat_id),
        }
    }

    pub fn usable_email(&self) -> Option<&str> {
        let email = self.email.trim();
        if email.is_empty() { None } else { Some(email) }
    }
}
