//! User directory and push token registry

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
}

impl User {
    /// Create a user record
    pub fn new(id: &str, name: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

/// Collection of registered users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert or replace a user
    async fn register_user(&self, user: User) -> Result<()>;

    /// Look up a user by id
    async fn user(&self, id: &str) -> Result<Option<User>>;

    /// Every registered user
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Every user except the one logged in with `current_email`
    async fn counterparts(&self, current_email: &str) -> Result<Vec<User>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().filter(|u| u.email != current_email).collect())
    }

    /// Display name for a user id, falling back to the id itself
    async fn display_name(&self, id: &str) -> Result<String> {
        Ok(self.user(id).await?.map(|u| u.name).unwrap_or_else(|| id.to_string()))
    }
}

/// Device push tokens per user
#[async_trait]
pub trait PushTokenStore: Send + Sync {
    /// Store the push token for a user's device
    async fn register_push_token(&self, user_id: &str, token: &str) -> Result<()>;

    /// Push token for a user, if one was registered
    async fn push_token(&self, user_id: &str) -> Result<Option<String>>;
}
