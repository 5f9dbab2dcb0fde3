//! In-memory user collection.
//!
//! The collection is owned by [`UserStore`] and only reachable through its async
//! methods. Id assignment and append happen under one write lock, so concurrent
//! creates always receive distinct ids.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    /// Stored key of the most recent avatar upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Input for creating a user. Missing fields bind as empty strings so they are
/// reported by validation instead of failing the bind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user {0} not found")]
    NotFound(u64),
}

#[derive(Debug, Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<Vec<User>>>,
}

impl UserStore {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    /// Store preloaded with the two demo users
    pub fn seeded() -> Self {
        Self::new(vec![
            User {
                id: 1,
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                avatar: None,
            },
            User {
                id: 2,
                name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                avatar: None,
            },
        ])
    }

    /// All users in insertion order
    pub async fn list(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    pub async fn get(&self, id: u64) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn exists(&self, id: u64) -> bool {
        self.users.read().await.iter().any(|user| user.id == id)
    }

    /// Case-insensitive substring match on the name; a blank filter matches everyone
    pub async fn filter_by_name(&self, name: &str) -> Vec<User> {
        let needle = name.trim().to_lowercase();
        self.users
            .read()
            .await
            .iter()
            .filter(|user| needle.is_empty() || user.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub async fn create(&self, new_user: NewUser) -> User {
        let mut users = self.users.write().await;
        let id = users.iter().map(|user| user.id).max().unwrap_or(0) + 1;

        let user = User {
            id,
            name: new_user.name,
            email: new_user.email,
            avatar: None,
        };
        users.push(user.clone());

        tracing::debug!("Created user {} ({})", user.id, user.email);
        user
    }

    pub async fn update(&self, id: u64, update: UserUpdate) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(StoreError::NotFound(id))?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(avatar) = update.avatar {
            user.avatar = Some(avatar);
        }

        Ok(user.clone())
    }
}
