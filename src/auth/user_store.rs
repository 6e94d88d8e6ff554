//! The user-account persistence layer is an explicit non-goal; this
//! module defines only the trait boundary the auth gate depends on,
//! plus a small in-memory implementation for tests and dev-mode
//! no-security cycling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Permission flags on a user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// Whether this user has administrator privileges.
    #[serde(default)]
    pub admin: bool,
}

/// A user record as the auth gate and no-security cycling see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

/// External collaborator: persists and authenticates user accounts.
///
/// Password hashing, account creation flows, and storage backends are
/// out of scope for this crate; only this interface is in scope.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Verify a username/password pair, returning the user on success.
    async fn authenticate(&self, username: &str, password: &str) -> Option<User>;

    /// Look up a user by username without checking a password.
    async fn get_by_username(&self, username: &str) -> Option<User>;

    /// List all known users, for no-security roster cycling.
    async fn list_users(&self) -> Vec<User>;
}

/// A simple in-memory `UserStore`, intended for development,
/// no-security mode, and tests — not a production account backend.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, (User, String)>>,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user with a plaintext password (dev/test use only — no
    /// hashing, since password storage is out of scope).
    pub fn add_user(&self, username: impl Into<String>, password: impl Into<String>, admin: bool, created_at: DateTime<Utc>) {
        let username = username.into();
        let user = User {
            username: username.clone(),
            permissions: Permissions { admin },
            created_at,
        };
        self.users
            .write()
            .unwrap()
            .insert(username, (user, password.into()));
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let users = self.users.read().unwrap();
        let (user, stored_password) = users.get(username)?;
        if stored_password == password {
            Some(user.clone())
        } else {
            None
        }
    }

    async fn get_by_username(&self, username: &str) -> Option<User> {
        self.users.read().unwrap().get(username).map(|(u, _)| u.clone())
    }

    async fn list_users(&self) -> Vec<User> {
        self.users.read().unwrap().values().map(|(u, _)| u.clone()).collect()
    }
}
