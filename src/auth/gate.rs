//! The auth gate: allow-list matching, auth-internal bypass, and the
//! development no-security roster cycling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Error;
use crate::session::Session;

use super::config::{AuthConfig, NoSecurity, AUTH_INTERNAL_PATHS};
use super::user_store::{User, UserStore};

/// `true` iff `path` is covered by the allow-list: an exact match, or
/// prefixed by an entry followed by `/` or `?`.
#[must_use]
pub fn is_allow_listed(path: &str, allow_list: &[String]) -> bool {
    allow_list.iter().any(|entry| {
        path == entry
            || path.starts_with(&format!("{entry}/"))
            || path.starts_with(&format!("{entry}?"))
    })
}

/// `true` iff `path` is one of the four always-open auth-internal
/// endpoints.
#[must_use]
pub fn is_auth_internal(path: &str) -> bool {
    AUTH_INTERNAL_PATHS.contains(&path)
}

/// Order the roster the way no-security cycling requires: admins
/// first, then the rest by ascending creation timestamp. Ties within
/// each group preserve input order (a stable sort).
#[must_use]
pub fn ordered_roster(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| {
        b.permissions
            .admin
            .cmp(&a.permissions.admin)
            .then(a.created_at.cmp(&b.created_at))
    });
    users
}

/// Deterministically assigns a roster user to each newly seen
/// anonymous session under no-security mode, and remembers the
/// assignment so the same session keeps the same user for the
/// lifetime of the process.
#[derive(Default)]
struct Cycler {
    assignments: DashMap<String, String>,
    counter: AtomicUsize,
}

impl Cycler {
    /// Resolve (assigning if necessary) the username for `session_id`.
    /// Returns `None` if the roster is empty.
    fn assign(&self, session_id: &str, roster: &[User]) -> Option<String> {
        if let Some(existing) = self.assignments.get(session_id) {
            return Some(existing.clone());
        }
        if roster.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % roster.len();
        let username = roster[index].username.clone();
        self.assignments
            .insert(session_id.to_string(), username.clone());
        Some(username)
    }
}

/// The session/auth gate: decides whether a request may proceed.
pub struct AuthGate {
    config: AuthConfig,
    user_store: Arc<dyn UserStore>,
    cycler: Cycler,
}

impl AuthGate {
    #[must_use]
    pub fn new(config: AuthConfig, user_store: Arc<dyn UserStore>) -> Self {
        Self {
            config,
            user_store,
            cycler: Cycler::default(),
        }
    }

    /// Decide whether `path` may proceed for `session`, mutating the
    /// session under dev no-security cycling as a side effect.
    ///
    /// Non-`/api` paths bypass the gate entirely, matching the
    /// upstream HTTP collaborator's contract.
    pub async fn check(&self, path: &str, session: &Session) -> Result<(), Error> {
        if !path.starts_with("/api") {
            return Ok(());
        }
        if is_auth_internal(path) || is_allow_listed(path, &self.config.allow_list) {
            return Ok(());
        }

        if let Some(user_id) = session.user_id() {
            if self.user_store.get_by_username(&user_id).await.is_some() {
                return Ok(());
            }
        }

        match &self.config.no_security {
            NoSecurity::Off => Err(Error::Unauthorized(format!("no session user for {path}"))),
            NoSecurity::PinnedUser(name) => {
                session.set_user_id(Some(name.clone()));
                Ok(())
            }
            NoSecurity::On => {
                let roster = ordered_roster(self.user_store.list_users().await);
                match self.cycler.assign(session.id(), &roster) {
                    Some(username) => {
                        session.set_user_id(Some(username));
                        Ok(())
                    }
                    None => Err(Error::Unauthorized("no-security roster is empty".into())),
                }
            }
        }
    }
}
