//! In-memory session store.
//!
//! A process-global map from opaque session id to a mutable session
//! record. Sessions are never deleted except by explicit logout
//! (which only clears `user_id`) — the store grows until process exit.
//! This is a known limitation restated from the source material; a
//! production deployment should add a TTL or LRU bound (see DESIGN.md).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde_json::Value;

use super::cookie::generate_session_id;

#[derive(Debug, Default)]
struct SessionData {
    user_id: Option<String>,
    extra: HashMap<String, Value>,
}

/// A session record attached to a cookie-identified caller.
///
/// Cheap to clone: all clones share the same underlying record, so a
/// handler mutating a session via one clone is visible through every
/// other clone holding the same id. Object identity is therefore
/// stable for the session's lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: Arc<RwLock<SessionData>>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            data: Arc::new(RwLock::new(SessionData::default())),
        }
    }

    /// The opaque session id (the cookie value).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The authenticated user id, or `None` if anonymous.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.data.read().unwrap().user_id.clone()
    }

    /// Assign (or clear) the authenticated user id.
    pub fn set_user_id(&self, user_id: Option<String>) {
        self.data.write().unwrap().user_id = user_id;
    }

    /// `true` iff no user is attached to this session.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id().is_none()
    }

    /// Clear the user id. Does not remove the session from the store.
    pub fn logout(&self) {
        self.set_user_id(None);
    }

    /// Read an arbitrary extra key set by application code.
    #[must_use]
    pub fn get_extra(&self, key: &str) -> Option<Value> {
        self.data.read().unwrap().extra.get(key).cloned()
    }

    /// Set an arbitrary extra key.
    pub fn set_extra(&self, key: impl Into<String>, value: Value) {
        self.data.write().unwrap().extra.insert(key.into(), value);
    }
}

/// Process-global, in-memory session store.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Look up a session by cookie value without creating one.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Resolve the session for a request's cookie value, minting a
    /// fresh session (and a fresh opaque id) if the cookie is absent
    /// or unknown. Returns the session and whether it was newly created.
    #[must_use]
    pub fn get_or_create(&self, cookie_value: Option<&str>) -> (Session, bool) {
        if let Some(id) = cookie_value {
            if let Some(session) = self.get(id) {
                return (session, false);
            }
        }
        let id = generate_session_id();
        let session = Session::new(id.clone());
        self.sessions.insert(id, session.clone());
        (session, true)
    }

    /// Number of sessions currently tracked (grows monotonically; see
    /// module docs).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` iff no sessions are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cookie_mints_fresh_anonymous_session() {
        let store = SessionStore::new();
        let (session, is_new) = store.get_or_create(None);
        assert!(is_new);
        assert!(session.is_anonymous());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_cookie_mints_fresh_session_with_new_id() {
        let store = SessionStore::new();
        let (session, is_new) = store.get_or_create(Some("not-a-real-id"));
        assert!(is_new);
        assert_ne!(session.id(), "not-a-real-id");
    }

    #[test]
    fn known_cookie_returns_same_identity() {
        let store = SessionStore::new();
        let (session, _) = store.get_or_create(None);
        session.set_user_id(Some("alice".into()));

        let (again, is_new) = store.get_or_create(Some(session.id()));
        assert!(!is_new);
        assert_eq!(again.user_id(), Some("alice".to_string()));
    }

    #[test]
    fn logout_clears_user_id_but_keeps_session() {
        let store = SessionStore::new();
        let (session, _) = store.get_or_create(None);
        session.set_user_id(Some("bob".into()));
        session.logout();
        assert!(session.is_anonymous());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mutation_is_visible_through_every_clone() {
        let store = SessionStore::new();
        let (session, _) = store.get_or_create(None);
        let (clone_handle, _) = store.get_or_create(Some(session.id()));
        session.set_user_id(Some("carol".into()));
        assert_eq!(clone_handle.user_id(), Some("carol".to_string()));
    }
}
