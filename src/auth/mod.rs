//! Session/auth gate: allow-list, auth-internal bypass, and the
//! development no-security roster cycling described in the module
//! overview.
//!
//! Account storage and credential verification are delegated to a
//! [`UserStore`] implementation; this crate ships only an in-memory one
//! for tests and dev-mode use.

mod config;
mod gate;
mod user_store;

pub use config::{AuthConfig, NoSecurity, AUTH_INTERNAL_PATHS};
pub use gate::{is_allow_listed, is_auth_internal, ordered_roster, AuthGate};
pub use user_store::{InMemoryUserStore, Permissions, User, UserStore};
