//! Session cookie configuration.

use serde::{Deserialize, Serialize};

fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_same_site() -> String {
    "Strict".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_false() -> bool {
    false
}

/// Cookie-related session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Whether to mark the cookie `Secure`. Also forced on automatically
    /// when the request arrives over HTTPS (forwarded-proto or URL scheme).
    #[serde(default = "default_false")]
    pub secure: bool,

    /// `SameSite` attribute: `Strict`, `Lax`, or `None`.
    #[serde(default = "default_same_site")]
    pub same_site: String,

    /// Cookie path.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure: default_false(),
            same_site: default_same_site(),
            path: default_path(),
        }
    }
}
