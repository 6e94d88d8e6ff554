//! Auth gate configuration: allow-list, auth-internal paths, and the
//! development no-security switch.

use serde::{Deserialize, Serialize};

/// The four endpoints that always pass through to their handlers
/// regardless of session state, since they implement the auth flow
/// itself.
pub const AUTH_INTERNAL_PATHS: [&str; 4] =
    ["/api/context", "/api/login", "/api/logout", "/api/users/me"];

fn default_allow_list() -> Vec<String> {
    Vec::new()
}

/// The process-wide no-security switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum NoSecurity {
    /// Normal auth enforcement.
    #[default]
    Off,
    /// Cycle anonymous sessions through the seeded roster.
    On,
    /// Pin every anonymous session to this named user.
    PinnedUser(String),
}

impl NoSecurity {
    /// Parse the raw config value the way the source flag is read: a
    /// boolean-ish string enables cycling, anything else is treated as
    /// a literal username to pin to, and absence/false disables it.
    #[must_use]
    pub fn from_flag_value(value: Option<&str>) -> Self {
        match value {
            None => Self::Off,
            Some(v) if v.eq_ignore_ascii_case("false") || v.is_empty() => Self::Off,
            Some(v) if v.eq_ignore_ascii_case("true") => Self::On,
            Some(v) => Self::PinnedUser(v.to_string()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Auth gate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path prefixes that bypass the gate for anonymous sessions.
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,

    /// Development no-security switch.
    #[serde(default)]
    pub no_security: NoSecurity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_value_parsing() {
        assert!(matches!(NoSecurity::from_flag_value(None), NoSecurity::Off));
        assert!(matches!(NoSecurity::from_flag_value(Some("false")), NoSecurity::Off));
        assert!(matches!(NoSecurity::from_flag_value(Some("true")), NoSecurity::On));
        match NoSecurity::from_flag_value(Some("alice")) {
            NoSecurity::PinnedUser(name) => assert_eq!(name, "alice"),
            other => panic!("expected pinned user, got {other:?}"),
        }
    }
}
