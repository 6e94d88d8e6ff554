//! Cookie header parsing and `Set-Cookie` emission.

use base64::Engine;
use rand::RngCore;

/// Mint a fresh, cryptographically random, URL-safe session id.
#[must_use]
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Read a named cookie's value out of a raw `Cookie` header value.
#[must_use]
pub fn parse_cookie(header_value: &str, name: &str) -> Option<String> {
    header_value.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (key, value) = pair.split_once('=')?;
        if key.trim() == name {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// Build the `Set-Cookie` header value for a session id.
///
/// `secure` should be `true` when the cookie config requests it or the
/// request arrived over HTTPS (forwarded-proto or URL scheme).
#[must_use]
pub fn build_set_cookie(
    name: &str,
    value: &str,
    path: &str,
    same_site: &str,
    secure: bool,
) -> String {
    let mut header = format!("{name}={value}; Path={path}; HttpOnly; SameSite={same_site}");
    if secure {
        header.push_str("; Secure");
    }
    header
}

/// Decide whether a request should be treated as HTTPS for cookie
/// `Secure` purposes: either an `X-Forwarded-Proto: https` header, or a
/// `https`/`wss` URL scheme.
#[must_use]
pub fn is_secure_request(forwarded_proto: Option<&str>, url_scheme: Option<&str>) -> bool {
    forwarded_proto.map(|p| p.eq_ignore_ascii_case("https")).unwrap_or(false)
        || url_scheme
            .map(|s| s.eq_ignore_ascii_case("https") || s.eq_ignore_ascii_case("wss"))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_nonempty_unique_ids() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn parses_named_cookie_among_several() {
        let header = "foo=bar; session_id=abc123; other=1";
        assert_eq!(parse_cookie(header, "session_id"), Some("abc123".to_string()));
        assert_eq!(parse_cookie(header, "missing"), None);
    }

    #[test]
    fn builds_set_cookie_header() {
        let header = build_set_cookie("session_id", "abc", "/", "Strict", true);
        assert!(header.contains("session_id=abc"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Secure"));
    }

    #[test]
    fn secure_omitted_when_not_https() {
        let header = build_set_cookie("session_id", "abc", "/", "Lax", false);
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn is_secure_request_detects_forwarded_proto_and_scheme() {
        assert!(is_secure_request(Some("https"), None));
        assert!(is_secure_request(None, Some("wss")));
        assert!(!is_secure_request(Some("http"), Some("ws")));
    }
}
