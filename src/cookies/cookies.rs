//! Cookie core type and `Set-Cookie` parsing.
//!
//! The [`Cookie`] struct is used both for cookies read from a response and for
//! the records persisted by [`FileCookieJar`](crate::cookies::FileCookieJar).
//! It (de)serializes via `serde`.
//!
//! ```rust
//! use http_request::cookies::parse_set_cookie;
//!
//! let c = parse_set_cookie("session=abc123; Path=/; Secure; HttpOnly; SameSite=lax").unwrap();
//! assert_eq!(c.name, "session");
//! assert_eq!(c.value, "abc123");
//! assert_eq!(c.same_site.as_deref(), Some("Lax"));
//! assert!(c.secure && c.http_only);
//! ```

use serde::{Deserialize, Serialize};

/// A cookie as received from a server or stored in a jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Path scoping (e.g., `"/"`). Jars fill in the default path when absent.
    pub path: Option<String>,

    /// Domain scoping (host-only if `None`), leading dot stripped.
    pub domain: Option<String>,

    /// If `true`, cookie is sent only over HTTPS.
    pub secure: bool,

    /// Expiration timestamp as sent by the server. Stored, not enforced.
    pub expires: Option<String>,

    /// `Max-Age` in seconds. A value of zero or less deletes the cookie from a jar.
    #[serde(default)]
    pub max_age: Option<i64>,

    /// SameSite policy (`"Strict"`, `"Lax"`, or `"None"`).
    pub same_site: Option<String>,

    /// If `true`, cookie is blocked from access by client-side scripts.
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            secure: false,
            expires: None,
            max_age: None,
            same_site: None,
            http_only: false,
        }
    }

    /// True when the server asked for the cookie to be removed.
    pub fn is_removal(&self) -> bool {
        matches!(self.max_age, Some(age) if age <= 0)
    }
}

/// Parses one `Set-Cookie` header value.
///
/// Folded values (`"a=1\r\n\tPath=/"`) are accepted; the fold acts as an
/// attribute separator. Returns `None` when there is no `name=value` pair.
pub fn parse_set_cookie(header: &str) -> Option<Cookie> {
    let unfolded = header.replace("\r\n\t", "; ");
    let mut parts = unfolded.split(';');

    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));

    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((k, v)) = part.split_once('=') {
            let v = v.trim();
            match k.trim().to_ascii_lowercase().as_str() {
                "path" => cookie.path = Some(v.to_string()),
                "domain" => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                "expires" => cookie.expires = Some(v.to_string()),
                "max-age" => cookie.max_age = v.parse().ok(),
                "samesite" => {
                    // normalize to "Lax" | "Strict" | "None"
                    cookie.same_site = Some(if v.eq_ignore_ascii_case("lax") {
                        "Lax".to_string()
                    } else if v.eq_ignore_ascii_case("strict") {
                        "Strict".to_string()
                    } else if v.eq_ignore_ascii_case("none") {
                        "None".to_string()
                    } else {
                        v.to_string()
                    });
                }
                _ => {}
            }
        } else if part.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if part.eq_ignore_ascii_case("httponly") {
            cookie.http_only = true;
        }
    }

    Some(cookie)
}
