//! In-memory cookie jar.
//!
//! Cookies are bucketed by **origin** (`url.origin().ascii_serialization()`).
//! Within a bucket, simple host/subdomain and segment-wise path checks are applied
//! when building the `Cookie` request header.
//!
//! ## Notes & limitations
//! - `Expires` is stored but not enforced. `Max-Age <= 0` removes the cookie.
//! - No size limits or eviction.
//! - Not internally synchronized; [`FileCookieJar`](super::FileCookieJar) wraps it in a lock.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cookies::{parse_set_cookie, Cookie};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieJar {
    /// Cookies per origin, in the order they were first set.
    pub entries: BTreeMap<String, Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one `Set-Cookie` header value received for `url`.
    ///
    /// A cookie with the same name replaces the existing one in place.
    pub fn store_set_cookie(&mut self, url: &Url, header: &str) {
        let Some(mut cookie) = parse_set_cookie(header) else {
            log::warn!("Ignoring malformed Set-Cookie header from {url}");
            return;
        };

        let origin = url.origin().ascii_serialization();
        let bucket = self.entries.entry(origin).or_default();

        if cookie.is_removal() {
            bucket.retain(|c| c.name != cookie.name);
            return;
        }

        if cookie.path.is_none() {
            cookie.path = Some(default_path(url).to_string());
        }

        // Replace existing cookie with same name
        if let Some(existing) = bucket.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            bucket.push(cookie);
        }
    }

    /// Returns the `Cookie` request header value to send for `url`, if any.
    pub fn request_cookies(&self, url: &Url) -> Option<String> {
        let origin = url.origin().ascii_serialization();
        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        let is_https = url.scheme() == "https";

        let header = self
            .entries
            .get(&origin)?
            .iter()
            .filter(|cookie| match &cookie.domain {
                Some(domain) => host == domain || host.ends_with(&format!(".{domain}")),
                None => true,
            })
            .filter(|cookie| match &cookie.path {
                Some(cookie_path) => path_matches(path, cookie_path),
                None => true,
            })
            .filter(|cookie| !cookie.secure || is_https)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    /// Every cookie of the jar with the origin it belongs to.
    pub fn all_cookies(&self) -> impl Iterator<Item = (&str, &Cookie)> {
        self.entries
            .iter()
            .flat_map(|(origin, cookies)| cookies.iter().map(move |c| (origin.as_str(), c)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Path match of RFC 6265 section 5.1.4: a prefix that ends at a `/` boundary.
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    match request_path.strip_prefix(cookie_path) {
        Some(rest) => rest.is_empty() || cookie_path.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

fn default_path(url: &Url) -> &str {
    url.path()
        .rsplit_once('/')
        .map_or("/", |(dir, _)| if dir.is_empty() { "/" } else { dir })
}
