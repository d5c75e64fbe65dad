//! JSON file backed cookie jar.
//!
//! `FileCookieJar` is what the reqwest engine uses when a request has a
//! cookiejar path. The file is read once when the jar is opened and written
//! back by [`FileCookieJar::save`], which the engine calls when its handle is
//! closed. In between, all reads and writes hit the in-memory [`CookieJar`].
//!
//! ### I/O characteristics & caveats
//! - The whole file is rewritten on every save. File writes are not atomic.
//! - An empty file (as created by the writability check) is an empty jar.
//! - A file that does not deserialize is treated as empty and logged; it is
//!   overwritten on the next save.
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use url::Url;

use crate::cookies::CookieJar;

pub struct FileCookieJar {
    /// Path to the JSON file where cookies are stored.
    path: PathBuf,
    jar: RwLock<CookieJar>,
}

impl FileCookieJar {
    /// Opens the jar at `path`. A missing file yields an empty jar.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        let jar = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => CookieJar::new(),
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("Cookiejar {} is not readable as JSON ({e}), starting empty", path.display());
                CookieJar::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => CookieJar::new(),
            Err(e) => return Err(e),
        };

        log::debug!("Opened cookiejar {} with {} cookies", path.display(), jar.len());

        Ok(Self {
            path,
            jar: RwLock::new(jar),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes and writes the full jar (pretty-printed).
    pub fn save(&self) -> io::Result<()> {
        let snapshot = self.snapshot();
        let contents = serde_json::to_string_pretty(&snapshot).map_err(io::Error::other)?;
        fs::write(&self.path, contents)?;
        log::debug!("Saved {} cookies to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    /// A copy of the current jar state.
    pub fn snapshot(&self) -> CookieJar {
        self.jar.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn store_set_cookie(&self, url: &Url, header: &str) {
        self.jar
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_set_cookie(url, header);
    }

    pub fn request_cookies(&self, url: &Url) -> Option<String> {
        self.jar.read().unwrap_or_else(PoisonError::into_inner).request_cookies(url)
    }
}

impl reqwest::cookie::CookieStore for FileCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &http::HeaderValue>, url: &Url) {
        let mut jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
        for header in cookie_headers {
            if let Ok(header) = header.to_str() {
                jar.store_set_cookie(url, header);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<http::HeaderValue> {
        self.request_cookies(url)
            .and_then(|cookies| http::HeaderValue::from_str(&cookies).ok())
    }
}
