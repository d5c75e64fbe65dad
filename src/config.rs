//! Request configuration.
//!
//! `RequestConfig` holds the settings the request core itself branches on:
//! redirect handling, TLS verification, timeouts and error classification.
//! Everything else an engine might understand goes through
//! [`Request::set_option`](crate::Request::set_option).
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use http_request::RequestConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = RequestConfig::builder()
//!     .max_redirects(10)
//!     .timeout(Duration::from_secs(5))
//!     .user_agent("crawler/0.3")
//!     .build()?; // returns Result<RequestConfig, ConfigError>
//! assert_eq!(cfg.max_redirects, 10);
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `follow_redirects`: follow `Location` headers (default: `true`).
//! - `max_redirects`: redirect budget; reaching it fails the send (default: 5).
//! - `verify_tls`: verify peer certificates (default: `true`).
//! - `fail_on_error`: let the engine treat status >= 400 as a transport failure (default: `false`).
//! - `timeout`: upper bound for one whole exchange (default: 60 s).
//! - `user_agent`: optional `User-Agent` override.
//! - `suppress_errors`: do not raise on status >= 400 (default: `false`).

use std::fmt;
use std::time::Duration;

use crate::errors::RequestError;

const DEFAULT_MAX_REDIRECTS: u32 = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub verify_tls: bool,
    pub fail_on_error: bool,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub suppress_errors: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            verify_tls: true,
            fail_on_error: false,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            suppress_errors: false,
        }
    }
}

impl RequestConfig {
    pub fn builder() -> RequestConfigBuilder {
        RequestConfigBuilder::default()
    }
}

/// Builder for [`RequestConfig`].
#[derive(Debug, Clone, Default)]
pub struct RequestConfigBuilder {
    inner: RequestConfig,
}

impl RequestConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut RequestConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn follow_redirects(self, on: bool) -> Self { self.map(|c| c.follow_redirects = on) }
    pub fn max_redirects(self, n: u32) -> Self { self.map(|c| c.max_redirects = n) }
    pub fn verify_tls(self, on: bool) -> Self { self.map(|c| c.verify_tls = on) }
    pub fn fail_on_error(self, on: bool) -> Self { self.map(|c| c.fail_on_error = on) }
    pub fn timeout(self, timeout: Duration) -> Self { self.map(|c| c.timeout = timeout) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = Some(ua.into())) }
    pub fn suppress_errors(self, on: bool) -> Self { self.map(|c| c.suppress_errors = on) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut RequestConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<RequestConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroTimeout,
    ZeroRedirects,
    EmptyUserAgent,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTimeout =>
                write!(f, "timeout must be greater than zero"),
            ConfigError::ZeroRedirects =>
                write!(f, "max_redirects must be at least 1 when redirects are followed"),
            ConfigError::EmptyUserAgent =>
                write!(f, "user_agent must not be empty"),
        }
    }
}
impl std::error::Error for ConfigError {}

impl From<ConfigError> for RequestError {
    fn from(e: ConfigError) -> Self {
        RequestError::Configuration(e.to_string())
    }
}

fn validate(c: &RequestConfig) -> Result<(), ConfigError> {
    if c.timeout.is_zero() {
        return Err(ConfigError::ZeroTimeout);
    }
    if c.follow_redirects && c.max_redirects == 0 {
        return Err(ConfigError::ZeroRedirects);
    }
    if matches!(c.user_agent.as_deref(), Some(ua) if ua.trim().is_empty()) {
        return Err(ConfigError::EmptyUserAgent);
    }
    Ok(())
}
