use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::RequestConfig;
use crate::errors::RequestError;
use crate::request::Method;

/// Names of the options an engine understands.
///
/// Named variants are stored in dedicated [`TransferOptions`] fields,
/// `Other` goes to the pass-through map untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionKey {
    Url,
    MethodOverride,
    PostBody,
    FollowRedirects,
    MaxRedirects,
    VerifyTls,
    FailOnError,
    TimeoutSeconds,
    CustomHeaders,
    CookiejarPath,
    CookieHeader,
    Port,
    AuthType,
    AuthCredentials,
    Verbose,
    UserAgent,
    Other(String),
}

impl OptionKey {
    pub fn as_str(&self) -> &str {
        match self {
            OptionKey::Url => "url",
            OptionKey::MethodOverride => "method_override",
            OptionKey::PostBody => "post_body",
            OptionKey::FollowRedirects => "follow_redirects",
            OptionKey::MaxRedirects => "max_redirects",
            OptionKey::VerifyTls => "verify_tls",
            OptionKey::FailOnError => "fail_on_error",
            OptionKey::TimeoutSeconds => "timeout_seconds",
            OptionKey::CustomHeaders => "custom_headers",
            OptionKey::CookiejarPath => "cookiejar_path",
            OptionKey::CookieHeader => "cookie_header",
            OptionKey::Port => "port",
            OptionKey::AuthType => "auth_type",
            OptionKey::AuthCredentials => "auth_credentials",
            OptionKey::Verbose => "verbose",
            OptionKey::UserAgent => "user_agent",
            OptionKey::Other(name) => name,
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loosely typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
    Bytes(Vec<u8>),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Text(_) => "text",
            OptionValue::List(_) => "list",
            OptionValue::Bytes(_) => "bytes",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self { OptionValue::Bool(v) }
}
impl From<i64> for OptionValue {
    fn from(v: i64) -> Self { OptionValue::Int(v) }
}
impl From<u16> for OptionValue {
    fn from(v: u16) -> Self { OptionValue::Int(v as i64) }
}
impl From<u32> for OptionValue {
    fn from(v: u32) -> Self { OptionValue::Int(v as i64) }
}
impl From<&str> for OptionValue {
    fn from(v: &str) -> Self { OptionValue::Text(v.to_string()) }
}
impl From<String> for OptionValue {
    fn from(v: String) -> Self { OptionValue::Text(v) }
}
impl From<Vec<String>> for OptionValue {
    fn from(v: Vec<String>) -> Self { OptionValue::List(v) }
}
impl From<Vec<u8>> for OptionValue {
    fn from(v: Vec<u8>) -> Self { OptionValue::Bytes(v) }
}

/// HTTP authentication scheme handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// Let the engine pick whatever it supports best.
    #[default]
    Any,
    Basic,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Any => "any",
            AuthScheme::Basic => "basic",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("any") {
            Some(AuthScheme::Any)
        } else if s.eq_ignore_ascii_case("basic") {
            Some(AuthScheme::Basic)
        } else {
            None
        }
    }
}

/// Request body as the engine sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub data: Vec<u8>,
    /// Content type implied by the payload; a caller supplied `Content-Type` header wins.
    pub content_type: Option<String>,
}

/// All options of one request. Last write wins per key.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub post_body: Option<RequestBody>,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub verify_tls: bool,
    pub fail_on_error: bool,
    pub timeout: Duration,
    pub custom_headers: Vec<String>,
    pub cookiejar_path: Option<PathBuf>,
    pub cookie_header: Option<String>,
    pub port: Option<u16>,
    pub auth_type: Option<AuthScheme>,
    pub auth_credentials: Option<String>,
    pub verbose: bool,
    pub user_agent: Option<String>,
    /// Engine specific options passed through verbatim.
    pub extra: BTreeMap<String, OptionValue>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&RequestConfig::default())
    }
}

impl TransferOptions {
    pub fn from_config(config: &RequestConfig) -> Self {
        Self {
            url: None,
            method: None,
            post_body: None,
            follow_redirects: config.follow_redirects,
            max_redirects: config.max_redirects,
            verify_tls: config.verify_tls,
            fail_on_error: config.fail_on_error,
            timeout: config.timeout,
            custom_headers: Vec::new(),
            cookiejar_path: None,
            cookie_header: None,
            port: None,
            auth_type: None,
            auth_credentials: None,
            verbose: false,
            user_agent: config.user_agent.clone(),
            extra: BTreeMap::new(),
        }
    }

    /// Stores `value` under `key`, checking that it has the type the key expects.
    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<(), RequestError> {
        let mismatch = |key: &OptionKey, value: &OptionValue| {
            RequestError::Configuration(format!("option {key} does not accept a {} value", value.kind()))
        };

        match (&key, value) {
            (OptionKey::Url, OptionValue::Text(s)) => self.url = Some(s),
            (OptionKey::MethodOverride, OptionValue::Text(s)) => {
                let method = s.parse::<Method>().map_err(RequestError::Configuration)?;
                self.method = Some(method);
            }
            (OptionKey::PostBody, OptionValue::Bytes(data)) => {
                self.post_body = Some(RequestBody { data, content_type: None });
            }
            (OptionKey::PostBody, OptionValue::Text(s)) => {
                self.post_body = Some(RequestBody { data: s.into_bytes(), content_type: None });
            }
            (OptionKey::FollowRedirects, OptionValue::Bool(b)) => self.follow_redirects = b,
            (OptionKey::MaxRedirects, OptionValue::Int(n)) => {
                if n < 1 || n > u32::MAX as i64 {
                    return Err(RequestError::Configuration(format!("max_redirects {n} must be at least 1")));
                }
                self.max_redirects = n as u32;
            }
            (OptionKey::VerifyTls, OptionValue::Bool(b)) => self.verify_tls = b,
            (OptionKey::FailOnError, OptionValue::Bool(b)) => self.fail_on_error = b,
            (OptionKey::TimeoutSeconds, OptionValue::Int(n)) => {
                if n <= 0 {
                    return Err(RequestError::Configuration(format!("timeout_seconds {n} must be positive")));
                }
                self.timeout = Duration::from_secs(n as u64);
            }
            (OptionKey::CustomHeaders, OptionValue::List(list)) => self.custom_headers = list,
            (OptionKey::CookiejarPath, OptionValue::Text(s)) => self.cookiejar_path = Some(PathBuf::from(s)),
            (OptionKey::CookieHeader, OptionValue::Text(s)) => self.cookie_header = Some(s),
            (OptionKey::Port, OptionValue::Int(n)) => {
                let port = u16::try_from(n)
                    .map_err(|_| RequestError::Configuration(format!("port {n} is out of range")))?;
                self.port = Some(port);
            }
            (OptionKey::AuthType, OptionValue::Text(s)) => {
                let scheme = AuthScheme::parse(&s)
                    .ok_or_else(|| RequestError::Configuration(format!("unknown auth scheme {s:?}")))?;
                self.auth_type = Some(scheme);
            }
            (OptionKey::AuthCredentials, OptionValue::Text(s)) => self.auth_credentials = Some(s),
            (OptionKey::Verbose, OptionValue::Bool(b)) => self.verbose = b,
            (OptionKey::UserAgent, OptionValue::Text(s)) => self.user_agent = Some(s),
            (OptionKey::Other(name), value) => {
                self.extra.insert(name.clone(), value);
            }
            (key, value) => return Err(mismatch(key, &value)),
        }

        Ok(())
    }

    /// Returns the current value of `key`, or `UnknownOption` when it was never set.
    pub fn get(&self, key: &OptionKey) -> Result<OptionValue, RequestError> {
        let value = match key {
            OptionKey::Url => self.url.clone().map(OptionValue::Text),
            OptionKey::MethodOverride => self.method.map(|m| OptionValue::Text(m.as_str().to_string())),
            OptionKey::PostBody => self.post_body.as_ref().map(|b| OptionValue::Bytes(b.data.clone())),
            OptionKey::FollowRedirects => Some(OptionValue::Bool(self.follow_redirects)),
            OptionKey::MaxRedirects => Some(OptionValue::Int(self.max_redirects as i64)),
            OptionKey::VerifyTls => Some(OptionValue::Bool(self.verify_tls)),
            OptionKey::FailOnError => Some(OptionValue::Bool(self.fail_on_error)),
            OptionKey::TimeoutSeconds => Some(OptionValue::Int(self.timeout.as_secs() as i64)),
            OptionKey::CustomHeaders => Some(OptionValue::List(self.custom_headers.clone())),
            OptionKey::CookiejarPath => self
                .cookiejar_path
                .as_ref()
                .map(|p| OptionValue::Text(p.display().to_string())),
            OptionKey::CookieHeader => self.cookie_header.clone().map(OptionValue::Text),
            OptionKey::Port => self.port.map(OptionValue::from),
            OptionKey::AuthType => self.auth_type.map(|a| OptionValue::Text(a.as_str().to_string())),
            OptionKey::AuthCredentials => self.auth_credentials.clone().map(OptionValue::Text),
            OptionKey::Verbose => Some(OptionValue::Bool(self.verbose)),
            OptionKey::UserAgent => self.user_agent.clone().map(OptionValue::Text),
            OptionKey::Other(name) => self.extra.get(name).cloned(),
        };

        value.ok_or_else(|| RequestError::UnknownOption(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_config() {
        let opts = TransferOptions::default();
        assert!(opts.follow_redirects);
        assert_eq!(opts.max_redirects, 5);
        assert!(opts.verify_tls);
        assert!(!opts.fail_on_error);
        assert_eq!(opts.timeout, Duration::from_secs(60));
    }

    #[test]
    fn last_write_wins() {
        let mut opts = TransferOptions::default();
        opts.set(OptionKey::Url, "http://a/".into()).unwrap();
        opts.set(OptionKey::Url, "http://b/".into()).unwrap();
        assert_eq!(opts.get(&OptionKey::Url).unwrap(), OptionValue::Text("http://b/".into()));
    }

    #[test]
    fn unset_key_is_unknown() {
        let opts = TransferOptions::default();
        assert!(matches!(opts.get(&OptionKey::Port), Err(RequestError::UnknownOption(OptionKey::Port))));
        assert!(matches!(
            opts.get(&OptionKey::Other("x-engine".into())),
            Err(RequestError::UnknownOption(_))
        ));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut opts = TransferOptions::default();
        let err = opts.set(OptionKey::FollowRedirects, "yes".into()).unwrap_err();
        assert!(matches!(err, RequestError::Configuration(_)));
        assert!(opts.follow_redirects);
    }

    #[test]
    fn method_override_parses_names() {
        let mut opts = TransferOptions::default();
        opts.set(OptionKey::MethodOverride, "patch".into()).unwrap();
        assert_eq!(opts.method, Some(Method::Patch));
        assert!(opts.set(OptionKey::MethodOverride, "BREW".into()).is_err());
    }

    #[test]
    fn other_keys_pass_through() {
        let mut opts = TransferOptions::default();
        opts.set(OptionKey::Other("buffer_size".into()), OptionValue::Int(4096)).unwrap();
        assert_eq!(opts.extra.get("buffer_size"), Some(&OptionValue::Int(4096)));
        assert_eq!(
            opts.get(&OptionKey::Other("buffer_size".into())).unwrap(),
            OptionValue::Int(4096)
        );
    }

    #[test]
    fn numeric_ranges_are_checked() {
        let mut opts = TransferOptions::default();
        assert!(opts.set(OptionKey::Port, OptionValue::Int(70_000)).is_err());
        assert!(opts.set(OptionKey::MaxRedirects, OptionValue::Int(0)).is_err());
        assert!(opts.set(OptionKey::TimeoutSeconds, OptionValue::Int(0)).is_err());
        opts.set(OptionKey::Port, OptionValue::Int(8080)).unwrap();
        assert_eq!(opts.port, Some(8080));
    }
}
