//! Fluent request builder and send state machine.
//!
//! A [`Request`] accumulates options through chainable setters and performs
//! one blocking exchange per [`Request::send`] (or verb call). The engine
//! handle it holds is consumed by every send and replaced by a fresh one, so
//! the same request can be sent again with adjusted options.
//!
//! # Examples
//!
//! ```rust,no_run
//! use http_request::{Payload, Request, ReqwestEngine};
//! use std::sync::Arc;
//! # fn main() -> Result<(), http_request::RequestError> {
//! let mut request = Request::for_url(Arc::new(ReqwestEngine::default()), "https://example.org/search")?;
//! request
//!     .set_header("Accept: application/json")
//!     .set_cookie("session", "abc")
//!     .get_with([("q", "rust")])?;
//!
//! let response = request.response()?;
//! println!("{} {}", response.code(), response);
//! # Ok(()) }
//! ```
//!
//! # Outcome classification
//!
//! After the exchange the request checks, in this order, and raises the first
//! match only:
//! 1. the redirect count reached `max_redirects` → [`RequestError::RedirectLimit`]
//! 2. the engine reported a transport error → [`RequestError::Transport`]
//! 3. the status is 400 or above → [`RequestError::HttpStatus`] (unless suppressed)
//!
//! The response is stored before classification, so it is available through
//! [`Request::response`] even when `send` fails.

mod method;
mod payload;

use std::borrow::Cow;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::time::Duration;

use tempfile::SpooledTempFile;

use crate::config::RequestConfig;
use crate::engine::{
    error_code, AuthScheme, EngineHandle, Exchange, OptionKey, OptionValue, Sinks, TransferEngine,
    TransferEngineHandle, TransferOptions,
};
use crate::errors::RequestError;
use crate::response::Response;

pub use method::Method;
pub use payload::Payload;

/// Header blocks larger than this spill from memory into a temp file.
const HEADER_SPOOL_LIMIT: usize = 64 * 1024;
const VERBOSE_SPOOL_LIMIT: usize = 256 * 1024;

/// An engine handle that is closed when it goes out of scope.
struct ScopedHandle(Box<dyn EngineHandle>);

impl ScopedHandle {
    fn open(engine: &dyn TransferEngine) -> Result<Self, RequestError> {
        Ok(Self(engine.open()?))
    }
}

impl Deref for ScopedHandle {
    type Target = dyn EngineHandle;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for ScopedHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// What one execution captured, before it becomes a [`Response`].
struct Captured {
    raw_headers: String,
    trace: Option<String>,
    exchange: Exchange,
}

macro_rules! verbs {
    ($($name:ident, $with:ident => $method:ident, $wire:literal;)*) => {
        $(
            #[doc = concat!("Sends the request as `", $wire, "` without data.")]
            pub fn $name(&mut self) -> Result<&mut Self, RequestError> {
                self.set_method(Method::$method).send(None)
            }

            #[doc = concat!("Sends the request as `", $wire, "` with `data`.")]
            pub fn $with(&mut self, data: impl Into<Payload>) -> Result<&mut Self, RequestError> {
                self.set_method(Method::$method).send(Some(data.into()))
            }
        )*
    };
}

pub struct Request {
    engine: TransferEngineHandle,
    /// Unused handle for the next send. `None` only after reopening failed.
    handle: Option<ScopedHandle>,
    cookies: Vec<(String, String)>,
    options: TransferOptions,
    suppress_errors: bool,
    verbose: Option<SpooledTempFile>,
    response: Option<Response>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("options", &self.options)
            .field("cookies", &self.cookies)
            .field("suppress_errors", &self.suppress_errors)
            .field("verbose", &self.verbose.is_some())
            .field("response", &self.response.as_ref().map(Response::code))
            .finish()
    }
}

impl Request {
    /// Creates a request with the default configuration.
    pub fn new(engine: TransferEngineHandle) -> Result<Self, RequestError> {
        Self::with_config(engine, RequestConfig::default())
    }

    pub fn with_config(engine: TransferEngineHandle, config: RequestConfig) -> Result<Self, RequestError> {
        let handle = ScopedHandle::open(engine.as_ref())?;
        Ok(Self {
            engine,
            handle: Some(handle),
            cookies: Vec::new(),
            options: TransferOptions::from_config(&config),
            suppress_errors: config.suppress_errors,
            verbose: None,
            response: None,
        })
    }

    pub fn for_url(engine: TransferEngineHandle, url: impl Into<String>) -> Result<Self, RequestError> {
        let mut request = Self::new(engine)?;
        request.set_url(url);
        Ok(request)
    }

    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.options.method = Some(method);
        self
    }

    /// The method the next send uses. Unset means `GET`.
    pub fn method(&self) -> Method {
        self.options.method.unwrap_or(Method::Get)
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.options.url = Some(url.into());
        self
    }

    pub fn url(&self) -> Result<&str, RequestError> {
        self.options
            .url
            .as_deref()
            .ok_or_else(|| RequestError::Configuration("No URL has been set".into()))
    }

    /// Appends a raw `Name: value` header line. Duplicates are kept.
    pub fn set_header(&mut self, line: impl Into<String>) -> &mut Self {
        self.options.custom_headers.push(line.into());
        self
    }

    /// Sets a cookie sent with the `Cookie` header. Last write wins per name.
    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let (name, value) = (name.into(), value.into());
        match self.cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.cookies.push((name, value)),
        }
        self
    }

    /// Persists cookies in a file owned by the engine.
    pub fn set_cookiejar(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.options.cookiejar_path = Some(path.into());
        self
    }

    pub fn set_option(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> Result<&mut Self, RequestError> {
        let value = value.into();
        log::debug!("Setting option {key} to {value:?}");
        self.options.set(key, value)?;
        Ok(self)
    }

    pub fn option(&self, key: &OptionKey) -> Result<OptionValue, RequestError> {
        self.options.get(key)
    }

    /// Stores `user:pass` credentials for the given scheme.
    pub fn authorize(&mut self, user: &str, pass: &str, scheme: AuthScheme) -> &mut Self {
        self.options.auth_credentials = Some(format!("{user}:{pass}"));
        self.options.auth_type = Some(scheme);
        self
    }

    pub fn set_authorization(&mut self, user: &str, pass: &str, scheme: AuthScheme) -> &mut Self {
        self.authorize(user, pass, scheme)
    }

    /// Captures the engine's protocol trace into the response headers.
    pub fn set_verbose(&mut self) -> &mut Self {
        if self.verbose.is_none() {
            self.verbose = Some(tempfile::spooled_tempfile(VERBOSE_SPOOL_LIMIT));
        }
        self.options.verbose = true;
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.timeout = timeout;
        self
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.options.port = Some(port);
        self
    }

    /// Lets the engine itself fail on status >= 400 (reported as a transport error).
    pub fn set_fail_on_error(&mut self, fail: bool) -> &mut Self {
        self.options.fail_on_error = fail;
        self
    }

    pub fn fail_on_error(&self) -> bool {
        self.options.fail_on_error
    }

    /// Do not raise [`RequestError::HttpStatus`] for status >= 400.
    pub fn suppress_errors(&mut self, suppress: bool) -> &mut Self {
        self.suppress_errors = suppress;
        self
    }

    verbs! {
        get, get_with => Get, "GET";
        post, post_with => Post, "POST";
        put, put_with => Put, "PUT";
        delete, delete_with => Delete, "DELETE";
        patch, patch_with => Patch, "PATCH";
        options, options_with => Options, "OPTIONS";
        trace, trace_with => Trace, "TRACE";
        connect, connect_with => Connect, "CONNECT";
    }

    /// Sends the request as `HEAD`.
    pub fn head(&mut self) -> Result<&mut Self, RequestError> {
        self.set_method(Method::Head).send(None)
    }

    /// Performs one exchange with the current options.
    ///
    /// For `GET`, `data` is appended to the URL as a query string (and the
    /// stored URL keeps it). For every other method it becomes the body.
    pub fn send(&mut self, data: Option<Payload>) -> Result<&mut Self, RequestError> {
        let method = self.method();
        self.check_cookiejar()?;
        self.prepare(method, data)?;
        log::debug!("Sending {method} {}", self.url()?);

        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => ScopedHandle::open(self.engine.as_ref())?,
        };
        let captured = self.perform(handle);

        // The consumed handle is closed at this point.
        let mut next = ScopedHandle::open(self.engine.as_ref())?;
        if let Ok(Captured { exchange: Exchange { info: Some(info), .. }, .. }) = &captured {
            next.inherit(info);
        }
        self.handle = Some(next);

        let Captured { raw_headers, trace, exchange } = captured?;
        self.response = Some(Response::new(&raw_headers, trace.as_deref(), exchange.body, exchange.info));

        self.classify()?;
        Ok(self)
    }

    /// The response of the last send.
    pub fn response(&self) -> Result<&Response, RequestError> {
        self.response.as_ref().ok_or(RequestError::NoResponse)
    }

    pub fn response_mut(&mut self) -> Result<&mut Response, RequestError> {
        self.response.as_mut().ok_or(RequestError::NoResponse)
    }

    /// Body of the last response.
    pub fn body(&self) -> Result<&[u8], RequestError> {
        self.response.as_ref().ok_or(RequestError::NoBody)?.body()
    }

    /// Invokes an engine operation by name on the current handle.
    pub fn invoke_raw(&mut self, operation: &str, args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => ScopedHandle::open(self.engine.as_ref())?,
        };
        let handle = self.handle.insert(handle);
        log::debug!("Invoking engine operation {operation} with {} arguments", args.len());
        handle.invoke(operation, args)
    }

    /// Releases the engine handle.
    pub fn close(mut self) {
        self.handle.take();
    }

    fn prepare(&mut self, method: Method, data: Option<Payload>) -> Result<(), RequestError> {
        let url = self.url()?;
        if method == Method::Get {
            if let Some(data) = data {
                let query = data.to_query()?;
                if !query.is_empty() {
                    let separator = if url.contains('?') { '&' } else { '?' };
                    self.options.url = Some(format!("{url}{separator}{query}"));
                }
            }
            self.options.post_body = None;
        } else {
            self.options.post_body = data.map(Payload::into_body);
        }

        if !self.cookies.is_empty() {
            let header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.options.cookie_header = Some(header);
        }

        self.options.verbose = self.verbose.is_some();
        Ok(())
    }

    fn check_cookiejar(&self) -> Result<(), RequestError> {
        if let Some(path) = &self.options.cookiejar_path {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| RequestError::Cookiejar { path: path.clone(), source })?;
        }
        Ok(())
    }

    fn perform(&mut self, mut handle: ScopedHandle) -> Result<Captured, RequestError> {
        handle.configure(&self.options)?;

        let mut header_sink = tempfile::spooled_tempfile(HEADER_SPOOL_LIMIT);
        if let Some(trace) = self.verbose.as_mut() {
            trace.seek(SeekFrom::Start(0))?;
            trace.set_len(0)?;
        }

        let exchange = handle.execute(Sinks {
            header: &mut header_sink,
            verbose: self.verbose.as_mut().map(|t| t as &mut dyn Write),
        });
        drop(handle);

        let raw_headers = drain(&mut header_sink)?;
        let trace = self.verbose.as_mut().map(drain).transpose()?;
        log::trace!(
            "Captured {} header bytes and {} trace bytes",
            raw_headers.len(),
            trace.as_ref().map_or(0, String::len)
        );

        Ok(Captured { raw_headers, trace, exchange })
    }

    fn classify(&self) -> Result<(), RequestError> {
        let response = self.response()?;
        let Ok(info) = response.info() else {
            return Err(RequestError::Transport {
                code: error_code::FAILED_INIT,
                message: "engine reported no transfer metadata".into(),
            });
        };

        let max = self.options.max_redirects;
        if info.redirect_count > 0 && info.redirect_count >= max {
            return Err(RequestError::RedirectLimit { count: info.redirect_count, max });
        }

        if info.error_code != error_code::OK {
            return Err(RequestError::Transport {
                code: info.error_code,
                message: info.error_message.clone(),
            });
        }

        if info.http_code >= 400 && !self.suppress_errors {
            return Err(RequestError::HttpStatus {
                code: info.http_code,
                body: response.text().map(Cow::into_owned).unwrap_or_default(),
            });
        }

        Ok(())
    }
}

fn drain(sink: &mut SpooledTempFile) -> io::Result<String> {
    let mut bytes = Vec::new();
    sink.seek(SeekFrom::Start(0))?;
    sink.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockEngine, Scripted};
    use crate::headers::HeaderValue;

    fn request(engine: &MockEngine, url: &str) -> Request {
        Request::for_url(engine.handle(), url).unwrap()
    }

    #[test]
    fn get_appends_query_to_plain_url() {
        let engine = MockEngine::new();
        request(&engine, "http://x/a").get_with([("c", "2")]).unwrap();
        assert_eq!(engine.last_options().url.as_deref(), Some("http://x/a?c=2"));
    }

    #[test]
    fn get_extends_existing_query() {
        let engine = MockEngine::new();
        request(&engine, "http://x/a?b=1").get_with([("c", "2")]).unwrap();
        assert_eq!(engine.last_options().url.as_deref(), Some("http://x/a?b=1&c=2"));
    }

    #[test]
    fn get_without_data_keeps_url_and_drops_body() {
        let engine = MockEngine::new();
        let mut r = request(&engine, "http://x/a");
        r.post_with("payload").unwrap();
        r.get().unwrap();
        let opts = engine.last_options();
        assert_eq!(opts.url.as_deref(), Some("http://x/a"));
        assert!(opts.post_body.is_none());
        assert_eq!(opts.method, Some(Method::Get));
    }

    #[test]
    fn other_methods_carry_a_body() {
        let engine = MockEngine::new();
        request(&engine, "http://x/items")
            .put_with(serde_json::json!({"id": 3}))
            .unwrap();
        let opts = engine.last_options();
        assert_eq!(opts.method, Some(Method::Put));
        let body = opts.post_body.unwrap();
        assert_eq!(body.data, br#"{"id":3}"#);
        assert_eq!(body.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn json_query_is_rejected() {
        let engine = MockEngine::new();
        let err = request(&engine, "http://x/").get_with(serde_json::json!({"a": 1})).unwrap_err();
        assert!(matches!(err, RequestError::Configuration(_)));
        assert_eq!(engine.state().executed, 0);
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        let engine = MockEngine::new();
        let mut r = Request::new(engine.handle()).unwrap();
        assert!(matches!(r.url(), Err(RequestError::Configuration(_))));
        assert!(matches!(r.get(), Err(RequestError::Configuration(_))));
    }

    #[test]
    fn accessors_before_send() {
        let engine = MockEngine::new();
        let r = request(&engine, "http://x/");
        assert!(matches!(r.response(), Err(RequestError::NoResponse)));
        assert!(matches!(r.body(), Err(RequestError::NoBody)));
    }

    #[test]
    fn headers_and_cookies_are_installed() {
        let engine = MockEngine::new();
        request(&engine, "http://x/")
            .set_header("X-A: 1")
            .set_header("X-A: 1")
            .set_cookie("a", "1")
            .set_cookie("b", "2")
            .set_cookie("a", "3")
            .get()
            .unwrap();

        let opts = engine.last_options();
        assert_eq!(opts.custom_headers, vec!["X-A: 1", "X-A: 1"]);
        assert_eq!(opts.cookie_header.as_deref(), Some("a=3; b=2"));
    }

    #[test]
    fn options_round_trip() {
        let engine = MockEngine::new();
        let mut r = request(&engine, "http://x/");
        r.set_option(OptionKey::MaxRedirects, 9u32).unwrap();
        r.set_option(OptionKey::Other("buffer_size".into()), 1024i64).unwrap();
        assert_eq!(r.option(&OptionKey::MaxRedirects).unwrap(), OptionValue::Int(9));
        assert_eq!(r.option(&OptionKey::Other("buffer_size".into())).unwrap(), OptionValue::Int(1024));
        assert!(matches!(r.option(&OptionKey::Port), Err(RequestError::UnknownOption(_))));
        assert!(r.set_option(OptionKey::VerifyTls, "no").is_err());
    }

    #[test]
    fn setters_reach_the_engine() {
        let engine = MockEngine::new();
        request(&engine, "http://x/")
            .authorize("user", "secret", AuthScheme::Basic)
            .set_timeout(Duration::from_secs(3))
            .set_port(8081)
            .set_fail_on_error(true)
            .delete()
            .unwrap();

        let opts = engine.last_options();
        assert_eq!(opts.auth_credentials.as_deref(), Some("user:secret"));
        assert_eq!(opts.auth_type, Some(AuthScheme::Basic));
        assert_eq!(opts.timeout, Duration::from_secs(3));
        assert_eq!(opts.port, Some(8081));
        assert!(opts.fail_on_error);
        assert_eq!(opts.method, Some(Method::Delete));
    }

    #[test]
    fn handle_is_replaced_after_every_send() {
        let engine = MockEngine::new();
        let mut r = request(&engine, "http://x/");
        assert_eq!(engine.state().opened, 1);

        r.get().unwrap();
        r.get().unwrap();
        {
            let state = engine.state();
            assert_eq!(state.executed, 2);
            assert_eq!(state.opened, 3);
            assert_eq!(state.closed, 2);
        }

        r.close();
        assert_eq!(engine.state().closed, 3);
    }

    #[test]
    fn failed_send_still_replaces_handle() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(500, "boom"));
        let mut r = request(&engine, "http://x/");
        assert!(r.get().is_err());
        drop(r);

        let state = engine.state();
        assert_eq!(state.opened, 2);
        assert_eq!(state.closed, 2);
    }

    #[test]
    fn redirect_limit_wins_over_everything() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(200, "").with_info(|i| {
            i.redirect_count = 5;
            i.error_code = error_code::COULDNT_CONNECT;
        }));
        let err = request(&engine, "http://x/").get().unwrap_err();
        assert!(matches!(err, RequestError::RedirectLimit { count: 5, max: 5 }));
    }

    #[test]
    fn zero_limit_without_redirects_is_not_a_redirect_error() {
        let engine = MockEngine::new();
        let config = RequestConfig::builder().follow_redirects(false).max_redirects(0).build().unwrap();
        let mut r = Request::with_config(engine.handle(), config).unwrap();
        engine.script(Scripted::status(301, "").with_info(|i| i.redirect_count = 0));
        r.suppress_errors(true);
        assert!(r.set_url("http://x/").get().is_ok());
        assert_eq!(engine.last_options().max_redirects, 0);
        assert_eq!(r.response().unwrap().code(), 301);
    }

    #[test]
    fn redirects_below_the_limit_are_fine() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(200, "").with_info(|i| i.redirect_count = 4));
        assert!(request(&engine, "http://x/").get().is_ok());
    }

    #[test]
    fn transport_error_wins_over_status() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(404, "").with_info(|i| {
            i.error_code = error_code::OPERATION_TIMEDOUT;
            i.error_message = "timed out".into();
        }));
        let err = request(&engine, "http://x/").get().unwrap_err();
        assert!(matches!(err, RequestError::Transport { code: 28, ref message } if message == "timed out"));
    }

    #[test]
    fn success_boundary_is_400() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(399, "fine"));
        engine.script(Scripted::status(400, "bad"));

        let mut r = request(&engine, "http://x/");
        assert!(r.get().is_ok());
        let err = r.get().unwrap_err();
        assert!(matches!(err, RequestError::HttpStatus { code: 400, ref body } if body == "bad"));
        assert_eq!(r.response().unwrap().code(), 400);
    }

    #[test]
    fn suppressed_errors_keep_the_response() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(503, "down"));
        let mut r = request(&engine, "http://x/");
        r.suppress_errors(true).get().unwrap();
        let response = r.response().unwrap();
        assert!(!response.is_success());
        assert_eq!(response.to_string(), "down");
    }

    #[test]
    fn missing_metadata_is_a_transport_error() {
        let engine = MockEngine::new();
        engine.script(Scripted { exchange: Exchange::default(), ..Scripted::default() });
        let err = request(&engine, "http://x/").get().unwrap_err();
        assert!(matches!(err, RequestError::Transport { code: error_code::FAILED_INIT, .. }));
    }

    #[test]
    fn response_holds_headers_and_body() {
        let engine = MockEngine::new();
        engine.script(
            Scripted::status(200, r#"{"k":"v"}"#)
                .with_headers("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nX-A: 1\r\nX-A: 2\r\n\r\n"),
        );
        let mut r = request(&engine, "http://x/");
        r.get().unwrap();

        let response = r.response().unwrap();
        assert_eq!(response.headers().status_line(), Some("HTTP/1.1 200 OK"));
        assert_eq!(response.header("x-a").map(HeaderValue::len), Some(2));
        assert_eq!(response.as_array().unwrap()["k"], "v");
        assert_eq!(r.body().unwrap(), br#"{"k":"v"}"#);
    }

    #[test]
    fn verbose_trace_is_reset_per_send() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(200, "").with_verbose("> first"));
        engine.script(Scripted::status(200, "").with_verbose("> second"));

        let mut r = request(&engine, "http://x/");
        r.set_verbose().get().unwrap();
        assert!(engine.last_options().verbose);
        r.get().unwrap();

        let response = r.response().unwrap();
        assert_eq!(
            response.header("Verbosity"),
            Some(&HeaderValue::Multiple(vec!["> second".into()]))
        );
    }

    #[test]
    fn unwritable_cookiejar_fails_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let err = request(&engine, "http://x/")
            .set_cookiejar(dir.path().join("missing").join("jar.json"))
            .get()
            .unwrap_err();
        assert!(matches!(err, RequestError::Cookiejar { .. }));
        assert_eq!(engine.state().executed, 0);
    }

    #[test]
    fn failed_cookiejar_check_leaves_url_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let mut r = request(&engine, "http://x/a");
        r.set_cookiejar(dir.path().join("missing").join("jar.json"));
        assert!(r.get_with([("c", "2")]).is_err());
        assert_eq!(r.url().unwrap(), "http://x/a");

        r.set_cookiejar(dir.path().join("jar.json"));
        r.get_with([("c", "2")]).unwrap();
        assert_eq!(r.url().unwrap(), "http://x/a?c=2");
    }

    #[test]
    fn writable_cookiejar_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jar.json");
        let engine = MockEngine::new();
        request(&engine, "http://x/").set_cookiejar(&path).get().unwrap();
        assert!(path.exists());
        assert_eq!(engine.last_options().cookiejar_path, Some(path));
    }

    #[test]
    fn next_handle_inherits_last_metadata() {
        let engine = MockEngine::new();
        engine.script(Scripted::status(503, "down").with_info(|i| i.url = "http://x/".into()));
        let mut r = request(&engine, "http://x/");
        assert!(r.get().is_err());

        let state = engine.state();
        assert_eq!(state.inherited.len(), 1);
        assert_eq!(state.inherited[0].http_code, 503);
        assert_eq!(state.inherited[0].url, "http://x/");
    }

    #[test]
    fn invoke_raw_reaches_the_handle() {
        let engine = MockEngine::new();
        let mut r = request(&engine, "http://x/");
        assert_eq!(r.invoke_raw("echo", &["hi".into()]).unwrap(), OptionValue::Text("hi".into()));
        let err = r.invoke_raw("frobnicate", &[]).unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedOperation(name) if name == "frobnicate"));
    }

    #[test]
    fn engine_that_cannot_open_fails_construction() {
        let engine = MockEngine::new();
        engine.state().fail_open = true;
        assert!(Request::new(engine.handle()).is_err());
    }

    #[test]
    fn config_seeds_options() {
        let engine = MockEngine::new();
        let config = RequestConfig::builder().max_redirects(2).suppress_errors(true).build().unwrap();
        let mut r = Request::with_config(engine.handle(), config).unwrap();
        engine.script(Scripted::status(404, ""));
        r.set_url("http://x/").get().unwrap();
        assert_eq!(engine.last_options().max_redirects, 2);
    }
}
