//! Transfer engine on top of `reqwest::blocking`.
//!
//! Every handle builds its own `Client` when it is configured, so redirect,
//! TLS and timeout settings never leak between exchanges. The response header
//! block is rebuilt from the received status and headers and written to the
//! header sink in wire format.
//!
//! Failures are reported through [`TransferInfo::error_code`] using the codes
//! in [`error_code`]. The redirect count is tracked by the redirect policy,
//! which stops following (without failing) once `max_redirects` were
//! followed; the request core turns that into a redirect limit error.
//!
//! With a cookiejar path, the handle loads a [`FileCookieJar`] on configure,
//! plugs it into the client as cookie store and saves it on close.
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::{Client, Request, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::redirect::Policy;
use url::Url;

use crate::cookies::FileCookieJar;
use crate::engine::{
    error_code, EngineHandle, Exchange, OptionValue, Sinks, TransferEngine, TransferInfo, TransferOptions,
};
use crate::errors::RequestError;

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Characters left alone by the `escape` operation (RFC 3986 unreserved).
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

type Operation = fn(&mut ReqwestHandle, &[OptionValue]) -> Result<OptionValue, RequestError>;

lazy_static! {
    /// Operations reachable through [`EngineHandle::invoke`].
    static ref OPERATIONS: HashMap<&'static str, Operation> = {
        let mut table: HashMap<&'static str, Operation> = HashMap::new();
        table.insert("reset", ReqwestHandle::reset);
        table.insert("escape", ReqwestHandle::escape);
        table.insert("unescape", ReqwestHandle::unescape);
        table.insert("errno", ReqwestHandle::errno);
        table.insert("error", ReqwestHandle::error);
        table.insert("getinfo", ReqwestHandle::getinfo);
        table.insert("version", ReqwestHandle::version);
        table
    };
}

/// Production engine. Cheap to create, handles share nothing.
#[derive(Debug, Clone)]
pub struct ReqwestEngine {
    user_agent: String,
}

impl Default for ReqwestEngine {
    fn default() -> Self {
        Self { user_agent: DEFAULT_USER_AGENT.to_string() }
    }
}

impl ReqwestEngine {
    /// User agent sent when a request does not set its own.
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into() }
    }
}

impl TransferEngine for ReqwestEngine {
    fn open(&self) -> Result<Box<dyn EngineHandle>, RequestError> {
        log::trace!("Opening reqwest handle");
        Ok(Box::new(ReqwestHandle {
            user_agent: self.user_agent.clone(),
            prepared: None,
            jar: None,
            last: None,
        }))
    }
}

/// Client and options of one configured exchange.
struct Prepared {
    client: Client,
    options: TransferOptions,
    /// Redirects followed by the redirect policy during the current exchange.
    redirects: Arc<AtomicU32>,
}

pub struct ReqwestHandle {
    user_agent: String,
    prepared: Option<Prepared>,
    jar: Option<Arc<FileCookieJar>>,
    last: Option<TransferInfo>,
}

/// A failed exchange: engine error code plus message.
#[derive(Debug)]
struct Failure {
    code: u32,
    message: String,
}

impl Failure {
    fn new(code: u32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(e: reqwest::Error) -> Self {
        let message = error_chain(&e);
        let lower = message.to_ascii_lowercase();

        let code = if e.is_timeout() {
            error_code::OPERATION_TIMEDOUT
        } else if e.is_redirect() {
            error_code::TOO_MANY_REDIRECTS
        } else if e.is_builder() {
            error_code::URL_MALFORMAT
        } else if e.is_connect() {
            if lower.contains("dns error") || lower.contains("failed to lookup") {
                error_code::COULDNT_RESOLVE_HOST
            } else if lower.contains("certificate") || lower.contains("tls") {
                error_code::SSL_CONNECT_ERROR
            } else {
                error_code::COULDNT_CONNECT
            }
        } else if e.is_request() {
            error_code::SEND_ERROR
        } else {
            error_code::RECV_ERROR
        };

        Failure { code, message }
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Writes `* `, `> ` and `< ` prefixed lines to the verbose sink, if any.
struct Trace<'a> {
    sink: Option<&'a mut dyn Write>,
}

impl Trace<'_> {
    fn line(&mut self, prefix: char, text: impl std::fmt::Display) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(sink, "{prefix} {text}") {
            log::warn!("Verbose sink failed, trace disabled: {e}");
            self.sink = None;
        }
    }
}

impl EngineHandle for ReqwestHandle {
    fn configure(&mut self, options: &TransferOptions) -> Result<(), RequestError> {
        self.sync_cookiejar(options.cookiejar_path.as_deref())?;

        let redirects = Arc::new(AtomicU32::new(0));
        let user_agent = options.user_agent.clone().unwrap_or_else(|| self.user_agent.clone());

        let mut builder = Client::builder()
            .redirect(redirect_policy(options, Arc::clone(&redirects)))
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_tls)
            .user_agent(user_agent);

        if let Some(jar) = &self.jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        for (key, value) in &options.extra {
            match (key.as_str(), value) {
                ("connect_timeout_seconds", OptionValue::Int(secs)) if *secs > 0 => {
                    builder = builder.connect_timeout(Duration::from_secs(*secs as u64));
                }
                ("tcp_nodelay", OptionValue::Bool(on)) => builder = builder.tcp_nodelay(*on),
                ("pool_max_idle_per_host", OptionValue::Int(n)) if *n >= 0 => {
                    builder = builder.pool_max_idle_per_host(*n as usize);
                }
                _ => log::debug!("Ignoring engine option {key} = {value:?}"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| RequestError::Configuration(format!("Could not build HTTP client: {}", error_chain(&e))))?;

        log::debug!(
            "Configured handle for {} (follow: {}, max redirects: {}, timeout: {:?})",
            options.url.as_deref().unwrap_or("<no url>"),
            options.follow_redirects,
            options.max_redirects,
            options.timeout
        );

        self.prepared = Some(Prepared { client, options: options.clone(), redirects });
        Ok(())
    }

    fn execute(&mut self, sinks: Sinks<'_>) -> Exchange {
        let Sinks { header, verbose } = sinks;
        let mut trace = Trace { sink: verbose };

        let exchange = match self.prepared.as_ref() {
            Some(prepared) => perform(prepared, self.jar.as_deref(), header, &mut trace),
            None => Exchange::failed("", error_code::FAILED_INIT, "Handle has not been configured"),
        };

        self.last = exchange.info.clone();
        exchange
    }

    fn inherit(&mut self, last: &TransferInfo) {
        self.last = Some(last.clone());
    }

    fn invoke(&mut self, operation: &str, args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let op = OPERATIONS
            .get(operation)
            .ok_or_else(|| RequestError::UnsupportedOperation(operation.to_string()))?;
        op(self, args)
    }

    fn close(&mut self) {
        self.prepared = None;
        self.flush_cookiejar();
    }
}

impl Drop for ReqwestHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl ReqwestHandle {
    /// Loads the jar for `path`, flushing a jar for another path first.
    fn sync_cookiejar(&mut self, path: Option<&Path>) -> Result<(), RequestError> {
        let Some(path) = path else {
            self.flush_cookiejar();
            return Ok(());
        };

        if self.jar.as_ref().is_some_and(|jar| jar.path() == path) {
            return Ok(());
        }

        self.flush_cookiejar();
        let jar = FileCookieJar::open(path)
            .map_err(|source| RequestError::Cookiejar { path: path.to_path_buf(), source })?;
        self.jar = Some(Arc::new(jar));
        Ok(())
    }

    fn flush_cookiejar(&mut self) {
        if let Some(jar) = self.jar.take() {
            if let Err(e) = jar.save() {
                log::error!("Could not write cookiejar {}: {e}", jar.path().display());
            }
        }
    }

    fn reset(&mut self, _args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        self.prepared = None;
        self.last = None;
        self.flush_cookiejar();
        Ok(OptionValue::Bool(true))
    }

    fn escape(&mut self, args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let input = text_arg("escape", args)?;
        Ok(OptionValue::Text(utf8_percent_encode(input, UNRESERVED).to_string()))
    }

    fn unescape(&mut self, args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let input = text_arg("unescape", args)?;
        let decoded = percent_decode_str(input)
            .decode_utf8()
            .map_err(|e| RequestError::Decode(format!("unescaped value is not UTF-8: {e}")))?;
        Ok(OptionValue::Text(decoded.into_owned()))
    }

    fn errno(&mut self, _args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let code = self.last.as_ref().map_or(error_code::OK, |info| info.error_code);
        Ok(OptionValue::from(code))
    }

    fn error(&mut self, _args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let message = self.last.as_ref().map(|info| info.error_message.clone()).unwrap_or_default();
        Ok(OptionValue::Text(message))
    }

    /// The last metadata as JSON, or one field of it when a name is given.
    fn getinfo(&mut self, args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        let info = self.last.as_ref().ok_or(RequestError::NoMetadata)?;
        let json = match args.first().and_then(OptionValue::as_text) {
            Some(field) => info.field(field).unwrap_or(serde_json::Value::Null).to_string(),
            None => serde_json::to_string(info)?,
        };
        Ok(OptionValue::Text(json))
    }

    fn version(&mut self, _args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        Ok(OptionValue::Text(format!("{DEFAULT_USER_AGENT} (reqwest)")))
    }
}

fn text_arg<'a>(operation: &str, args: &'a [OptionValue]) -> Result<&'a str, RequestError> {
    args.first()
        .and_then(OptionValue::as_text)
        .ok_or_else(|| RequestError::Configuration(format!("{operation} expects one text argument")))
}

fn redirect_policy(options: &TransferOptions, followed: Arc<AtomicU32>) -> Policy {
    if !options.follow_redirects {
        return Policy::none();
    }

    let max = options.max_redirects;
    Policy::custom(move |attempt| {
        // `previous` holds every URL requested so far, the original included.
        let count = attempt.previous().len() as u32;
        if count > max {
            attempt.stop()
        } else {
            followed.store(count, Ordering::Relaxed);
            attempt.follow()
        }
    })
}

fn perform(
    prepared: &Prepared,
    jar: Option<&FileCookieJar>,
    header_sink: &mut dyn Write,
    trace: &mut Trace<'_>,
) -> Exchange {
    let started = Instant::now();
    prepared.redirects.store(0, Ordering::Relaxed);

    let mut info = TransferInfo {
        url: prepared.options.url.clone().unwrap_or_default(),
        ..TransferInfo::default()
    };

    let body = match transfer(prepared, jar, header_sink, trace, &mut info) {
        Ok(body) => Some(body),
        Err(failure) => {
            log::debug!("Transfer of {} failed with {}: {}", info.url, failure.code, failure.message);
            trace.line('*', &failure.message);
            info.error_code = failure.code;
            info.error_message = failure.message;
            None
        }
    };

    info.redirect_count = prepared.redirects.load(Ordering::Relaxed);
    info.total_time = started.elapsed().as_secs_f64();
    trace.line('*', format_args!("Completed in {:.3}s after {} redirects", info.total_time, info.redirect_count));

    Exchange { body, info: Some(info) }
}

fn transfer(
    prepared: &Prepared,
    jar: Option<&FileCookieJar>,
    header_sink: &mut dyn Write,
    trace: &mut Trace<'_>,
    info: &mut TransferInfo,
) -> Result<Vec<u8>, Failure> {
    let options = &prepared.options;

    let mut url = Url::parse(&info.url)
        .map_err(|e| Failure::new(error_code::URL_MALFORMAT, format!("Malformed URL {:?}: {e}", info.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Failure::new(
            error_code::UNSUPPORTED_PROTOCOL,
            format!("Protocol {:?} not supported", url.scheme()),
        ));
    }
    if let Some(port) = options.port {
        url.set_port(Some(port))
            .map_err(|_| Failure::new(error_code::URL_MALFORMAT, format!("Cannot set port {port} on {url}")))?;
    }

    let request = build_request(prepared, jar, url)?;
    trace_request(trace, &request);

    let response = prepared.client.execute(request)?;
    let status = response.status();

    info.url = response.url().to_string();
    info.http_code = status.as_u16();
    info.content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let block = header_block(&response);
    info.header_size = block.len();
    for line in block.lines() {
        trace.line('<', line);
    }
    if let Err(e) = header_sink.write_all(block.as_bytes()) {
        log::warn!("Could not write header block: {e}");
    }

    if options.fail_on_error && status.as_u16() >= 400 {
        return Err(Failure::new(
            error_code::HTTP_RETURNED_ERROR,
            format!("The requested URL returned error: {status}"),
        ));
    }

    let body = response.bytes()?.to_vec();
    info.size_download = body.len();
    log::trace!("Received {} header bytes and {} body bytes from {}", info.header_size, body.len(), info.url);

    Ok(body)
}

fn build_request(prepared: &Prepared, jar: Option<&FileCookieJar>, url: Url) -> Result<Request, Failure> {
    let options = &prepared.options;

    let method = match options.method {
        Some(method) => reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| Failure::new(error_code::FAILED_INIT, e.to_string()))?,
        None => reqwest::Method::GET,
    };

    let mut headers = HeaderMap::new();
    for line in &options.custom_headers {
        match parse_header_line(line) {
            Some((name, value)) => {
                headers.append(name, value);
            }
            None => log::warn!("Skipping malformed header line {line:?}"),
        }
    }

    if let Some(content_type) = options.post_body.as_ref().and_then(|b| b.content_type.as_deref()) {
        if !headers.contains_key(CONTENT_TYPE) {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
    }

    // The client skips its cookie store once a Cookie header is present, so
    // jar cookies and manual cookies are merged here.
    let cookies: Vec<String> = jar
        .and_then(|jar| jar.request_cookies(&url))
        .into_iter()
        .chain(options.cookie_header.clone())
        .filter(|c| !c.is_empty())
        .collect();
    if !cookies.is_empty() {
        match HeaderValue::from_str(&cookies.join("; ")) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => log::warn!("Cookie header contains invalid characters, not sent"),
        }
    }

    let mut builder = prepared.client.request(method, url).headers(headers);
    if let Some(credentials) = &options.auth_credentials {
        let (user, pass) = credentials.split_once(':').unwrap_or((credentials.as_str(), ""));
        builder = builder.basic_auth(user, Some(pass));
    }
    if let Some(body) = &options.post_body {
        builder = builder.body(body.data.clone());
    }

    Ok(builder.build()?)
}

fn parse_header_line(line: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = line.split_once(':')?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}

fn trace_request(trace: &mut Trace<'_>, request: &Request) {
    let url = request.url();
    trace.line('*', format_args!("Connecting to {}:{}", url.host_str().unwrap_or_default(), url.port_or_known_default().unwrap_or_default()));

    let target = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };
    trace.line('>', format_args!("{} {target} HTTP/1.1", request.method()));
    trace.line('>', format_args!("Host: {}", url.host_str().unwrap_or_default()));
    for (name, value) in request.headers() {
        trace.line('>', format_args!("{name}: {}", String::from_utf8_lossy(value.as_bytes())));
    }
    trace.line('>', "");
}

/// Status line and headers in wire format, terminated by an empty line.
fn header_block(response: &Response) -> String {
    let status = response.status();
    let mut block = format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    for (name, value) in response.headers() {
        block.push_str(&format!("{name}: {}\r\n", String::from_utf8_lossy(value.as_bytes())));
    }
    block.push_str("\r\n");
    block
}
