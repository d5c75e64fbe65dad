//! Response snapshot of one completed exchange.
//!
//! A [`Response`] is built by [`Request::send`](crate::Request::send) after
//! every exchange, whether it succeeded or not. It never changes afterwards,
//! except for the list of captured XML errors.
//!
//! ## Notes
//! - The raw header block is parsed eagerly. Lines the parser cannot
//!   attribute are dropped and reported by [`Response::header_errors`].
//! - With verbosity on, the engine trace is appended to the raw header block
//!   and stored as a list of lines under the `Verbosity` header key.
//! - The body is kept as raw bytes. Use [`Response::text`] for a lossy
//!   string, [`Response::as_object`] / [`Response::as_array`] for JSON and
//!   [`Response::as_xml`] for XML.

pub mod xml;

use std::borrow::Cow;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::cookies::{parse_set_cookie, Cookie};
use crate::engine::TransferInfo;
use crate::errors::RequestError;
use crate::headers::{parse_headers_lenient, HeaderKey, HeaderMap, HeaderParseError, HeaderValue};

pub use xml::{XmlElement, XmlError, XmlNode};

/// Header key the verbose trace is stored under.
pub const VERBOSITY_KEY: &str = "Verbosity";

#[derive(Debug, Clone)]
pub struct Response {
    raw_headers: String,
    headers: HeaderMap,
    header_errors: Vec<HeaderParseError>,
    body: Option<Vec<u8>>,
    info: Option<TransferInfo>,
    xml_errors: Vec<XmlError>,
}

impl Response {
    /// Builds the snapshot from what the engine captured. Never fails.
    pub fn new(
        raw_headers: &str,
        verbose: Option<&str>,
        body: Option<Vec<u8>>,
        info: Option<TransferInfo>,
    ) -> Self {
        let mut raw_headers = raw_headers.trim_end_matches(['\r', '\n']).to_string();
        let (mut headers, header_errors) = parse_headers_lenient(&raw_headers);

        if let Some(trace) = verbose {
            if !raw_headers.is_empty() {
                raw_headers.push_str("\r\n");
            }
            raw_headers.push_str(trace);
            headers.insert(
                HeaderKey::Name(VERBOSITY_KEY.to_string()),
                HeaderValue::Multiple(trace.lines().map(str::to_string).collect()),
            );
        }

        log::trace!(
            "Response: {} header bytes, {} header entries, {} body bytes",
            raw_headers.len(),
            headers.len(),
            body.as_ref().map_or(0, Vec::len)
        );

        Self {
            raw_headers,
            headers,
            header_errors,
            body,
            info,
            xml_errors: Vec::new(),
        }
    }

    /// HTTP status code, 0 when no metadata is available.
    pub fn code(&self) -> u16 {
        self.info.as_ref().map_or(0, |info| info.http_code)
    }

    pub fn is_success(&self) -> bool {
        self.code() < 400
    }

    /// All transfer metadata.
    pub fn info(&self) -> Result<&TransferInfo, RequestError> {
        self.info.as_ref().ok_or(RequestError::NoMetadata)
    }

    /// One metadata field by name, `None` when the engine does not report it.
    pub fn info_field(&self, name: &str) -> Result<Option<serde_json::Value>, RequestError> {
        Ok(self.info()?.field(name))
    }

    /// The header block as received (plus the verbose trace, if any).
    pub fn raw_headers(&self) -> &str {
        &self.raw_headers
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// One header entry, `None` when absent.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Header lines that were dropped while parsing.
    pub fn header_errors(&self) -> &[HeaderParseError] {
        &self.header_errors
    }

    /// The raw `Set-Cookie` values of the response.
    pub fn cookies(&self) -> Result<Vec<&str>, RequestError> {
        let set_cookie = self.headers.get("Set-Cookie").ok_or(RequestError::NoCookies)?;
        Ok(set_cookie.iter().collect())
    }

    /// The cookie called `name`, parsed from the `Set-Cookie` headers.
    ///
    /// Fails when the response set no cookies at all.
    pub fn cookie(&self, name: &str) -> Result<Option<Cookie>, RequestError> {
        Ok(self
            .cookies()?
            .into_iter()
            .filter_map(parse_set_cookie)
            .find(|c| c.name == name))
    }

    /// Raw response bytes.
    pub fn body(&self) -> Result<&[u8], RequestError> {
        self.body.as_deref().ok_or(RequestError::NoBody)
    }

    /// Body as text, invalid UTF-8 replaced.
    pub fn text(&self) -> Result<Cow<'_, str>, RequestError> {
        Ok(String::from_utf8_lossy(self.body()?))
    }

    /// Decodes a JSON body into `T`.
    pub fn as_object<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        Ok(serde_json::from_slice(self.body()?)?)
    }

    /// Decodes a JSON object body into a generic map.
    pub fn as_array(&self) -> Result<serde_json::Map<String, serde_json::Value>, RequestError> {
        match serde_json::from_slice::<serde_json::Value>(self.body()?)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(RequestError::Decode(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parses the body as XML.
    ///
    /// With `capture_errors`, a malformed document yields `Ok(None)` and the
    /// error is appended to [`Response::xml_errors`]. Without it, the error is
    /// raised as `Decode` and previously captured errors are cleared.
    pub fn as_xml(&mut self, capture_errors: bool) -> Result<Option<XmlElement>, RequestError> {
        let body = self.body()?;
        let parsed = std::str::from_utf8(body)
            .map_err(|e| XmlError { message: e.to_string(), position: e.valid_up_to() as u64 })
            .and_then(xml::parse_document);

        match parsed {
            Ok(root) => Ok(Some(root)),
            Err(e) if capture_errors => {
                log::debug!("Captured XML error: {e}");
                self.xml_errors.push(e);
                Ok(None)
            }
            Err(e) => {
                self.xml_errors.clear();
                Err(RequestError::Decode(e.to_string()))
            }
        }
    }

    pub fn xml_errors(&self) -> &[XmlError] {
        &self.xml_errors
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl fmt::Display for Response {
    /// Writes the body (lossy UTF-8); nothing when there is no body.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Ok(text) => f.write_str(&text),
            Err(_) => Ok(()),
        }
    }
}
