//! Fluent blocking HTTP requests.
//!
//! A [`Request`] collects method, URL, headers, cookies and engine options
//! through chainable setters and performs one exchange per verb call. The
//! outcome is classified into redirect limit, transport and HTTP status
//! errors; whatever was received is kept as a [`Response`] with typed views
//! of headers, cookies and the body.
//!
//! The network side lives behind the [`TransferEngine`] trait.
//! [`ReqwestEngine`] is the engine used by [`request`].
//!
//! ```rust,no_run
//! # fn main() -> Result<(), http_request::RequestError> {
//! let mut req = http_request::request("https://httpbin.org/json")?;
//! req.set_header("Accept: application/json").get()?;
//! let doc = req.response()?.as_array()?;
//! println!("{doc:?}");
//! # Ok(()) }
//! ```

pub mod config;
pub mod cookies;
pub mod engine;
pub mod errors;
pub mod headers;
pub mod request;
pub mod response;

use std::sync::Arc;

pub use config::{ConfigError, RequestConfig, RequestConfigBuilder};
pub use cookies::{Cookie, CookieJar, FileCookieJar};
pub use engine::{
    AuthScheme, EngineHandle, Exchange, OptionKey, OptionValue, ReqwestEngine, Sinks, TransferEngine,
    TransferEngineHandle, TransferInfo, TransferOptions,
};
pub use errors::RequestError;
pub use headers::{parse_headers, HeaderKey, HeaderMap, HeaderValue};
pub use request::{Method, Payload, Request};
pub use response::{Response, XmlElement, XmlError, XmlNode};

/// A request for `url` on a default [`ReqwestEngine`].
pub fn request(url: impl Into<String>) -> Result<Request, RequestError> {
    Request::for_url(Arc::new(ReqwestEngine::default()), url)
}
