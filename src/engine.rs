//! Transfer engine capability.
//!
//! The request core never touches sockets. Everything network related goes
//! through two small traits:
//!
//! - [`TransferEngine`] mints fresh [`EngineHandle`]s. A request holds one
//!   engine for its whole life and asks it for a new handle after every send.
//! - [`EngineHandle`] performs exactly one blocking exchange: it is configured
//!   with the accumulated [`TransferOptions`], executed once, then closed.
//!
//! A handle reports transport failures in the returned [`TransferInfo`]
//! (`error_code` / `error_message`) instead of failing `execute`, so the
//! caller always gets whatever body and header bytes were captured.
//!
//! Operations the core does not model can still be reached through
//! [`EngineHandle::invoke`], which looks the name up in the engine's own
//! operation table.

mod options;
pub mod reqwest_engine;

#[cfg(test)]
pub(crate) mod mock;

use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;

pub use options::{AuthScheme, OptionKey, OptionValue, RequestBody, TransferOptions};
pub use reqwest_engine::ReqwestEngine;

/// A shareable handle to a transfer engine.
pub type TransferEngineHandle = Arc<dyn TransferEngine>;

/// Error codes reported in [`TransferInfo::error_code`].
///
/// The numbering follows the codes most transfer libraries settled on, so
/// values coming from other engines keep their meaning.
pub mod error_code {
    pub const OK: u32 = 0;
    pub const UNSUPPORTED_PROTOCOL: u32 = 1;
    pub const FAILED_INIT: u32 = 2;
    pub const URL_MALFORMAT: u32 = 3;
    pub const COULDNT_RESOLVE_HOST: u32 = 6;
    pub const COULDNT_CONNECT: u32 = 7;
    pub const HTTP_RETURNED_ERROR: u32 = 22;
    pub const OPERATION_TIMEDOUT: u32 = 28;
    pub const SSL_CONNECT_ERROR: u32 = 35;
    pub const TOO_MANY_REDIRECTS: u32 = 47;
    pub const SEND_ERROR: u32 = 55;
    pub const RECV_ERROR: u32 = 56;
}

/// Mints engine handles. Implementations must be safe to share between requests.
pub trait TransferEngine: Send + Sync {
    /// Opens a fresh, unused handle.
    fn open(&self) -> Result<Box<dyn EngineHandle>, RequestError>;
}

/// Write targets the engine fills during one exchange.
pub struct Sinks<'a> {
    /// Receives the raw response header block (status line included).
    pub header: &'a mut dyn Write,
    /// Receives protocol trace output when verbosity is enabled.
    pub verbose: Option<&'a mut dyn Write>,
}

/// One engine handle: configure, execute once, close.
pub trait EngineHandle: Send {
    /// Applies all options in one go. Called right before `execute`.
    fn configure(&mut self, options: &TransferOptions) -> Result<(), RequestError>;

    /// Performs the blocking exchange.
    fn execute(&mut self, sinks: Sinks<'_>) -> Exchange;

    /// Invokes an engine operation that has no dedicated method.
    fn invoke(&mut self, operation: &str, _args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        Err(RequestError::UnsupportedOperation(operation.to_string()))
    }

    /// Hands a freshly opened handle the metadata of the exchange its
    /// predecessor performed, for operations that report on the last exchange.
    fn inherit(&mut self, _last: &TransferInfo) {}

    /// Releases the handle. Must be idempotent.
    fn close(&mut self);
}

/// Raw outcome of one exchange.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    /// Response body, `None` when the transfer failed before a body arrived.
    pub body: Option<Vec<u8>>,
    /// Transfer metadata, `None` when the engine never got to perform anything.
    pub info: Option<TransferInfo>,
}

impl Exchange {
    /// An exchange that failed before any bytes were transferred.
    pub fn failed(url: &str, code: u32, message: impl Into<String>) -> Self {
        Self {
            body: None,
            info: Some(TransferInfo {
                url: url.to_string(),
                error_code: code,
                error_message: message.into(),
                ..TransferInfo::default()
            }),
        }
    }
}

/// Metadata describing one completed (or failed) exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferInfo {
    /// Effective URL after redirects.
    pub url: String,
    pub http_code: u16,
    pub redirect_count: u32,
    /// Zero when the transfer succeeded, see [`error_code`].
    pub error_code: u32,
    pub error_message: String,
    pub content_type: Option<String>,
    /// Size of the raw header block in bytes.
    pub header_size: usize,
    pub size_download: usize,
    /// Seconds spent on the whole exchange.
    pub total_time: f64,
}

impl TransferInfo {
    /// Looks up one metadata field by name.
    pub fn field(&self, name: &str) -> Option<serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => map.remove(name),
            _ => None,
        }
    }
}
