use std::io;
use std::path::PathBuf;

use crate::engine::OptionKey;

/// Every failure a [`Request`](crate::Request) or [`Response`](crate::Response) can raise.
///
/// `send()` classifies its outcome in a fixed order and raises at most one of
/// `RedirectLimit`, `Transport` or `HttpStatus`.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("The cookiejar {} could not be opened: {source}", path.display())]
    Cookiejar {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Redirect limit reached ({count} of {max} redirects followed)")]
    RedirectLimit { count: u32, max: u32 },

    #[error("Transport error {code}: {message}")]
    Transport { code: u32, message: String },

    #[error("Remote answered with HTTP status {code}")]
    HttpStatus { code: u16, body: String },

    #[error("No request has been sent yet")]
    NoResponse,

    #[error("Perform a request before accessing response data")]
    NoBody,

    #[error("A transfer has yet to be performed")]
    NoMetadata,

    #[error("Response did not set any cookies")]
    NoCookies,

    #[error("Option {0} has not been set")]
    UnknownOption(OptionKey),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("{0} is not a supported engine operation")]
    UnsupportedOperation(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RequestError {
    /// True for failures reported by the transfer engine itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, RequestError::Transport { .. } | RequestError::RedirectLimit { .. })
    }

    /// HTTP status carried by an [`RequestError::HttpStatus`] error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        RequestError::Decode(e.to_string())
    }
}
