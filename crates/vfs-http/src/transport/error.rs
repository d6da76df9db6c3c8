//! Transport error type and classification of libcurl failures.

use std::fmt;

/// Coarse category of a transport failure.
///
/// The category is informational: the stream records every transport
/// failure under the same generic error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect or transfer timed out.
    Timeout,
    /// Network-level failure (connection refused/reset, DNS, etc.).
    Connection,
    /// The peer sent something that is not a usable HTTP response.
    Protocol,
    /// The connection was already closed or torn down.
    Closed,
    Other,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn closed() -> Self {
        Self::new(TransportErrorKind::Closed, "connection closed")
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        Self::new(classify_curl_error(&e), e.to_string())
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> TransportErrorKind {
    if e.is_operation_timedout() {
        return TransportErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return TransportErrorKind::Connection;
    }
    if e.is_unsupported_protocol() || e.is_url_malformed() || e.is_partial_file() {
        return TransportErrorKind::Protocol;
    }
    TransportErrorKind::Other
}
