//! Stream-level error type and its mapping onto the sticky error code.

use crate::transport::{Method, TransportError};
use thiserror::Error;

/// Error code recorded for failures that carry no HTTP status.
pub const TRANSPORT_ERROR_CODE: u16 = 1;

/// Failure of a stream operation.
///
/// Every variant maps onto the numeric error code kept on the request
/// context (see [`StreamError::code`]): the HTTP status when one was
/// observed, otherwise [`TRANSPORT_ERROR_CODE`].
#[derive(Debug, Error)]
pub enum StreamError {
    /// Terminal response status outside the accepted set.
    #[error("HTTP {0}")]
    Status(u16),
    /// More than `limit` redirects were followed.
    #[error("redirect limit of {limit} exceeded at {url} (last status {status})")]
    TooManyRedirects { limit: u32, status: u16, url: String },
    /// A redirect status arrived without a `Location` header.
    #[error("HTTP {status} redirect without a Location header")]
    MissingLocation { status: u16 },
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("stream is not open")]
    NotOpen,
    /// A ranged reopen was answered with something other than 206.
    #[error("range request answered with HTTP {0}")]
    RangeIgnored(u16),
    #[error("{0} streams cannot seek without server range support")]
    SeekUnsupported(Method),
    #[error("seek to {target} is past the end of a {size} byte resource")]
    SeekPastEnd { target: u64, size: u64 },
    /// The body ended before a manual seek could discard enough bytes.
    #[error("stream ended after discarding {discarded} of {wanted} bytes")]
    ShortDiscard { discarded: u64, wanted: u64 },
}

impl StreamError {
    /// Numeric code stored on the context for this failure.
    pub fn code(&self) -> u16 {
        match self {
            StreamError::Status(status) | StreamError::RangeIgnored(status) => *status,
            StreamError::TooManyRedirects { status, .. }
            | StreamError::MissingLocation { status } => *status,
            StreamError::Transport(_)
            | StreamError::NotOpen
            | StreamError::SeekUnsupported(_)
            | StreamError::SeekPastEnd { .. }
            | StreamError::ShortDiscard { .. } => TRANSPORT_ERROR_CODE,
        }
    }
}
