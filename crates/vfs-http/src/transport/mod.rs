//! Transport seam: one blocking HTTP request/response cycle per connection.
//!
//! The client never talks to sockets itself. A [`Transport`] opens a
//! [`Connection`] for a [`Request`] and reports what it sees (header lines,
//! body blocks, lifecycle changes) to a borrowed [`TransportEvents`] sink.
//! The sink is how response headers reach the request context without any
//! shared or global state.

mod curl_backend;
mod error;
#[cfg(test)]
pub(crate) mod scripted;

use std::fmt;

pub use curl_backend::{CurlConnection, CurlTransport};
pub use error::{classify_curl_error, TransportError, TransportErrorKind};

/// Request method; fixed for the lifetime of one open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Head => "HEAD",
        }
    }

    /// True for methods whose request body is streamed through `write`.
    pub fn sends_body(self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to open.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub url: &'a str,
    pub method: Method,
    /// Extra request headers as (name, value).
    pub headers: &'a [(String, String)],
    /// When set, ask for the body from this offset (`Range: bytes=N-`).
    pub range_start: Option<u64>,
}

/// Something the transport observed while servicing a connection.
#[derive(Debug, Clone, Copy)]
pub enum TransportEvent<'a> {
    Connected,
    HeadersSent,
    /// One response header of the final (non-1xx) response.
    Header { name: &'a str, value: &'a str },
    /// A body block of `len` bytes arrived; `chunked` when the response
    /// uses chunked transfer framing.
    Data { len: usize, chunked: bool },
    Finished,
    Disconnected,
    Error(&'a TransportError),
}

/// Receiver of transport events; borrowed by the transport for one call.
pub trait TransportEvents {
    fn on_event(&mut self, event: TransportEvent<'_>);
}

/// Opens connections.
pub trait Transport {
    type Connection: Connection;

    /// Issues `request` and returns once the response status and headers are
    /// known. Header events are delivered to `events` before returning.
    fn open(
        &mut self,
        request: &Request<'_>,
        events: &mut dyn TransportEvents,
    ) -> Result<Self::Connection, TransportError>;
}

/// One live request/response exchange.
///
/// Dropping a connection must release it the same way `close` does.
pub trait Connection {
    /// Status code of the response the connection is positioned in.
    fn status(&self) -> u16;

    /// Reads body bytes; `Ok(0)` is end of body.
    fn read(
        &mut self,
        buf: &mut [u8],
        events: &mut dyn TransportEvents,
    ) -> Result<usize, TransportError>;

    /// Streams request body bytes; returns the number accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Releases the connection. Returns the final response status when it
    /// only became known at close (streamed request bodies). Calling it again
    /// is a no-op returning `Ok(None)`.
    fn close(&mut self, events: &mut dyn TransportEvents) -> Result<Option<u16>, TransportError>;
}

/// Value of the `Range` header for a reopen at `start`.
pub fn range_header_value(start: u64) -> String {
    format!("bytes={}-", start)
}

/// Status code from a response status line such as `HTTP/1.1 206 Partial Content`.
pub(crate) fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse::<u16>().ok()
}

/// Splits a `Name: value` header line; the name must be non-empty.
pub(crate) fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value.trim()))
}
