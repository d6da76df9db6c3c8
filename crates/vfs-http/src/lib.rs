//! Resumable, redirect-following HTTP byte streams for virtual filesystems.
//!
//! A [`StreamingClient`] opens a URL through a [`Transport`], follows
//! redirects, learns from the response headers whether the origin can serve
//! byte ranges, and then exposes read/write/seek over the body. Seeking uses
//! ranged reopens against servers that advertise `Accept-Ranges: bytes` and
//! falls back to reading and discarding bytes for GET streams otherwise.

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod headers;
pub mod logging;
pub mod redirect;
pub mod seek;
pub mod transport;

pub use client::{ConnectionState, HeaderHook, RequestContext, ResourceSize, StreamingClient};
pub use config::ClientConfig;
pub use error::StreamError;
pub use file::{HttpFile, HttpStream, OpenMode};
pub use transport::{CurlTransport, Method, Transport, TransportError, TransportErrorKind};
