//! Streaming client: GET/POST/PUT/HEAD opens and byte-level read/write/close.
//!
//! The redirect loop lives in `crate::redirect` and seeking in
//! `crate::seek`; both extend [`StreamingClient`] with further `impl` blocks.

mod context;

pub use context::{ConnectionState, RequestContext, ResourceSize};

use crate::config::ClientConfig;
use crate::error::{StreamError, TRANSPORT_ERROR_CODE};
use crate::headers::HeaderInterpreter;
use crate::transport::{split_header_line, Connection, Method, Transport};

/// Caller hook invoked with every response header `(name, value)`.
pub type HeaderHook = Box<dyn FnMut(&str, &str) + Send>;

/// HTTP byte stream over a [`Transport`].
///
/// Operations block until the transport returns. A client owns at most one
/// connection at a time.
pub struct StreamingClient<T: Transport> {
    pub(crate) transport: T,
    pub(crate) connection: Option<T::Connection>,
    pub(crate) ctx: RequestContext,
    pub(crate) hook: Option<HeaderHook>,
    pub(crate) config: ClientConfig,
}

impl<T: Transport> StreamingClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            connection: None,
            ctx: RequestContext::new("", Method::Get),
            hook: None,
            config,
        }
    }

    /// Registers the header hook, replacing any previous one.
    pub fn set_on_header<F>(&mut self, hook: F)
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get(&mut self, url: &str) -> Result<(), StreamError> {
        tracing::debug!("GET {}", url);
        self.open(url, Method::Get)
    }

    pub fn post(&mut self, url: &str) -> Result<(), StreamError> {
        tracing::debug!("POST {}", url);
        self.open(url, Method::Post)
    }

    pub fn put(&mut self, url: &str) -> Result<(), StreamError> {
        tracing::debug!("PUT {}", url);
        self.open(url, Method::Put)
    }

    /// Fetches headers only; the connection is closed before returning and
    /// the header-derived state stays available.
    pub fn head(&mut self, url: &str) -> Result<(), StreamError> {
        tracing::debug!("HEAD {}", url);
        let result = self.open(url, Method::Head);
        self.close();
        result
    }

    /// Opens `url` with `method`, following redirects.
    pub fn open(&mut self, url: &str, method: Method) -> Result<(), StreamError> {
        self.release_connection();
        self.ctx.reset_for(url, method);
        self.open_with_redirects(None).map(|_| ())
    }

    /// Points a closed client at `url` without opening it, so a later
    /// `read` opens it lazily.
    pub(crate) fn retarget(&mut self, url: &str, method: Method) {
        self.release_connection();
        self.ctx.reset_for(url, method);
        self.ctx.state = ConnectionState::Closed;
    }

    /// Reads body bytes into `buf`, opening the stream with GET first if it
    /// is not open. Never reads past a declared size. `Ok(0)` means the end
    /// of the body (or nothing left to read).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if !self.ctx.is_open() {
            tracing::debug!("opening {} for read", self.ctx.url);
            self.ctx.method = Method::Get;
            self.open_with_redirects(None)?;
        }

        let want = self.ctx.clamp_read(buf.len());
        if want == 0 {
            return Ok(0);
        }

        let conn = self.connection.as_mut().ok_or(StreamError::NotOpen)?;
        let mut events = HeaderInterpreter::new(&mut self.ctx, self.hook.as_mut());
        match conn.read(&mut buf[..want], &mut events) {
            Ok(n) => {
                self.ctx.position += n as u64;
                self.ctx.error = 0;
                Ok(n)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Writes request body bytes. Before the stream is open, `buf` is taken
    /// as a `Name: value` header line for the next open instead; the full
    /// length is returned when it was accepted, 0 when malformed.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        if !self.ctx.is_open() {
            let line = String::from_utf8_lossy(buf);
            return match split_header_line(line.trim_end_matches(['\r', '\n'])) {
                Some((name, value)) => {
                    self.ctx.set_request_header(name, value);
                    Ok(buf.len())
                }
                None => {
                    tracing::warn!("ignoring malformed header line {:?}", line);
                    Ok(0)
                }
            };
        }

        let conn = self.connection.as_mut().ok_or(StreamError::NotOpen)?;
        match conn.write(buf) {
            Ok(n) => {
                self.ctx.position += n as u64;
                self.ctx.error = 0;
                Ok(n)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Adds an outgoing request header for the next open.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.ctx.set_request_header(name, value);
    }

    /// Closes the stream. Safe to call any number of times.
    pub fn close(&mut self) {
        self.release_connection();
        self.ctx.state = ConnectionState::Closed;
    }

    pub fn is_open(&self) -> bool {
        self.ctx.is_open()
    }

    pub fn position(&self) -> u64 {
        self.ctx.position
    }

    pub fn size(&self) -> ResourceSize {
        self.ctx.size
    }

    pub fn error_code(&self) -> u16 {
        self.ctx.error
    }

    /// Closes the current connection, if any. A final status reported at
    /// close (streamed request bodies) becomes the error code when not 2xx.
    pub(crate) fn release_connection(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };
        let mut events = HeaderInterpreter::new(&mut self.ctx, self.hook.as_mut());
        match conn.close(&mut events) {
            Ok(Some(status)) => {
                self.ctx.status = Some(status);
                if !(200..300).contains(&status) {
                    tracing::warn!(
                        "{} {} finished with HTTP {}",
                        self.ctx.method,
                        self.ctx.url,
                        status
                    );
                    self.ctx.error = status;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("closing {} failed: {}", self.ctx.url, e);
                self.ctx.error = TRANSPORT_ERROR_CODE;
            }
        }
    }

    /// Drops the connection, records `err` and leaves the context in the
    /// error state.
    pub(crate) fn fail(&mut self, err: StreamError) -> StreamError {
        self.release_connection();
        self.ctx.state = ConnectionState::Error;
        self.ctx.error = err.code();
        tracing::warn!("{} {}: {}", self.ctx.method, self.ctx.url, err);
        err
    }

    /// Records `err` without touching the connection.
    pub(crate) fn reject(&mut self, err: StreamError) -> StreamError {
        self.ctx.error = err.code();
        tracing::debug!("{} {}: {}", self.ctx.method, self.ctx.url, err);
        err
    }
}
