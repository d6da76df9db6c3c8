//! The open/redirect loop.

use super::{is_open_success, is_redirect};
use crate::client::{ConnectionState, ResourceSize, StreamingClient};
use crate::error::StreamError;
use crate::headers::HeaderInterpreter;
use crate::transport::{Connection, Request, Transport};

impl<T: Transport> StreamingClient<T> {
    /// Opens the context's URL, following 301/302/303 until a terminal
    /// status or the redirect cap. `range_start` asks for the body from that
    /// offset. On success the stream is open at position 0 and the terminal
    /// status is returned; on failure the connection is released and the
    /// error recorded.
    pub(crate) fn open_with_redirects(
        &mut self,
        range_start: Option<u64>,
    ) -> Result<u16, StreamError> {
        self.release_connection();
        self.ctx.state = ConnectionState::Opening;
        self.ctx.was_redirected = false;
        let fresh = range_start.is_none();
        let limit = self.config.max_redirects;
        let mut redirects = 0u32;

        tracing::debug!(
            "opening {} {} from {:?}",
            self.ctx.method,
            self.ctx.url,
            range_start
        );

        let status = loop {
            self.ctx.begin_hop(fresh);
            let conn = match self.open_hop(range_start) {
                Ok(conn) => conn,
                Err(e) => return Err(self.fail_open(e)),
            };
            let status = conn.status();
            self.ctx.status = Some(status);
            self.connection = Some(conn);

            if !is_redirect(status) {
                break status;
            }
            if self.ctx.response.location.is_none() {
                return Err(self.fail_open(StreamError::MissingLocation { status }));
            }
            if redirects >= limit {
                let err = StreamError::TooManyRedirects {
                    limit,
                    status,
                    url: self.ctx.url.clone(),
                };
                return Err(self.fail_open(err));
            }
            redirects += 1;
            tracing::debug!(
                "HTTP {}: following redirect {} to {}",
                status,
                redirects,
                self.ctx.url
            );
            self.release_connection();
            self.ctx.was_redirected = true;
        };

        if !is_open_success(status) {
            return Err(self.fail_open(StreamError::Status(status)));
        }

        self.ctx.settle_size(status, range_start);
        self.ctx.state = ConnectionState::Open;
        self.ctx.exists = true;
        self.ctx.position = 0;
        self.ctx.error = 0;

        tracing::info!(
            "opened {} {} status={} size={:?} ranges={} text={} redirected={}",
            self.ctx.method,
            self.ctx.url,
            status,
            self.ctx.size,
            self.ctx.response.range_supported,
            self.ctx.response.is_text,
            self.ctx.was_redirected
        );
        Ok(status)
    }

    /// Fails the open. Whatever size the error response declared belongs to
    /// that response, not to the resource.
    fn fail_open(&mut self, err: StreamError) -> StreamError {
        self.ctx.size = ResourceSize::Unknown;
        self.fail(err)
    }

    fn open_hop(&mut self, range_start: Option<u64>) -> Result<T::Connection, StreamError> {
        let url = self.ctx.url.clone();
        let headers = self.ctx.request_headers.clone();
        let request = Request {
            url: &url,
            method: self.ctx.method,
            headers: &headers,
            range_start,
        };
        let mut events = HeaderInterpreter::new(&mut self.ctx, self.hook.as_mut());
        Ok(self.transport.open(&request, &mut events)?)
    }
}
