//! Seek engine.
//!
//! Servers that advertised `Accept-Ranges: bytes` are reopened with a
//! `Range` request at the target. Otherwise GET streams seek by reading and
//! discarding bytes: forward from the live stream, backward (or to 0) from a
//! fresh reopen. Manual discard costs O(distance) in transferred bytes, so
//! large forward seeks on such servers are slow.

use crate::client::StreamingClient;
use crate::error::StreamError;
use crate::headers::HeaderInterpreter;
use crate::transport::{Connection, Method, Transport};

impl<T: Transport> StreamingClient<T> {
    /// Moves the stream to `target`.
    ///
    /// A ranged reopen that is answered with anything but 206 fails the seek;
    /// there is no fallback to discarding in that case. After a failed
    /// ranged or discarding seek the stream is closed in the error state and
    /// must be reopened.
    pub fn seek(&mut self, target: u64) -> Result<(), StreamError> {
        if !self.ctx.is_open() {
            return Err(self.reject(StreamError::NotOpen));
        }
        if target == self.ctx.position {
            return Ok(());
        }
        if let Some(size) = self.ctx.size.declared() {
            if target > size {
                return Err(self.reject(StreamError::SeekPastEnd { target, size }));
            }
        }

        let seekable = self.ctx.response.range_supported || self.ctx.method == Method::Get;
        if !seekable {
            return Err(self.reject(StreamError::SeekUnsupported(self.ctx.method)));
        }
        if self.ctx.size.declared() == Some(target) {
            self.seek_to_end(target);
            return Ok(());
        }
        if self.ctx.response.range_supported {
            return self.seek_ranged(target);
        }
        self.seek_by_discard(target)
    }

    /// A range starting at the end is unsatisfiable, so there is nothing to
    /// request: drop the connection and park at the end. Reads return 0
    /// and a later seek reopens as usual.
    fn seek_to_end(&mut self, size: u64) {
        tracing::debug!("seek to end of {} ({} bytes)", self.ctx.url, size);
        self.release_connection();
        self.ctx.position = size;
        self.ctx.error = 0;
    }

    fn seek_ranged(&mut self, target: u64) -> Result<(), StreamError> {
        tracing::debug!("ranged reopen of {} at {}", self.ctx.url, target);
        let status = self.open_with_redirects(Some(target))?;
        if status != 206 {
            return Err(self.fail(StreamError::RangeIgnored(status)));
        }
        self.ctx.position = target;
        Ok(())
    }

    fn seek_by_discard(&mut self, target: u64) -> Result<(), StreamError> {
        let skip = if target < self.ctx.position || target == 0 {
            tracing::debug!(
                "{} has no range support; reopening to seek back from {} to {}",
                self.ctx.url,
                self.ctx.position,
                target
            );
            self.open_with_redirects(None)?;
            target
        } else {
            tracing::debug!(
                "{} has no range support; discarding {} bytes",
                self.ctx.url,
                target - self.ctx.position
            );
            target - self.ctx.position
        };
        self.discard(skip)?;
        self.ctx.position = target;
        self.ctx.error = 0;
        Ok(())
    }

    /// Reads and drops exactly `count` bytes from the live connection.
    fn discard(&mut self, count: u64) -> Result<(), StreamError> {
        let mut scratch = vec![0u8; self.config.discard_buffer_bytes.max(1)];
        let mut remaining = count;
        while remaining > 0 {
            let want = scratch
                .len()
                .min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let conn = self.connection.as_mut().ok_or(StreamError::NotOpen)?;
            let mut events = HeaderInterpreter::new(&mut self.ctx, self.hook.as_mut());
            match conn.read(&mut scratch[..want], &mut events) {
                Ok(0) => {
                    let err = StreamError::ShortDiscard {
                        discarded: count - remaining,
                        wanted: count,
                    };
                    return Err(self.fail(err));
                }
                Ok(n) => remaining -= n as u64,
                Err(e) => return Err(self.fail(e.into())),
            }
        }
        Ok(())
    }
}
