//! Per-open request state.

use crate::headers::ResponseInfo;
use crate::transport::Method;

/// Connection lifecycle of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    /// Redirect resolution in progress.
    Opening,
    Open,
    /// The last open or transfer failed; see the error code.
    Error,
}

/// Length of the resource being streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceSize {
    /// No length seen yet.
    #[default]
    Unknown,
    /// Total length from `Content-Length` (or `Content-Range` after a ranged reopen).
    Declared(u64),
    /// Length of the most recent chunk of a chunked body; only a hint.
    ChunkHint(u64),
}

impl ResourceSize {
    /// Total length, when the server declared one.
    pub fn declared(self) -> Option<u64> {
        match self {
            ResourceSize::Declared(n) => Some(n),
            ResourceSize::Unknown | ResourceSize::ChunkHint(_) => None,
        }
    }

    /// Best known length, `-1` when unknown.
    pub fn as_hint(self) -> i64 {
        match self {
            ResourceSize::Unknown => -1,
            ResourceSize::Declared(n) | ResourceSize::ChunkHint(n) => {
                i64::try_from(n).unwrap_or(i64::MAX)
            }
        }
    }
}

/// State of one logical open: target, method, position, and what the
/// response headers said.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub(crate) url: String,
    pub(crate) method: Method,
    pub(crate) position: u64,
    pub(crate) size: ResourceSize,
    pub(crate) response: ResponseInfo,
    pub(crate) status: Option<u16>,
    pub(crate) was_redirected: bool,
    pub(crate) error: u16,
    pub(crate) state: ConnectionState,
    pub(crate) exists: bool,
    pub(crate) request_headers: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new(url: &str, method: Method) -> Self {
        Self {
            url: url.to_string(),
            method,
            position: 0,
            size: ResourceSize::Unknown,
            response: ResponseInfo::default(),
            status: None,
            was_redirected: false,
            error: 0,
            state: ConnectionState::Closed,
            exists: false,
            request_headers: Vec::new(),
        }
    }

    /// Retargets the context for a new open. Outgoing headers survive.
    pub(crate) fn reset_for(&mut self, url: &str, method: Method) {
        self.url = url.to_string();
        self.method = method;
        self.position = 0;
        self.size = ResourceSize::Unknown;
        self.response = ResponseInfo::default();
        self.status = None;
        self.was_redirected = false;
        self.error = 0;
        self.exists = false;
    }

    /// Clears per-response state before a request goes out. A fresh open
    /// forgets everything learned so far; a ranged reopen keeps the
    /// capability flags so a 206 without `Accept-Ranges` does not demote it.
    pub(crate) fn begin_hop(&mut self, fresh: bool) {
        self.size = ResourceSize::Unknown;
        self.status = None;
        if fresh {
            self.response = ResponseInfo::default();
        } else {
            self.response.location = None;
            self.response.content_range_total = None;
        }
    }

    /// Settles `size` once the terminal response of an open is known.
    /// A 206 carries the remaining length; restore the full size from
    /// `Content-Range`, or from the range start when that is missing.
    pub(crate) fn settle_size(&mut self, status: u16, range_start: Option<u64>) {
        if status != 206 {
            return;
        }
        self.size = match (self.response.content_range_total, self.size) {
            (Some(total), _) => ResourceSize::Declared(total),
            (None, ResourceSize::Declared(remaining)) => {
                ResourceSize::Declared(range_start.unwrap_or(0) + remaining)
            }
            (None, other) => other,
        };
    }

    pub(crate) fn note_chunk(&mut self, len: u64) {
        if self.size.declared().is_none() {
            self.size = ResourceSize::ChunkHint(len);
        }
    }

    /// Bytes a read of `want` may return without passing a declared end.
    pub(crate) fn clamp_read(&self, want: usize) -> usize {
        match self.size.declared() {
            Some(size) => {
                let left = size.saturating_sub(self.position);
                want.min(usize::try_from(left).unwrap_or(usize::MAX))
            }
            None => want,
        }
    }

    /// Adds or replaces an outgoing request header (case-insensitive name).
    pub(crate) fn set_request_header(&mut self, name: &str, value: &str) {
        match self
            .request_headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self
                .request_headers
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size(&self) -> ResourceSize {
        self.size
    }

    /// Size with `-1` standing for unknown.
    pub fn size_hint(&self) -> i64 {
        self.size.as_hint()
    }

    pub fn range_supported(&self) -> bool {
        self.response.range_supported
    }

    pub fn is_text(&self) -> bool {
        self.response.is_text
    }

    pub fn is_directory(&self) -> bool {
        self.response.is_directory
    }

    pub fn is_webdav(&self) -> bool {
        self.response.is_webdav
    }

    /// Filename suggested by `Content-Disposition`.
    pub fn filename(&self) -> Option<&str> {
        self.response.filename.as_deref()
    }

    pub fn response(&self) -> &ResponseInfo {
        &self.response
    }

    pub fn last_status(&self) -> Option<u16> {
        self.status
    }

    pub fn was_redirected(&self) -> bool {
        self.was_redirected
    }

    /// 0 when the last operation succeeded; otherwise an HTTP status or 1.
    pub fn error_code(&self) -> u16 {
        self.error
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn request_headers(&self) -> &[(String, String)] {
        &self.request_headers
    }
}
