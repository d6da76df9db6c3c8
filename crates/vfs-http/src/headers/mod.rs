//! Response header interpretation.
//!
//! [`HeaderInterpreter`] is the event sink handed to the transport for the
//! duration of one call. It folds every response header into the request
//! context through the ordered rule table in `rules`, then forwards the raw
//! pair to the caller's header hook.

mod content_disposition;
mod content_range;
mod content_type;
mod rules;

pub use content_disposition::{is_directory_listing, parse_content_disposition_filename};
pub use content_range::parse_content_range_total;
pub use content_type::is_text_content_type;

use crate::client::{HeaderHook, RequestContext};
use crate::error::TRANSPORT_ERROR_CODE;
use crate::transport::{TransportEvent, TransportEvents};

/// Facts learned from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    /// Server sent `Accept-Ranges: bytes`.
    pub range_supported: bool,
    pub is_text: bool,
    /// Content-Disposition names a directory listing.
    pub is_directory: bool,
    /// Server sent a `DAV` header.
    pub is_webdav: bool,
    pub content_type: Option<String>,
    /// Filename from `Content-Disposition`.
    pub filename: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Raw `Location` of the most recent response.
    pub location: Option<String>,
    /// Total length from `Content-Range` of the most recent response.
    pub content_range_total: Option<u64>,
}

/// Borrowed sink applying transport events to a request context.
pub struct HeaderInterpreter<'a> {
    ctx: &'a mut RequestContext,
    hook: Option<&'a mut HeaderHook>,
}

impl<'a> HeaderInterpreter<'a> {
    pub fn new(ctx: &'a mut RequestContext, hook: Option<&'a mut HeaderHook>) -> Self {
        Self { ctx, hook }
    }

    fn header(&mut self, name: &str, raw: &str) {
        let value = raw.trim();
        for rule in rules::RULES {
            if name.eq_ignore_ascii_case(rule.name) {
                (rule.apply)(self.ctx, value);
            }
        }
        if let Some(hook) = self.hook.as_deref_mut() {
            hook(name, raw);
        }
    }
}

impl TransportEvents for HeaderInterpreter<'_> {
    fn on_event(&mut self, event: TransportEvent<'_>) {
        match event {
            TransportEvent::Header { name, value } => self.header(name, value),
            TransportEvent::Data { len, chunked: true } => self.ctx.note_chunk(len as u64),
            TransportEvent::Data { .. } => {}
            TransportEvent::Error(err) => {
                tracing::debug!("transport error on {}: {}", self.ctx.url(), err);
                self.ctx.error = TRANSPORT_ERROR_CODE;
            }
            TransportEvent::Connected
            | TransportEvent::HeadersSent
            | TransportEvent::Finished
            | TransportEvent::Disconnected => {
                tracing::trace!("{:?} for {}", event, self.ctx.url());
            }
        }
    }
}
