//! In-memory transport for unit tests: scripted routes, range handling,
//! chunking, injected read failures, and open/close accounting.

use super::{
    Connection, Method, Request, Transport, TransportError, TransportErrorKind, TransportEvent,
    TransportEvents,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub(crate) enum Route {
    /// 3xx with an optional `Location`.
    Redirect { status: u16, location: Option<String> },
    /// Bare status with no body.
    Status(u16),
    Resource(Resource),
    /// Accepts a streamed request body and answers `final_status` at close.
    Upload { final_status: u16 },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Resource {
    pub body: Vec<u8>,
    /// Send `Accept-Ranges: bytes`.
    pub advertise_ranges: bool,
    /// Answer `Range` requests with 206.
    pub honor_ranges: bool,
    /// Chunked framing; each read returns at most one chunk.
    pub chunk_size: Option<usize>,
    /// Reads fail once this many bytes of one response have been served.
    pub fail_after: Option<usize>,
    pub headers: Vec<(String, String)>,
}

impl Resource {
    pub fn ranged(body: Vec<u8>) -> Self {
        Self {
            body,
            advertise_ranges: true,
            honor_ranges: true,
            ..Self::default()
        }
    }

    pub fn plain(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenRecord {
    pub url: String,
    pub method: Method,
    pub range_start: Option<u64>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Script {
    routes: HashMap<String, Route>,
    opens: Vec<OpenRecord>,
    bytes_served: u64,
    live: usize,
    max_live: usize,
    uploaded: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, route: Route) -> Self {
        self.lock().routes.insert(url.to_string(), route);
        self
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.lock().opens.clone()
    }

    /// Body bytes handed out through `read` across all connections.
    pub fn bytes_served(&self) -> u64 {
        self.lock().bytes_served
    }

    /// Connections currently open.
    pub fn live(&self) -> usize {
        self.lock().live
    }

    /// Highest number of simultaneously open connections seen.
    pub fn max_live(&self) -> usize {
        self.lock().max_live
    }

    pub fn uploaded(&self) -> Vec<u8> {
        self.lock().uploaded.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

struct Prepared {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    chunk_size: Option<usize>,
    fail_after: Option<usize>,
    upload_status: Option<u16>,
}

fn prepare(route: Route, request: &Request<'_>) -> Prepared {
    let mut prepared = Prepared {
        status: 200,
        headers: Vec::new(),
        body: Vec::new(),
        chunk_size: None,
        fail_after: None,
        upload_status: None,
    };
    match route {
        Route::Redirect { status, location } => {
            prepared.status = status;
            if let Some(location) = location {
                prepared.headers.push(("Location".into(), location));
            }
            prepared.headers.push(("Content-Length".into(), "0".into()));
        }
        Route::Status(status) => {
            prepared.status = status;
            prepared.headers.push(("Content-Length".into(), "0".into()));
        }
        Route::Upload { final_status } => {
            prepared.upload_status = Some(final_status);
        }
        Route::Resource(resource) => {
            let total = resource.body.len();
            let mut body = resource.body;
            if resource.advertise_ranges {
                prepared.headers.push(("Accept-Ranges".into(), "bytes".into()));
            }
            match request.range_start {
                Some(start) if resource.honor_ranges && start as usize > total => {
                    prepared.status = 416;
                    prepared
                        .headers
                        .push(("Content-Range".into(), format!("bytes */{}", total)));
                    body.clear();
                }
                Some(start) if resource.honor_ranges => {
                    let start = start as usize;
                    prepared.status = 206;
                    prepared.headers.push((
                        "Content-Range".into(),
                        format!("bytes {}-{}/{}", start, total.saturating_sub(1), total),
                    ));
                    body.drain(..start);
                }
                _ => {}
            }
            if resource.chunk_size.is_some() {
                prepared
                    .headers
                    .push(("Transfer-Encoding".into(), "chunked".into()));
            } else {
                prepared
                    .headers
                    .push(("Content-Length".into(), body.len().to_string()));
            }
            prepared.headers.extend(resource.headers);
            if request.method != Method::Head {
                prepared.body = body;
            }
            prepared.chunk_size = resource.chunk_size;
            prepared.fail_after = resource.fail_after;
        }
    }
    prepared
}

impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    fn open(
        &mut self,
        request: &Request<'_>,
        events: &mut dyn TransportEvents,
    ) -> Result<ScriptedConnection, TransportError> {
        let route = {
            let mut script = self.lock();
            script.opens.push(OpenRecord {
                url: request.url.to_string(),
                method: request.method,
                range_start: request.range_start,
                headers: request.headers.to_vec(),
            });
            script.routes.get(request.url).cloned()
        };
        let route = route.ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Connection,
                format!("couldn't connect to {}", request.url),
            )
        })?;

        let prepared = prepare(route, request);
        events.on_event(TransportEvent::Connected);
        events.on_event(TransportEvent::HeadersSent);
        for (name, value) in &prepared.headers {
            events.on_event(TransportEvent::Header { name, value });
        }

        {
            let mut script = self.lock();
            script.live += 1;
            script.max_live = script.max_live.max(script.live);
        }

        Ok(ScriptedConnection {
            script: Arc::clone(&self.script),
            status: prepared.status,
            body: prepared.body,
            offset: 0,
            chunk_size: prepared.chunk_size,
            fail_after: prepared.fail_after,
            upload_status: prepared.upload_status,
            closed: false,
        })
    }
}

pub(crate) struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
    status: u16,
    body: Vec<u8>,
    offset: usize,
    chunk_size: Option<usize>,
    fail_after: Option<usize>,
    upload_status: Option<u16>,
    closed: bool,
}

impl ScriptedConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.script.lock().unwrap().live -= 1;
        }
    }
}

impl Connection for ScriptedConnection {
    fn status(&self) -> u16 {
        self.status
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        events: &mut dyn TransportEvents,
    ) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::closed());
        }
        if let Some(limit) = self.fail_after {
            if self.offset >= limit && self.offset < self.body.len() {
                let err = TransportError::new(TransportErrorKind::Connection, "connection reset");
                events.on_event(TransportEvent::Error(&err));
                return Err(err);
            }
        }
        let mut n = buf.len().min(self.body.len() - self.offset);
        if let Some(chunk) = self.chunk_size {
            n = n.min(chunk);
        }
        if let Some(limit) = self.fail_after {
            n = n.min(limit - self.offset);
        }
        if n == 0 {
            events.on_event(TransportEvent::Finished);
            return Ok(0);
        }
        buf[..n].copy_from_slice(&self.body[self.offset..self.offset + n]);
        self.offset += n;
        self.script.lock().unwrap().bytes_served += n as u64;
        events.on_event(TransportEvent::Data {
            len: n,
            chunked: self.chunk_size.is_some(),
        });
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        if self.closed || self.upload_status.is_none() {
            return Err(TransportError::closed());
        }
        self.script.lock().unwrap().uploaded.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self, events: &mut dyn TransportEvents) -> Result<Option<u16>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        self.release();
        events.on_event(TransportEvent::Disconnected);
        Ok(self.upload_status)
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.release();
    }
}
