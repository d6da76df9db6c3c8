//! libcurl transport.
//!
//! libcurl drives a transfer to completion from inside `perform`, pushing
//! headers and body through callbacks. To expose that as a pull-style
//! connection, each open runs one `Easy` transfer on a worker thread which
//! forwards header lines and body blocks over a bounded channel. The
//! connection pulls from the channel on `read`; the bound gives backpressure
//! so an idle stream does not buffer the whole body.
//!
//! Request bodies (PUT/POST) flow the other way: `write` hands blocks to
//! curl's read callback through a second channel and `close` ends the body,
//! then waits for the server's answer. Uploads are sent with
//! `Expect: 100-continue`, so a server that redirects or refuses the request
//! answers during `open`, before any body is written.

use super::{
    parse_status_line, range_header_value, split_header_line, Connection, Request, Transport,
    TransportError, TransportErrorKind, TransportEvent, TransportEvents,
};
use crate::config::ClientConfig;
use crate::transport::Method;
use curl::easy::{Easy, HttpVersion, List};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Body blocks buffered between the worker and the reader.
const EVENT_QUEUE_DEPTH: usize = 16;

/// Status reported for a streamed upload until the server answers at close.
const PROVISIONAL_UPLOAD_STATUS: u16 = 200;

/// How long an upload open waits for `100 Continue` or an early final
/// status. Matches libcurl's default expect timeout, after which it starts
/// sending the body regardless.
const EXPECT_CONTINUE_WAIT: Duration = Duration::from_millis(1000);

enum WorkerEvent {
    HeaderLine(String),
    Body(Vec<u8>),
    Done(Result<(), curl::Error>),
}

/// Opens connections with libcurl. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    stall_timeout: Duration,
    user_agent: String,
    buffer_size: Option<usize>,
    keep_alive: Option<(Duration, Duration)>,
}

impl CurlTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            stall_timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            buffer_size: config.transfer_buffer_bytes,
            keep_alive: config.keep_alive.map(|k| {
                (
                    Duration::from_secs(k.idle_secs),
                    Duration::from_secs(k.interval_secs),
                )
            }),
        }
    }

    fn configure(&self, request: &Request<'_>) -> Result<Easy, curl::Error> {
        let mut easy = Easy::new();
        easy.url(&request.url.replace(' ', "%20"))?;
        easy.useragent(&self.user_agent)?;
        easy.http_version(HttpVersion::V11)?;
        // Redirects are resolved by the client so it can see every hop.
        easy.follow_location(false)?;
        easy.connect_timeout(self.connect_timeout)?;
        // Abort when the transfer stalls (< 1 byte/s) for the configured timeout.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(self.stall_timeout)?;
        easy.progress(true)?;
        if let Some(size) = self.buffer_size {
            easy.buffer_size(size)?;
        }
        if let Some((idle, interval)) = self.keep_alive {
            easy.tcp_keepalive(true)?;
            easy.tcp_keepidle(idle)?;
            easy.tcp_keepintvl(interval)?;
        }

        match request.method {
            Method::Get => easy.get(true)?,
            Method::Head => easy.nobody(true)?,
            Method::Post => easy.post(true)?,
            Method::Put => easy.upload(true)?,
        }

        let mut list = List::new();
        for (name, value) in request.headers {
            list.append(&format!("{}: {}", name.trim(), value.trim()))?;
        }
        if let Some(start) = request.range_start {
            list.append(&format!("Range: {}", range_header_value(start)))?;
        }
        if request.method.sends_body() {
            list.append("Transfer-Encoding: chunked")?;
            list.append("Expect: 100-continue")?;
        }
        easy.http_headers(list)?;
        Ok(easy)
    }
}

impl Transport for CurlTransport {
    type Connection = CurlConnection;

    fn open(
        &mut self,
        request: &Request<'_>,
        events: &mut dyn TransportEvents,
    ) -> Result<CurlConnection, TransportError> {
        let easy = self.configure(request)?;
        let (event_tx, event_rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (upload_tx, upload_rx) = if request.method.sends_body() {
            let (tx, rx) = mpsc::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let flag = Arc::clone(&cancelled);
        let worker = thread::Builder::new()
            .name("vfs-http-transfer".to_string())
            .spawn(move || run_transfer(easy, event_tx, upload_rx, flag))
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Other,
                    format!("failed to spawn transfer thread: {}", e),
                )
            })?;

        let mut conn = CurlConnection {
            status: 0,
            chunked: false,
            events: Some(event_rx),
            upload: upload_tx,
            cancelled,
            worker: Some(worker),
            pending: Vec::new(),
            offset: 0,
            finished: false,
        };

        if request.method.sends_body() {
            conn.await_go_ahead(events)?;
            return Ok(conn);
        }

        conn.await_headers(events)?;
        Ok(conn)
    }
}

/// A libcurl transfer running on its worker thread.
pub struct CurlConnection {
    status: u16,
    chunked: bool,
    events: Option<Receiver<WorkerEvent>>,
    upload: Option<Sender<Vec<u8>>>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    pending: Vec<u8>,
    offset: usize,
    finished: bool,
}

impl CurlConnection {
    fn next_event(&mut self) -> Result<WorkerEvent, TransportError> {
        let rx = self.events.as_ref().ok_or_else(TransportError::closed)?;
        rx.recv().map_err(|_| TransportError::closed())
    }

    /// Consumes events until the final header block has ended.
    fn await_headers(&mut self, events: &mut dyn TransportEvents) -> Result<(), TransportError> {
        loop {
            match self.next_event()? {
                WorkerEvent::HeaderLine(line) => {
                    if self.header_line(&line, events) {
                        return Ok(());
                    }
                }
                WorkerEvent::Body(block) => {
                    events.on_event(TransportEvent::Data {
                        len: block.len(),
                        chunked: self.chunked,
                    });
                    self.pending = block;
                    self.offset = 0;
                    return Ok(());
                }
                WorkerEvent::Done(result) => {
                    self.finished = true;
                    result?;
                    if self.status == 0 {
                        return Err(TransportError::new(
                            TransportErrorKind::Protocol,
                            "transfer finished without a response",
                        ));
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Waits for the server to accept an upload before any body is sent.
    /// `100 Continue` or silence leaves the provisional status in place; a
    /// final response (a redirect, an error) becomes the status so the open
    /// can act on it.
    fn await_go_ahead(&mut self, events: &mut dyn TransportEvents) -> Result<(), TransportError> {
        let deadline = Instant::now() + EXPECT_CONTINUE_WAIT;
        loop {
            let rx = self.events.as_ref().ok_or_else(TransportError::closed)?;
            let wait = deadline.saturating_duration_since(Instant::now());
            let event = match rx.recv_timeout(wait) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    self.status = PROVISIONAL_UPLOAD_STATUS;
                    return Ok(());
                }
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::closed()),
            };
            match event {
                WorkerEvent::HeaderLine(line) => {
                    if line.is_empty() && (100..200).contains(&self.status) {
                        tracing::trace!("upload accepted with HTTP {}", self.status);
                        self.status = PROVISIONAL_UPLOAD_STATUS;
                        return Ok(());
                    }
                    if self.header_line(&line, events) {
                        return Ok(());
                    }
                }
                WorkerEvent::Body(_) => {}
                WorkerEvent::Done(result) => {
                    self.finished = true;
                    result?;
                    if self.status == 0 {
                        return Err(TransportError::new(
                            TransportErrorKind::Protocol,
                            "transfer finished without a response",
                        ));
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Handles one raw header line. Returns true once a final (non-1xx)
    /// header block has ended.
    fn header_line(&mut self, line: &str, events: &mut dyn TransportEvents) -> bool {
        if let Some(code) = parse_status_line(line) {
            self.status = code;
            self.chunked = false;
            return false;
        }
        if line.is_empty() {
            return self.status >= 200;
        }
        if self.status < 200 {
            return false;
        }
        if let Some((name, value)) = split_header_line(line) {
            if name.eq_ignore_ascii_case("transfer-encoding")
                && value.to_ascii_lowercase().contains("chunked")
            {
                self.chunked = true;
            }
            events.on_event(TransportEvent::Header { name, value });
        }
        false
    }

    /// Drains the worker after an upload ended and returns the server's status.
    fn collect_response(
        &mut self,
        events: &mut dyn TransportEvents,
    ) -> Result<Option<u16>, TransportError> {
        // Answered before the body went out; the open already saw the status.
        if self.finished {
            return Ok(None);
        }
        self.status = 0;
        loop {
            match self.next_event()? {
                WorkerEvent::HeaderLine(line) => {
                    self.header_line(&line, events);
                }
                WorkerEvent::Body(_) => {}
                WorkerEvent::Done(result) => {
                    self.finished = true;
                    result?;
                    return Ok((self.status != 0).then_some(self.status));
                }
            }
        }
    }

    fn release(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.upload = None;
        self.events = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("curl transfer thread panicked");
            }
        }
    }
}

impl Connection for CurlConnection {
    fn status(&self) -> u16 {
        self.status
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        events: &mut dyn TransportEvents,
    ) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.offset >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            match self.next_event()? {
                WorkerEvent::Body(block) => {
                    events.on_event(TransportEvent::Data {
                        len: block.len(),
                        chunked: self.chunked,
                    });
                    self.pending = block;
                    self.offset = 0;
                }
                // Trailers after a chunked body.
                WorkerEvent::HeaderLine(_) => {}
                WorkerEvent::Done(result) => {
                    self.finished = true;
                    if let Err(e) = result {
                        let err = TransportError::from(e);
                        events.on_event(TransportEvent::Error(&err));
                        return Err(err);
                    }
                    events.on_event(TransportEvent::Finished);
                }
            }
        }
        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let upload = self.upload.as_ref().ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Protocol,
                "connection does not carry a request body",
            )
        })?;
        // An empty block would read as end-of-body on the curl side.
        if buf.is_empty() {
            return Ok(0);
        }
        upload
            .send(buf.to_vec())
            .map_err(|_| TransportError::closed())?;
        Ok(buf.len())
    }

    fn close(&mut self, events: &mut dyn TransportEvents) -> Result<Option<u16>, TransportError> {
        if self.worker.is_none() {
            return Ok(None);
        }
        let outcome = if self.upload.take().is_some() {
            self.collect_response(events)
        } else {
            Ok(None)
        };
        self.release();
        events.on_event(TransportEvent::Disconnected);
        outcome
    }
}

impl Drop for CurlConnection {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_transfer(
    mut easy: Easy,
    events: SyncSender<WorkerEvent>,
    upload: Option<Receiver<Vec<u8>>>,
    cancelled: Arc<AtomicBool>,
) {
    let result = perform(&mut easy, &events, upload, cancelled);
    let _ = events.send(WorkerEvent::Done(result));
}

fn perform(
    easy: &mut Easy,
    events: &SyncSender<WorkerEvent>,
    upload: Option<Receiver<Vec<u8>>>,
    cancelled: Arc<AtomicBool>,
) -> Result<(), curl::Error> {
    let header_tx = events.clone();
    easy.header_function(move |data| {
        let line = String::from_utf8_lossy(data).trim_end().to_string();
        header_tx.send(WorkerEvent::HeaderLine(line)).is_ok()
    })?;

    let body_tx = events.clone();
    easy.write_function(move |data| {
        match body_tx.send(WorkerEvent::Body(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            // Reader went away; a short write aborts the transfer.
            Err(_) => Ok(0),
        }
    })?;

    easy.progress_function(move |_, _, _, _| !cancelled.load(Ordering::Relaxed))?;

    if let Some(rx) = upload {
        let mut block: Vec<u8> = Vec::new();
        let mut offset = 0usize;
        easy.read_function(move |out| {
            if offset >= block.len() {
                match rx.recv() {
                    Ok(next) => {
                        block = next;
                        offset = 0;
                    }
                    Err(_) => return Ok(0),
                }
            }
            let n = out.len().min(block.len() - offset);
            out[..n].copy_from_slice(&block[offset..offset + n]);
            offset += n;
            Ok(n)
        })?;
    }

    easy.perform()
}
