//! File and stream adapter for a virtual filesystem layer.
//!
//! [`HttpFile`] answers metadata questions from a single HEAD request issued
//! on first use. [`HttpStream`] is an open byte stream over the same URL and
//! implements the `std::io` traits.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use crate::client::{ResourceSize, StreamingClient};
use crate::config::ClientConfig;
use crate::error::StreamError;
use crate::transport::{Method, Transport};

/// How a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    pub fn method(self) -> Method {
        match self {
            OpenMode::Read => Method::Get,
            OpenMode::Write => Method::Post,
            OpenMode::Append => Method::Put,
        }
    }
}

/// Remote file addressed by URL.
pub struct HttpFile<T: Transport + Clone> {
    url: String,
    transport: T,
    config: ClientConfig,
    probe: Option<StreamingClient<T>>,
}

impl<T: Transport + Clone> HttpFile<T> {
    pub fn new(url: &str, transport: T, config: ClientConfig) -> Self {
        Self {
            url: url.to_string(),
            transport,
            config,
            probe: None,
        }
    }

    /// Current URL; replaced by the redirect target once the HEAD probe ran.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn probe(&mut self) -> &StreamingClient<T> {
        let url = &mut self.url;
        let transport = &self.transport;
        let config = &self.config;
        self.probe.get_or_insert_with(|| {
            let mut client = StreamingClient::new(transport.clone(), config.clone());
            match client.head(url) {
                Ok(()) if client.context().was_redirected() => {
                    tracing::debug!("{} resolves to {}", url, client.context().url());
                    *url = client.context().url().to_string();
                }
                Ok(()) => {}
                Err(e) => tracing::debug!("HEAD {} failed: {}", url, e),
            }
            client
        })
    }

    pub fn exists(&mut self) -> bool {
        self.probe().context().exists()
    }

    pub fn size(&mut self) -> ResourceSize {
        self.probe().size()
    }

    pub fn is_text(&mut self) -> bool {
        self.probe().context().is_text()
    }

    /// Directory listings and WebDAV servers both count as directories.
    pub fn is_directory(&mut self) -> bool {
        let ctx = self.probe().context();
        ctx.is_directory() || ctx.is_webdav()
    }

    /// Raw `Last-Modified` value from the HEAD response.
    pub fn last_modified(&mut self) -> Option<String> {
        self.probe().context().response().last_modified.clone()
    }

    pub fn last_write(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    pub fn creation_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    /// Opens a stream on the (possibly redirected) URL.
    pub fn open_stream(&mut self, mode: OpenMode) -> Result<HttpStream<T>, StreamError> {
        self.probe();
        let client = StreamingClient::new(self.transport.clone(), self.config.clone());
        let mut stream = HttpStream::new(client, &self.url, mode);
        stream.open()?;
        Ok(stream)
    }
}

/// Byte stream on one URL.
pub struct HttpStream<T: Transport> {
    client: StreamingClient<T>,
    url: String,
    mode: OpenMode,
}

impl<T: Transport> HttpStream<T> {
    pub fn new(mut client: StreamingClient<T>, url: &str, mode: OpenMode) -> Self {
        client.retarget(url, mode.method());
        Self {
            client,
            url: url.to_string(),
            mode,
        }
    }

    pub fn open(&mut self) -> Result<(), StreamError> {
        self.client.open(&self.url, self.mode.method())
    }

    pub fn close(&mut self) {
        self.client.close();
    }

    pub fn is_open(&self) -> bool {
        self.client.is_open()
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.client.read(buf)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        self.client.write(buf)
    }

    pub fn seek(&mut self, target: u64) -> Result<(), StreamError> {
        self.client.seek(target)
    }

    pub fn size(&self) -> ResourceSize {
        self.client.size()
    }

    pub fn position(&self) -> u64 {
        self.client.position()
    }

    pub fn client(&self) -> &StreamingClient<T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut StreamingClient<T> {
        &mut self.client
    }
}

fn io_error(err: StreamError) -> io::Error {
    let kind = match &err {
        StreamError::NotOpen => io::ErrorKind::NotConnected,
        StreamError::SeekPastEnd { .. } => io::ErrorKind::InvalidInput,
        StreamError::SeekUnsupported(_) => io::ErrorKind::Unsupported,
        StreamError::ShortDiscard { .. } => io::ErrorKind::UnexpectedEof,
        StreamError::Status(404) => io::ErrorKind::NotFound,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

impl<T: Transport> Read for HttpStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.client.read(buf).map_err(io_error)
    }
}

impl<T: Transport> Write for HttpStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.client.write(buf).map_err(io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport> Seek for HttpStream<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta),
            SeekFrom::End(delta) => match self.size().declared() {
                Some(size) => size.checked_add_signed(delta),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "seek from end needs a declared size",
                    ))
                }
            },
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative offset")
        })?;
        self.client.seek(target).map_err(io_error)?;
        Ok(target)
    }
}
