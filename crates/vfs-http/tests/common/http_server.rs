//! Minimal HTTP/1.1 server for integration tests.
//!
//! Routes:
//! - `/a`: 302 to `/b`.
//! - `/b`: the ranged body; advertises `Accept-Ranges: bytes` and answers
//!   `Range: bytes=N-` with 206.
//! - `/plain`: the plain body; no range support, `Range` is ignored.
//! - `/chunked`: the plain body with chunked framing.
//! - `/loop`: 302 to itself.
//! - `/upload`: PUT/POST; sends `100 Continue` when asked, decodes a
//!   chunked request body and answers 201 with `X-Received: <bytes>` and
//!   `X-Token-Seen: <X-Token header>`.
//! - `/upload-old`: 301 to `/upload` without reading a body.
//! - anything else: 404.
//!
//! Every response closes the connection.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct Bodies {
    pub ranged: Vec<u8>,
    pub plain: Vec<u8>,
}

/// Starts the server on a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits.
pub fn start(bodies: Bodies) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let bodies = Arc::new(bodies);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let bodies = Arc::clone(&bodies);
            thread::spawn(move || handle(stream, &bodies));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
        .collect()
}

struct Head {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
}

impl Head {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn range_start(&self) -> Option<usize> {
        self.header("Range")?
            .strip_prefix("bytes=")?
            .trim_end_matches('-')
            .parse()
            .ok()
    }
}

fn handle(mut stream: TcpStream, bodies: &Bodies) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some((head, rest)) = read_head(&mut stream) else {
        return;
    };
    let is_head = head.method.eq_ignore_ascii_case("HEAD");

    match head.path.as_str() {
        "/a" => redirect(&mut stream, "/b"),
        "/loop" => redirect(&mut stream, "/loop"),
        "/b" => serve_ranged(&mut stream, &head, &bodies.ranged, is_head),
        "/plain" => {
            let headers = format!("Content-Length: {}\r\n", bodies.plain.len());
            respond(&mut stream, "200 OK", &headers, &bodies.plain, is_head);
        }
        "/chunked" => serve_chunked(&mut stream, &bodies.plain),
        "/upload-old" => {
            let headers = "Location: /upload\r\nContent-Length: 0\r\n";
            respond(&mut stream, "301 Moved Permanently", headers, &[], false);
        }
        "/upload" => {
            let expects_continue = head
                .header("Expect")
                .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"));
            if expects_continue {
                let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
            }
            let body = read_chunked_body(&mut stream, rest);
            let headers = format!(
                "X-Received: {}\r\nX-Token-Seen: {}\r\nContent-Length: 0\r\n",
                body.len(),
                head.header("X-Token").unwrap_or("")
            );
            respond(&mut stream, "201 Created", &headers, &[], false);
        }
        _ => {
            let headers = "Content-Length: 0\r\n";
            respond(&mut stream, "404 Not Found", headers, &[], false);
        }
    }
}

fn redirect(stream: &mut TcpStream, location: &str) {
    let headers = format!("Location: {}\r\nContent-Length: 0\r\n", location);
    respond(stream, "302 Found", &headers, &[], false);
}

fn serve_ranged(stream: &mut TcpStream, head: &Head, body: &[u8], is_head: bool) {
    match head.range_start() {
        Some(start) if start >= body.len() => {
            let headers = format!(
                "Content-Range: bytes */{}\r\nContent-Length: 0\r\n",
                body.len()
            );
            respond(stream, "416 Range Not Satisfiable", &headers, &[], false);
        }
        Some(start) => {
            let slice = &body[start..];
            let headers = format!(
                "Accept-Ranges: bytes\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n",
                start,
                body.len() - 1,
                body.len(),
                slice.len()
            );
            respond(stream, "206 Partial Content", &headers, slice, is_head);
        }
        None => {
            let headers = format!(
                "Accept-Ranges: bytes\r\n\
                 Content-Type: application/octet-stream\r\n\
                 Content-Length: {}\r\n",
                body.len()
            );
            respond(stream, "200 OK", &headers, body, is_head);
        }
    }
}

fn serve_chunked(stream: &mut TcpStream, body: &[u8]) {
    let mut out = b"HTTP/1.1 200 OK\r\n\
        Content-Type: text/plain\r\n\
        Transfer-Encoding: chunked\r\n\
        Connection: close\r\n\r\n"
        .to_vec();
    for chunk in body.chunks(37) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    let _ = stream.write_all(&out);
}

fn respond(stream: &mut TcpStream, status: &str, headers: &str, body: &[u8], is_head: bool) {
    let head = format!("HTTP/1.1 {}\r\n{}Connection: close\r\n\r\n", status, headers);
    let _ = stream.write_all(head.as_bytes());
    if !is_head {
        let _ = stream.write_all(body);
    }
}

/// Reads up to the blank line ending the request head. Returns the parsed
/// head and any bytes read past it.
fn read_head(stream: &mut TcpStream) -> Option<(Head, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };
    let text = std::str::from_utf8(&buf[..end]).ok()?;
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let rest = buf[end + 4..].to_vec();
    Some((Head { method, path, headers }, rest))
}

fn read_chunked_body(stream: &mut TcpStream, mut buf: Vec<u8>) -> Vec<u8> {
    let mut body = Vec::new();
    let mut tmp = [0u8; 4096];
    let mut pos = 0;
    loop {
        // Size line.
        let line_end = loop {
            if let Some(i) = find(&buf[pos..], b"\r\n") {
                break pos + i;
            }
            match stream.read(&mut tmp) {
                Ok(0) | Err(_) => return body,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        };
        let size_text = String::from_utf8_lossy(&buf[pos..line_end]).to_string();
        let size = usize::from_str_radix(size_text.split(';').next().unwrap_or("").trim(), 16)
            .unwrap_or(0);
        pos = line_end + 2;
        if size == 0 {
            return body;
        }
        while buf.len() < pos + size + 2 {
            match stream.read(&mut tmp) {
                Ok(0) | Err(_) => return body,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size + 2;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
