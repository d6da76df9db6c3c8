//! Content-Disposition parsing (filename and filename*) and the
//! directory-listing heuristic.

/// Filename that marks a server-generated directory listing.
const DIRECTORY_LISTING_NAME: &str = "index.prg";

/// Extracts the filename from a raw Content-Disposition header value.
///
/// Supports `filename="value"` (quoted, backslash escapes), `filename=value`
/// and `filename*=UTF-8''percent-encoded` (RFC 5987). When both are present,
/// `filename*` wins.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut from_token: Option<String> = None;

    for param in header_value.trim().split(';') {
        let Some((name, value)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "filename*" {
            let encoded = value
                .get(..7)
                .filter(|charset| charset.eq_ignore_ascii_case("utf-8''"))
                .map(|_| &value[7..]);
            if let Some(encoded) = encoded {
                let decoded = percent_decode(encoded);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if name == "filename" {
            let unquoted = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                unescape_quoted(&value[1..value.len() - 1])
            } else {
                value.to_string()
            };
            if !unquoted.is_empty() {
                from_token = Some(unquoted);
            }
        }
    }

    from_token
}

/// True when a Content-Disposition points at a directory listing.
pub fn is_directory_listing(header_value: &str, filename: Option<&str>) -> bool {
    match filename {
        Some(name) => name.to_ascii_lowercase().contains(DIRECTORY_LISTING_NAME),
        None => header_value.contains(DIRECTORY_LISTING_NAME),
    }
}

fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
