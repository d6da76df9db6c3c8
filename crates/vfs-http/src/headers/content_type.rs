//! Text vs binary classification of `Content-Type` values.

/// How a rule matches a lowercased media type (parameters stripped).
enum MediaMatch {
    Prefix(&'static str),
    Exact(&'static str),
    Suffix(&'static str),
}

impl MediaMatch {
    fn matches(&self, essence: &str) -> bool {
        match self {
            MediaMatch::Prefix(p) => essence.starts_with(p),
            MediaMatch::Exact(e) => essence == *e,
            MediaMatch::Suffix(s) => essence.ends_with(s),
        }
    }
}

/// Media types treated as text, checked in order.
const TEXT_TYPES: &[MediaMatch] = &[
    MediaMatch::Prefix("text/"),
    MediaMatch::Exact("application/json"),
    MediaMatch::Exact("application/xml"),
    MediaMatch::Exact("application/javascript"),
    MediaMatch::Exact("application/x-www-form-urlencoded"),
    MediaMatch::Suffix("+json"),
    MediaMatch::Suffix("+xml"),
];

/// True if a `Content-Type` value names a textual media type.
pub fn is_text_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    !essence.is_empty() && TEXT_TYPES.iter().any(|m| m.matches(&essence))
}
