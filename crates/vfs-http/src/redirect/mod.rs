//! Redirect handling: `Location` rewriting and the open/redirect loop.

mod resolver;

/// Statuses that trigger another hop.
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303)
}

/// Terminal statuses that count as a successful open.
pub fn is_open_success(status: u16) -> bool {
    matches!(status, 200 | 206 | 301)
}

/// Resolves a `Location` value against the current URL.
///
/// Precedence: a value starting with a scheme (`http://...`) replaces the
/// URL; a value starting with `/` replaces path and query on the current
/// origin; anything else is appended to the current URL as-is.
pub fn resolve_location(current: &str, location: &str) -> String {
    if has_scheme(location) {
        return location.to_string();
    }
    if location.starts_with('/') {
        return match url::Url::parse(current) {
            Ok(base) if base.has_host() => {
                format!("{}{}", base.origin().ascii_serialization(), location)
            }
            _ => {
                tracing::warn!("cannot take origin of {:?}; appending {}", current, location);
                format!("{}{}", current, location)
            }
        };
    }
    format!("{}{}", current, location)
}

/// True for `scheme://...` where scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
fn has_scheme(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
