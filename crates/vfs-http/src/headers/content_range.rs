//! `Content-Range` parsing.

/// Total resource length from a `Content-Range` value
/// (`bytes 500-999/1000` or `bytes */1000`). `None` when the total is `*`
/// or the value is malformed.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim();
    let rest = rest
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes "))
        .map(|_| &rest[6..])?;
    let (_, total) = rest.trim().split_once('/')?;
    total.trim().parse::<u64>().ok()
}
