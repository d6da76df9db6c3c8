//! Ordered header rule table.
//!
//! Rules run top to bottom for every header whose name matches
//! (ASCII case-insensitive). New rules go at the end.

use super::content_disposition::{is_directory_listing, parse_content_disposition_filename};
use super::content_range::parse_content_range_total;
use super::content_type::is_text_content_type;
use crate::client::{RequestContext, ResourceSize};
use crate::redirect::resolve_location;

pub(super) struct HeaderRule {
    pub name: &'static str,
    pub apply: fn(&mut RequestContext, &str),
}

pub(super) const RULES: &[HeaderRule] = &[
    HeaderRule {
        name: "accept-ranges",
        apply: accept_ranges,
    },
    HeaderRule {
        name: "content-type",
        apply: content_type,
    },
    HeaderRule {
        name: "content-disposition",
        apply: content_disposition,
    },
    HeaderRule {
        name: "content-length",
        apply: content_length,
    },
    HeaderRule {
        name: "content-range",
        apply: content_range,
    },
    HeaderRule {
        name: "location",
        apply: location,
    },
    HeaderRule {
        name: "etag",
        apply: etag,
    },
    HeaderRule {
        name: "last-modified",
        apply: last_modified,
    },
    HeaderRule {
        name: "dav",
        apply: dav,
    },
];

fn accept_ranges(ctx: &mut RequestContext, value: &str) {
    ctx.response.range_supported = value.eq_ignore_ascii_case("bytes");
}

fn content_type(ctx: &mut RequestContext, value: &str) {
    ctx.response.is_text = is_text_content_type(value);
    ctx.response.content_type = Some(value.to_string());
}

fn content_disposition(ctx: &mut RequestContext, value: &str) {
    let filename = parse_content_disposition_filename(value);
    if is_directory_listing(value, filename.as_deref()) {
        tracing::debug!("HTTP directory listing at {}", ctx.url);
        ctx.response.is_directory = true;
    }
    if filename.is_some() {
        ctx.response.filename = filename;
    }
}

fn content_length(ctx: &mut RequestContext, value: &str) {
    match value.parse::<u64>() {
        Ok(n) => ctx.size = ResourceSize::Declared(n),
        Err(_) => tracing::warn!("ignoring malformed Content-Length {:?} from {}", value, ctx.url),
    }
}

fn content_range(ctx: &mut RequestContext, value: &str) {
    ctx.response.content_range_total = parse_content_range_total(value);
}

fn location(ctx: &mut RequestContext, value: &str) {
    let next = resolve_location(&ctx.url, value);
    tracing::debug!("{} redirects to {} ({})", ctx.url, next, value);
    ctx.url = next;
    ctx.response.location = Some(value.to_string());
}

fn etag(ctx: &mut RequestContext, value: &str) {
    ctx.response.etag = Some(value.trim_matches('"').to_string());
}

fn last_modified(ctx: &mut RequestContext, value: &str) {
    ctx.response.last_modified = Some(value.to_string());
}

fn dav(ctx: &mut RequestContext, _value: &str) {
    ctx.response.is_webdav = true;
}
