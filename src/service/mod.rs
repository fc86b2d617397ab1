//! Request handlers behind the dispatcher.
pub mod delete;
pub mod options;
pub mod proxy;
pub mod read;
pub mod tagging;
pub mod write;

use crate::domain::{FullPath, TAG_PREFIX};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Uri};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Declared body size, if the header is present and parses.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// The request path with percent-escapes decoded, before normalization.
pub fn decoded_path(uri: &Uri) -> Cow<'_, str> {
    percent_decode_str(uri.path()).decode_utf8_lossy()
}

pub fn request_path(uri: &Uri) -> FullPath {
    FullPath::new(&decoded_path(uri))
}

/// Extended attribute key of the tag `name`, with or without the prefix.
/// Header names arrive lowercased, so tag names are compared that way too.
pub fn tag_key(name: &str) -> String {
    let suffix = match name.get(..TAG_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(TAG_PREFIX) => &name[TAG_PREFIX.len()..],
        _ => name,
    };
    format!("{TAG_PREFIX}{}", suffix.to_ascii_lowercase())
}

/// `Seaweed-*` request headers as extended attribute pairs, keyed in
/// canonical `Seaweed-<name>` form.
pub fn tag_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let prefix = TAG_PREFIX.to_ascii_lowercase();
    headers
        .iter()
        .filter_map(|(name, value)| {
            let suffix = name.as_str().strip_prefix(prefix.as_str())?;
            if suffix.is_empty() {
                return None;
            }
            let value = value.to_str().ok()?;
            Some((tag_key(suffix), value.to_string()))
        })
        .collect()
}
