//! GET and HEAD.
//!
//! A file whose bytes live only in a remote mount is hydrated first; the
//! request fails rather than serve it empty.

use super::request_path;
use crate::domain::{Entry, FullPath};
use crate::error::AppError;
use crate::remote::{RemoteError, to_remote_location};
use crate::storage::entry_stream;
use crate::utils::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
pub struct ListedEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub remote_only: bool,
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub path: FullPath,
    pub entries: Vec<ListedEntry>,
}

pub async fn get_or_head_handler(
    state: &AppState,
    request: Request,
    cancel: &CancellationToken,
) -> Result<Response, AppError> {
    let is_head = request.method() == Method::HEAD;
    let path = request_path(request.uri());
    let entry = state
        .meta
        .find_entry(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(path.to_string()))?;

    if entry.is_directory {
        return list_directory(state, &path, is_head).await;
    }

    let entry = if entry.is_remote_only() {
        hydrate(state, &path, entry, cancel).await?
    } else {
        entry
    };

    let mut headers = HeaderMap::new();
    let mime = if entry.attributes.mime.is_empty() {
        "application/octet-stream"
    } else {
        entry.attributes.mime.as_str()
    };
    if let Ok(v) = HeaderValue::from_str(mime) {
        headers.insert(CONTENT_TYPE, v);
    }
    let last_modified = entry
        .attributes
        .mtime
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(v) = HeaderValue::from_str(&last_modified) {
        headers.insert(LAST_MODIFIED, v);
    }
    for (key, value) in entry.tags() {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!("skip tag {} of {}: not a valid header", key, path),
        }
    }

    if is_head {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(entry.file_size()));
        return Ok((StatusCode::OK, headers).into_response());
    }

    // chunks are read one at a time as the client consumes the body
    headers.insert(CONTENT_LENGTH, HeaderValue::from(entry.file_size()));
    let body = Body::from_stream(entry_stream(state.chunks.clone(), &entry));
    Ok((StatusCode::OK, headers, body).into_response())
}

async fn list_directory(
    state: &AppState,
    path: &FullPath,
    is_head: bool,
) -> Result<Response, AppError> {
    if is_head {
        return Ok(StatusCode::OK.into_response());
    }
    let entries = state
        .meta
        .list_entries(path)
        .await?
        .into_iter()
        .map(|e| ListedEntry {
            size: if e.is_directory { 0 } else { e.file_size() },
            remote_only: e.is_remote_only(),
            mtime: e.attributes.mtime,
            is_directory: e.is_directory,
            name: e.name,
        })
        .collect();
    Ok(Json(Listing {
        path: path.clone(),
        entries,
    })
    .into_response())
}

/// Brings the bytes of a remote-only entry into local chunks and returns
/// the refreshed entry.
async fn hydrate(
    state: &AppState,
    path: &FullPath,
    entry: Entry,
    cancel: &CancellationToken,
) -> Result<Entry, AppError> {
    let table = state.mounts.snapshot();
    let mapping = table
        .find(path)
        .ok_or_else(|| RemoteError::NotMounted(path.to_string()))?;
    let storage = &mapping.remote_mounted_location.name;
    let conf = table
        .conf(storage)
        .ok_or_else(|| RemoteError::UnknownStorage(storage.clone()))?;
    let location = to_remote_location(
        &mapping.local_mounted_dir,
        &mapping.remote_mounted_location,
        path,
    )?;

    state
        .hydrator
        .hydrate(conf, location, path.parent(), entry, cancel)
        .await?;

    let refreshed = state
        .meta
        .find_entry(path)
        .await?
        .ok_or_else(|| AppError::NotFound(path.to_string()))?;
    if refreshed.is_remote_only() {
        return Err(RemoteError::Incomplete(path.to_string()).into());
    }
    Ok(refreshed)
}
