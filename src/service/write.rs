use super::{decoded_path, request_path, tag_headers};
use crate::domain::Entry;
use crate::error::AppError;
use crate::storage::{PendingChunks, delete_chunks};
use crate::utils::state::AppState;
use axum::Json;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use serde::Serialize;
use std::io;
use tokio_util::io::StreamReader;

#[derive(Debug, Serialize)]
pub struct WriteResult {
    pub name: String,
    pub size: u64,
}

/// PUT or POST /<path>: stores the body as the file at `path`, replacing any
/// previous content.
pub async fn post_handler(state: &AppState, request: Request) -> Result<Response, AppError> {
    let raw = decoded_path(request.uri()).into_owned();
    if raw.ends_with('/') {
        return Err(AppError::InvalidPath(format!("{raw}: file name is required")));
    }
    let path = request_path(request.uri());

    if let Some(existing) = state.meta.find_entry(&path).await? {
        if existing.is_directory {
            return Err(AppError::IsADirectory(path.to_string()));
        }
    }

    let mime = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let tags = tag_headers(request.headers());

    // Convert the body into an `AsyncRead` and cut it into chunks as it arrives.
    let body = request.into_body().into_data_stream().map_err(io::Error::other);
    let body_reader = StreamReader::new(body);
    futures::pin_mut!(body_reader);
    let mut pending = PendingChunks::new(state.chunks.clone());
    let size = pending
        .fill_from(body_reader, state.config.max_chunk_size)
        .await?;

    let mut entry = Entry::new_file(path.name(), pending.chunks().to_vec());
    entry.attributes.mime = mime;
    entry.extended.extend(tags);

    let replaced = match state.meta.insert_entry(&path, entry).await {
        Ok(replaced) => replaced,
        Err(e) => {
            pending.discard().await;
            return Err(e.into());
        }
    };
    let chunks = pending.commit();
    if let Some(old) = replaced {
        delete_chunks(state.chunks.as_ref(), &old.chunks).await;
    }
    tracing::debug!("stored {} ({} bytes, {} chunks)", path, size, chunks.len());

    Ok((
        StatusCode::CREATED,
        Json(WriteResult {
            name: path.name().to_string(),
            size,
        }),
    )
        .into_response())
}
