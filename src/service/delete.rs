use super::request_path;
use crate::api::routes::query_params;
use crate::error::AppError;
use crate::storage::delete_chunks;
use crate::utils::state::AppState;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;

/// DELETE /<path>[?recursive=true]
pub async fn delete_handler(state: &AppState, request: Request) -> Result<Response, AppError> {
    let path = request_path(request.uri());
    let recursive = query_params(request.uri())
        .get("recursive")
        .is_some_and(|v| v == "true");

    let removed = state
        .meta
        .delete_entry(&path, recursive)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(path.to_string()),
            io::ErrorKind::DirectoryNotEmpty => AppError::DirectoryNotEmpty(path.to_string()),
            _ => AppError::Io(e),
        })?;

    for entry in removed.iter().filter(|e| !e.is_directory) {
        delete_chunks(state.chunks.as_ref(), &entry.chunks).await;
    }
    tracing::debug!("deleted {} ({} entries)", path, removed.len());
    Ok(StatusCode::NO_CONTENT.into_response())
}
