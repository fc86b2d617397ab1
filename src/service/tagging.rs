use super::{request_path, tag_headers, tag_key};
use crate::api::routes::{TAGGING_MARKER, query_params};
use crate::domain::{Entry, FullPath, TAG_PREFIX};
use crate::error::AppError;
use crate::utils::state::AppState;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

const MAX_TAGGING_ATTEMPTS: usize = 8;

/// PUT /<path>?tagging: copies `Seaweed-*` request headers onto the entry.
pub async fn put_tagging_handler(state: &AppState, request: Request) -> Result<Response, AppError> {
    let path = request_path(request.uri());
    let tags = tag_headers(request.headers());
    tracing::debug!("set {} tags on {}", tags.len(), path);
    edit_entry(state, &path, |entry| {
        entry.extended.extend(tags.iter().cloned());
    })
    .await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

/// DELETE /<path>?tagging[=k1,k2]: removes the named tags, or every tag
/// when none is named.
pub async fn delete_tagging_handler(
    state: &AppState,
    request: Request,
) -> Result<Response, AppError> {
    let path = request_path(request.uri());
    let names: Vec<String> = query_params(request.uri())
        .get(TAGGING_MARKER)
        .map(String::as_str)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(tag_key)
        .collect();

    edit_entry(state, &path, |entry| {
        if names.is_empty() {
            entry.extended.retain(|k, _| !k.starts_with(TAG_PREFIX));
        } else {
            for name in &names {
                entry.extended.remove(name);
            }
        }
    })
    .await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

/// Applies `edit` to the current entry and stores the result, starting over
/// when something else changed the entry in between.
async fn edit_entry<F>(state: &AppState, path: &FullPath, edit: F) -> Result<(), AppError>
where
    F: Fn(&mut Entry),
{
    for _ in 0..MAX_TAGGING_ATTEMPTS {
        let current = state
            .meta
            .find_entry(path)
            .await?
            .ok_or_else(|| AppError::NotFound(path.to_string()))?;
        let mut edited = current.clone();
        edit(&mut edited);
        if state.meta.compare_and_swap(path, &current, edited).await? {
            return Ok(());
        }
        tracing::debug!("{} changed while tagging, retrying", path);
    }
    Err(AppError::Conflict(path.to_string()))
}
