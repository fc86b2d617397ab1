use crate::error::AppError;
use crate::utils::state::AppState;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONNECTION, HOST, TRANSFER_ENCODING};
use axum::response::{IntoResponse, Response};

/// Forwards `/?proxyChunkId=<id>` to the volume server as `{url}/{id}`,
/// streaming both bodies.
pub async fn proxy_handler(state: &AppState, id: &str, request: Request) -> Result<Response, AppError> {
    let base = state
        .config
        .volume_server_url
        .as_deref()
        .ok_or(AppError::ProxyUnavailable)?;
    let url = format!("{}/{}", base.trim_end_matches('/'), id);
    tracing::debug!("proxy chunk {} to {}", id, url);

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    headers.remove(HOST);
    let upstream = state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    response_headers.remove(CONNECTION);
    response_headers.remove(TRANSFER_ENCODING);
    let body = Body::from_stream(upstream.bytes_stream());
    Ok((status, response_headers, body).into_response())
}
