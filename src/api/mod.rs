pub mod routes;

use crate::error::AppError;
use crate::service::{
    content_length, delete::delete_handler, options::options_handler, proxy::proxy_handler,
    read::get_or_head_handler, tagging, write::post_handler,
};
use crate::utils::state::AppState;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, SERVER,
};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use routes::{Handler, Resolved, Route, RouteTable};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

pub const SERVER_NAME: &str = concat!("filer-gate ", env!("CARGO_PKG_VERSION"));

/// Every path is served by one dispatcher, so the router has no routes of its
/// own, only a fallback.
pub fn create_router(state: Arc<AppState>, read_only: bool) -> Router {
    let table = RouteTable::new(read_only);
    Router::new()
        .fallback(move |State(state): State<Arc<AppState>>, request: Request| async move {
            dispatch(state, table, request).await
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(state: Arc<AppState>, table: RouteTable, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let route = match table.resolve(&method, request.uri()) {
        Resolved::Proxy(id) => {
            let response = proxy_handler(&state, &id, request).await.into_response();
            tracing::info!(
                "proxy {} -> {} in {:?}",
                id,
                response.status(),
                start.elapsed()
            );
            return response;
        }
        Resolved::Route(route) => Some(route),
        Resolved::MethodNotAllowed => None,
    };

    let has_origin = request.headers().contains_key(ORIGIN);
    let (label, mut response) = match route {
        Some(route) => (
            route_label(&route),
            run(&state, &table, route, request).await.into_response(),
        ),
        None => ("unsupported", AppError::MethodNotAllowed.into_response()),
    };

    let headers = response.headers_mut();
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    if has_origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }

    tracing::info!(
        "{} {} {} -> {} in {:?}",
        label,
        method,
        path,
        response.status(),
        start.elapsed()
    );
    response
}

async fn run(
    state: &AppState,
    table: &RouteTable,
    route: Route,
    request: Request,
) -> Result<Response, AppError> {
    let cancel = state.request_token();
    // held until the handler has finished, whichever way it exits. A body
    // of unknown length is charged one chunk, the most it buffers at once.
    let _permit = if route.admission {
        let n = content_length(request.headers())
            .unwrap_or(state.config.max_chunk_size as u64);
        Some(state.admission.acquire(n, &cancel).await?)
    } else {
        None
    };

    match route.handler {
        Handler::GetOrHead => get_or_head_handler(state, request, &cancel).await,
        Handler::Post => post_handler(state, request).await,
        Handler::PutTagging => tagging::put_tagging_handler(state, request).await,
        Handler::DeleteTagging => tagging::delete_tagging_handler(state, request).await,
        Handler::Delete => delete_handler(state, request).await,
        Handler::Options => Ok(options_handler(table)),
    }
}

fn route_label(route: &Route) -> &'static str {
    match route.handler {
        Handler::GetOrHead => "read",
        Handler::Post => "write",
        Handler::PutTagging => "put_tagging",
        Handler::DeleteTagging => "delete_tagging",
        Handler::Delete => "delete",
        Handler::Options => "options",
    }
}
