use crate::api::routes::RouteTable;
use axum::http::header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// CORS preflight.
pub fn options_handler(table: &RouteTable) -> Response {
    (
        StatusCode::OK,
        [
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(table.allow_methods()),
            ),
            (ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*")),
        ],
    )
        .into_response()
}
