use crate::admission::AdmissionError;
use crate::remote::{InvalidMountPath, RemoteError};
use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}: directory is not empty")]
    DirectoryNotEmpty(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    #[error("{0} kept changing, try again")]
    Conflict(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("volume server is not configured")]
    ProxyUnavailable,

    #[error("proxy error: {0}")]
    Proxy(#[from] reqwest::Error),

    #[error(transparent)]
    InvalidMountPath(#[from] InvalidMountPath),

    #[error("hydration failed: {0}")]
    HydrationFailed(#[from] RemoteError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::DirectoryNotEmpty(_) | Self::IsADirectory(_) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ProxyUnavailable | Self::Proxy(_) => StatusCode::BAD_GATEWAY,
            Self::HydrationFailed(RemoteError::InvalidMountPath(_)) | Self::InvalidMountPath(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::HydrationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Admission(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                io::ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                io::ErrorKind::DirectoryNotEmpty
                | io::ErrorKind::IsADirectory
                | io::ErrorKind::NotADirectory
                | io::ErrorKind::AlreadyExists => StatusCode::CONFLICT,
                io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Generating response for AppError: {:?}", self);
        } else {
            tracing::debug!("Generating response for AppError: {:?}", self);
        }

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if let Self::Admission(_) = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
