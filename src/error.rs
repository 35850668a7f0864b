use std::error::Error as _;
use std::fmt::Write as _;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The token endpoint rejected the refresh grant.
    #[error("failed to refresh access token ({status}): {body}")]
    Auth { status: StatusCode, body: String },

    /// The drive API rejected a find/list/metadata call.
    #[error("{operation} failed ({status}): {body}")]
    Query {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{operation} request could not be completed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned an unreadable response")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("request path is not valid UTF-8 after decoding")]
    InvalidPath(#[source] std::str::Utf8Error),
}

impl AppError {
    pub(crate) fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { operation, source }
    }

    pub(crate) fn decode(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Decode { operation, source }
    }

    /// Plain-text diagnostic: the message followed by every underlying cause.
    fn diagnostic(&self) -> String {
        let mut out = format!("Worker error: {self}");
        let mut source = self.source();
        if source.is_some() {
            out.push_str("\n\nCaused by:");
        }
        while let Some(cause) = source {
            let _ = write!(out, "\n    {cause}");
            source = cause.source();
        }
        out
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            AppError::Config(err) => {
                tracing::warn!("configuration incomplete");
                err.to_string()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                other.diagnostic()
            }
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
