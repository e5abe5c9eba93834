use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::signature::SignatureError;

/// Startup failures. These are fatal: the server never starts listening.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Config defines no endpoints")]
    NoEndpoints,

    #[error("Invalid endpoint '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(path: &str, reason: &str) -> Self {
        Self::Invalid {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Reasons an inbound webhook request is turned away.
#[derive(Debug, thiserror::Error)]
pub enum RejectError {
    #[error("unsupported method")]
    MethodNotAllowed,

    #[error("unsupported event type")]
    UnsupportedEvent(Option<String>),

    #[error("unsupported content type")]
    UnsupportedMediaType,

    #[error("payload too large or unreadable")]
    UnreadableBody(#[source] axum::Error),

    #[error("malformed json")]
    MalformedJson(#[source] serde_json::Error),

    #[error("{0}")]
    Signature(#[from] SignatureError),

    #[error("repository mismatch")]
    RepositoryMismatch { got: String, want: String },

    #[error("spillover")]
    Spillover,

    #[error("job queue closed")]
    QueueClosed,
}

impl RejectError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RejectError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RejectError::UnsupportedEvent(_) => StatusCode::BAD_REQUEST,
            RejectError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RejectError::UnreadableBody(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RejectError::MalformedJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RejectError::Signature(SignatureError::Malformed) => StatusCode::FORBIDDEN,
            RejectError::Signature(SignatureError::Mismatch) => StatusCode::PRECONDITION_FAILED,
            RejectError::RepositoryMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            RejectError::Spillover | RejectError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for RejectError {
    fn into_response(self) -> Response {
        (self.status_code(), format!("{}\n", self)).into_response()
    }
}

/// Failures while running a resolved command. Logged, never returned to a client.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to start: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed waiting for process: {0}")]
    Wait(#[source] io::Error),

    #[error("exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}
