//! Error type shared by the fetcher, the upstream client and the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The plot request cannot be chunked (zero or negative step, NaN bounds).
    #[error("invalid plot request: {0}")]
    InvalidRequest(String),

    #[error("failed to serialize upstream payload: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Request construction or transport failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("failed to parse upstream response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("function preset not found: {0}")]
    PresetNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PresetNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::Serialize(_)
            | ProxyError::Transport(_)
            | ProxyError::UpstreamStatus { .. }
            | ProxyError::Parse(_)
            | ProxyError::Config(_)
            | ProxyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
