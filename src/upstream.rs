//! The remote calculation service.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{ProxyError, Result};
use crate::plot::PlotRequest;

pub const DEFAULT_UPSTREAM_URL: &str = "https://iunderstanditnow.pythonanywhere.com/calculate";

/// Something that evaluates a function over a range and answers with a
/// `{"data": [...]}` JSON body.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Returns the raw response body of a successful (200) call.
    async fn calculate(&self, req: &PlotRequest) -> Result<Bytes>;
}

#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    url: String,
}

impl HttpUpstream {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ProxyError::Transport)?;
        Ok(HttpUpstream {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn calculate(&self, req: &PlotRequest) -> Result<Bytes> {
        let payload = serde_json::to_vec(req).map_err(ProxyError::Serialize)?;
        debug!(url = %self.url, x_start = req.x_start, x_end = req.x_end, "calling upstream");

        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(ProxyError::Transport)?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        resp.bytes().await.map_err(ProxyError::Transport)
    }
}
