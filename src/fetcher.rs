//! Chunked proxy fetcher.
//!
//! A request small enough for one upstream call is forwarded as-is and the
//! upstream body is handed back untouched. Anything larger is split into
//! windows (see [`crate::chunking`]), each window is fetched and parsed, and
//! the points are stitched back together in range order. Any failure aborts
//! the whole fetch; partial results are never returned.

use std::sync::Arc;

use axum::body::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, instrument};

use crate::chunking::{plan_windows, WindowAdvance};
use crate::error::{ProxyError, Result};
use crate::plot::{DataPoint, PlotData, PlotRequest};
use crate::upstream::Upstream;

/// Fraction of a step within which two samples are treated as the same x.
const SAME_SAMPLE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchSettings {
    /// Most points the upstream computes in a single call.
    pub max_points_per_call: usize,
    pub advance: WindowAdvance,
    /// Chunk calls allowed in flight at once; 1 means strictly sequential.
    pub max_in_flight: usize,
    /// Largest request accepted, in points; bigger ones are refused up front.
    pub max_total_points: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            max_points_per_call: 10,
            advance: WindowAdvance::Contiguous,
            max_in_flight: 1,
            max_total_points: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Raw upstream body from the single-call path.
    Passthrough(Bytes),
    /// Stitched result of the chunked path.
    Combined(PlotData),
}

pub struct ChunkedFetcher {
    upstream: Arc<dyn Upstream>,
    settings: FetchSettings,
}

impl ChunkedFetcher {
    pub fn new(upstream: Arc<dyn Upstream>, settings: FetchSettings) -> Self {
        ChunkedFetcher { upstream, settings }
    }

    #[instrument(
        skip(self, req),
        fields(function = %req.function, x_start = req.x_start, x_end = req.x_end, step = req.step)
    )]
    pub async fn fetch(&self, req: &PlotRequest) -> Result<FetchOutcome> {
        req.check()?;

        let total_points = req.total_points();
        if total_points > self.settings.max_total_points as i64 {
            return Err(ProxyError::InvalidRequest(format!(
                "request covers {total_points} points, the limit is {}",
                self.settings.max_total_points
            )));
        }
        if total_points <= self.settings.max_points_per_call as i64 {
            debug!(total_points, "request fits in a single upstream call");
            let body = self.upstream.calculate(req).await?;
            return Ok(FetchOutcome::Passthrough(body));
        }

        info!(total_points, "splitting request into chunks");
        let windows = plan_windows(req, self.settings.max_points_per_call, self.settings.advance);

        let chunks: Vec<Vec<DataPoint>> = stream::iter(
            windows
                .enumerate()
                .map(|(index, w)| self.fetch_chunk(index, req.with_range(w.start, w.end))),
        )
        .buffered(self.settings.max_in_flight.max(1))
        .try_collect()
        .await?;

        let data = stitch(chunks, self.settings.advance, req.step);
        debug!(points = data.len(), "chunks stitched");
        Ok(FetchOutcome::Combined(PlotData { data }))
    }

    async fn fetch_chunk(&self, index: usize, sub: PlotRequest) -> Result<Vec<DataPoint>> {
        let body = self.upstream.calculate(&sub).await?;
        let parsed: PlotData = serde_json::from_slice(&body).map_err(ProxyError::Parse)?;
        debug!(
            chunk = index,
            x_start = sub.x_start,
            x_end = sub.x_end,
            points = parsed.data.len(),
            "chunk received"
        );
        Ok(parsed.data)
    }
}

/// Concatenates chunk results in order. With contiguous windows the first
/// sample of a chunk repeats the last sample of the previous one and is dropped.
fn stitch(chunks: Vec<Vec<DataPoint>>, advance: WindowAdvance, step: f64) -> Vec<DataPoint> {
    let mut out: Vec<DataPoint> = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
    for chunk in chunks {
        let skip = match (advance, out.last()) {
            (WindowAdvance::Contiguous, Some(last)) => {
                let threshold = last.x + step * SAME_SAMPLE_TOLERANCE;
                chunk.iter().take_while(|p| p.x <= threshold).count()
            }
            _ => 0,
        };
        out.extend(chunk.into_iter().skip(skip));
    }
    out
}
