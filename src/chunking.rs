//! Splitting a plot range into windows the upstream will accept in one call.

use serde::Deserialize;

use crate::plot::PlotRequest;

/// Fraction of a step under which a trailing window is considered float noise.
const TAIL_TOLERANCE: f64 = 1e-9;

/// Where the next window starts relative to the end of the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WindowAdvance {
    /// Next window starts at the previous window's end; the shared sample is
    /// dropped while stitching.
    #[default]
    Contiguous,
    /// Next window starts one step after the previous end. The point at the
    /// very end of the range can be lost.
    SkipStep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

/// Plans the sub-ranges for a request that does not fit in one call.
///
/// Each window spans at most `max_points - 1` steps, so it yields at most
/// `max_points` samples. Bounds are derived from the window index to keep
/// rounding error from accumulating across windows. Windows are produced
/// lazily, one per upstream call. The request must already have passed
/// [`PlotRequest::check`].
pub fn plan_windows(
    req: &PlotRequest,
    max_points: usize,
    advance: WindowAdvance,
) -> impl Iterator<Item = Window> {
    let span = max_points.saturating_sub(1).max(1) as f64 * req.step;
    let stride = match advance {
        WindowAdvance::Contiguous => span,
        WindowAdvance::SkipStep => span + req.step,
    };
    let (x_start, x_end) = (req.x_start, req.x_end);
    let limit = x_end - req.step * TAIL_TOLERANCE;

    (0u64..)
        .map(move |index| (index, x_start + index as f64 * stride))
        .take_while(move |&(_, start)| start < limit)
        .map(move |(index, start)| {
            let end = match advance {
                // Same expression as the next start, so neighbours share the bound exactly.
                WindowAdvance::Contiguous => x_start + (index + 1) as f64 * stride,
                WindowAdvance::SkipStep => start + span,
            }
            .min(x_end);
            Window { start, end }
        })
}
