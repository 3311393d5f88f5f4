use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// A function to sample over `[x_start, x_end]` every `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    pub function: String,
    pub x_start: f64,
    pub x_end: f64,
    pub step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// The `{"data": [...]}` envelope used by the upstream and by chunked responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub data: Vec<DataPoint>,
}

impl PlotRequest {
    pub fn new(function: impl Into<String>, x_start: f64, x_end: f64, step: f64) -> Self {
        PlotRequest {
            function: function.into(),
            x_start,
            x_end,
            step,
        }
    }

    /// Number of samples the upstream would produce for this request in one call.
    pub fn total_points(&self) -> i64 {
        (((self.x_end - self.x_start) / self.step).floor() as i64).saturating_add(1)
    }

    /// Same function and step over a different range.
    pub fn with_range(&self, x_start: f64, x_end: f64) -> Self {
        PlotRequest {
            function: self.function.clone(),
            x_start,
            x_end,
            step: self.step,
        }
    }

    /// Rejects inputs that would never terminate the window loop.
    pub fn check(&self) -> Result<()> {
        if !self.x_start.is_finite() || !self.x_end.is_finite() {
            return Err(ProxyError::InvalidRequest(format!(
                "range bounds must be finite (x_start={}, x_end={})",
                self.x_start, self.x_end
            )));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(ProxyError::InvalidRequest(format!(
                "step must be a positive number, got {}",
                self.step
            )));
        }
        Ok(())
    }
}
