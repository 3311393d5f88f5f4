//! HTTP front-end for a remote function-plotting API.
//!
//! The upstream computes a limited number of points per call, so large plot
//! requests are split into windows, fetched one after another (or with bounded
//! concurrency), and stitched back into one `{"data": [...]}` response.

pub mod chunking;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod plot;
pub mod presets;
pub mod server;
pub mod upstream;

pub use error::{ProxyError, Result};
