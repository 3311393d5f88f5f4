use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use plotproxy::config::{Args, Config};
use plotproxy::fetcher::ChunkedFetcher;
use plotproxy::logging::init_logging;
use plotproxy::server::{app, log_routes, AppState};
use plotproxy::upstream::HttpUpstream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args).context("loading configuration")?;
    init_logging(&config).map_err(|e| anyhow::anyhow!("initialising logging: {e}"))?;

    let upstream = HttpUpstream::new(config.upstream_url.clone(), config.upstream_timeout())?;
    let settings = config.fetch_settings();
    info!(
        upstream = upstream.url(),
        max_points_per_call = settings.max_points_per_call,
        max_in_flight = settings.max_in_flight,
        advance = ?settings.advance,
        "upstream configured"
    );

    let state = AppState {
        fetcher: Arc::new(ChunkedFetcher::new(Arc::new(upstream), settings)),
        static_dir: config.static_dir.clone(),
    };
    log_routes(&state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Serving on http://{addr}");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
