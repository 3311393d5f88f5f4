//! Server configuration: defaults, an optional TOML file, then CLI flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::chunking::WindowAdvance;
use crate::error::{ProxyError, Result};
use crate::fetcher::FetchSettings;
use crate::upstream::DEFAULT_UPSTREAM_URL;

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Plotting front-end that chunks requests to a calculation API")]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Calculation API endpoint
    #[arg(long)]
    pub upstream_url: Option<String>,

    /// Most points the upstream computes per call
    #[arg(long)]
    pub max_points: Option<usize>,

    /// Chunk calls allowed in flight at once
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Largest request accepted, in points
    #[arg(long)]
    pub max_total_points: Option<usize>,

    /// How consecutive chunks are laid out
    #[arg(long, value_enum)]
    pub window_advance: Option<WindowAdvance>,

    /// Directory served under /static
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Timeout for each upstream call, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log level or filter directive
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub upstream_url: String,
    pub max_points_per_call: usize,
    pub max_in_flight: usize,
    pub max_total_points: usize,
    pub window_advance: WindowAdvance,
    pub static_dir: PathBuf,
    pub upstream_timeout_secs: Option<u64>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            max_points_per_call: 10,
            max_in_flight: 1,
            max_total_points: 100_000,
            window_advance: WindowAdvance::Contiguous,
            static_dir: PathBuf::from("static"),
            upstream_timeout_secs: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ProxyError::Config(format!("{}: {e}", path.display())))
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(bind) = &args.bind {
            self.bind = bind.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(url) = &args.upstream_url {
            self.upstream_url = url.clone();
        }
        if let Some(max_points) = args.max_points {
            self.max_points_per_call = max_points;
        }
        if let Some(max_in_flight) = args.max_in_flight {
            self.max_in_flight = max_in_flight;
        }
        if let Some(max_total_points) = args.max_total_points {
            self.max_total_points = max_total_points;
        }
        if let Some(advance) = args.window_advance {
            self.window_advance = advance;
        }
        if let Some(dir) = &args.static_dir {
            self.static_dir = dir.clone();
        }
        if let Some(secs) = args.timeout_secs {
            self.upstream_timeout_secs = Some(secs);
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        if args.log_json {
            self.log_json = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_points_per_call < 2 {
            return Err(ProxyError::Config(format!(
                "max_points_per_call must be at least 2, got {}",
                self.max_points_per_call
            )));
        }
        if self.max_in_flight == 0 {
            return Err(ProxyError::Config("max_in_flight must be at least 1".to_string()));
        }
        if self.max_total_points < self.max_points_per_call {
            return Err(ProxyError::Config(format!(
                "max_total_points ({}) must be at least max_points_per_call ({})",
                self.max_total_points, self.max_points_per_call
            )));
        }
        if self.upstream_timeout_secs == Some(0) {
            return Err(ProxyError::Config("upstream_timeout_secs must be positive".to_string()));
        }
        let url = url::Url::parse(&self.upstream_url)
            .map_err(|e| ProxyError::Config(format!("invalid upstream_url {:?}: {e}", self.upstream_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::Config(format!(
                "upstream_url must be http or https, got {}",
                url.scheme()
            )));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| ProxyError::Config(format!("invalid bind address {}: {e}", self.bind)))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            max_points_per_call: self.max_points_per_call,
            advance: self.window_advance,
            max_in_flight: self.max_in_flight,
            max_total_points: self.max_total_points,
        }
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }
}
