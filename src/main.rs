//! banme: a reverse proxy that bans clients probing for missing paths.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                        BANME                          │
//!   Client        │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐  │
//!   ──────────────┼─▶│  admit   │──▶│ instrument   │──▶│   upstream   │──┼──▶ Backend
//!                 │  │ (bans)   │   │ route/gauge  │   │   client     │  │    (child
//!   ◀─────────────┼──│  403     │   │ histograms   │◀──│              │◀─┼─── process)
//!                 │  └──────────┘   └──────┬───────┘   └──────────────┘  │
//!                 │                        │                             │
//!                 │                        ▼                             │
//!                 │            ┌────────────────────────┐                │
//!                 │            │ {prefix}/api/info      │                │
//!                 │            │ {prefix}/api/unban     │                │
//!                 │            └────────────────────────┘                │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use banme::config::{apply_env, finalize, load_config, ProxyConfig};
use banme::http::HttpServer;
use banme::lifecycle::{signals, BackendProcess, Shutdown};
use banme::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "banme")]
#[command(about = "Reverse proxy that bans IPs hitting too many 404s", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8000.
    #[arg(long)]
    bind: Option<String>,

    /// Backend base URL.
    #[arg(long)]
    backend_url: Option<String>,

    /// Disable the ban functionality just to audit the behaviour.
    #[arg(long)]
    disable_ban: bool,

    /// Number of 404 responses before an IP is banned.
    #[arg(long)]
    hit_404_threshold: Option<u64>,

    /// How long a ban lasts.
    #[arg(long)]
    ban_duration_in_minutes: Option<u64>,

    /// Rewrite the Host header to the backend's authority.
    #[arg(long)]
    modify_host: bool,

    /// Size of the recent-request log.
    #[arg(long)]
    recent_capacity: Option<usize>,

    /// Backend command to launch, after `--`.
    #[arg(last = true)]
    command: Vec<String>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(url) = &self.backend_url {
            config.backend.url = url.clone();
        }
        if self.disable_ban {
            config.ban.enabled = false;
        }
        if let Some(threshold) = self.hit_404_threshold {
            config.ban.hit_404_threshold = threshold;
        }
        if let Some(minutes) = self.ban_duration_in_minutes {
            config.ban.duration_secs = minutes.saturating_mul(60);
        }
        if self.modify_host {
            config.backend.modify_host = true;
        }
        if let Some(capacity) = self.recent_capacity {
            config.stats.recent_capacity = capacity;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok());
    cli.apply(&mut config);
    let config = finalize(config)?;

    logging::init_logging(&config.observability);
    tracing::info!("banme v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.url,
        ban_enabled = config.ban.enabled,
        hit_404_threshold = config.ban.hit_404_threshold,
        ban_duration_secs = config.ban.duration_secs,
        modify_host = config.backend.modify_host,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let child = if cli.command.is_empty() {
        None
    } else {
        let process = BackendProcess::spawn(&cli.command)?;
        Some(tokio::spawn(process.supervise(shutdown.clone())))
    };
    tokio::spawn(signals::forward_signals(shutdown.clone()));

    let result = server.run(listener, server_shutdown).await;
    shutdown.trigger();

    if let Some(child) = child {
        if let Ok(Some(status)) = child.await {
            if !status.success() {
                tracing::warn!(%status, "Backend process exited unsuccessfully");
            }
        }
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
