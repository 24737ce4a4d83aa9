//! coldstartd, the on-demand game server daemon.
//!
//! Single binary that assembles the whole control plane:
//! - cloud provider adapter (Hetzner or DigitalOcean)
//! - RCON liveness probe
//! - lifecycle manager with the periodic idle check
//! - HTTP API
//!
//! # Usage
//!
//! ```text
//! coldstartd --config /etc/coldstart/coldstart.toml
//! ```
//!
//! On the first run the config file is scaffolded with defaults and
//! the process exits with code 2 so the operator can fill it in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use coldstart_cloud::CloudProvider;
use coldstart_config::{Config, ConfigError};
use coldstart_manager::{Manager, ManagerTuning, ServerSpec};
use coldstart_rcon::RconProbe;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "coldstartd", about = "On-demand game server daemon")]
struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = "coldstart.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,coldstartd=debug,coldstart=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load_or_init(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::DefaultWritten(path)) => {
            info!(path, "wrote a default config, fill it in and restart");
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("loading config"),
    };

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("coldstart daemon starting");

    // ── Assemble subsystems ────────────────────────────────────

    let provider = build_provider(&config)?;
    info!(provider = provider.name(), "cloud provider initialized");

    let probe = Arc::new(RconProbe::new(
        config.game.rcon_port,
        config.game.rcon_password.clone(),
    ));
    info!(port = config.game.rcon_port, "rcon probe initialized");

    let spec = ServerSpec {
        name: config.cloud.server_name.clone(),
        machine: config.cloud.server_type.clone(),
        region: config.cloud.region.clone(),
        snapshot: config.cloud.snapshot.clone(),
        ssh_key_fingerprint: config.cloud.ssh_key_fingerprint.clone(),
    };
    let tuning = ManagerTuning {
        check_interval: config.check_interval(),
        shutdown_delay: config.shutdown_delay(),
        ..ManagerTuning::default()
    };
    let manager = Arc::new(Manager::new(provider, probe, spec, tuning));

    // Pick up an instance that survived a previous run.
    manager.bootstrap().await;

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ticker = Arc::clone(&manager);
    let ticker_handle = tokio::spawn(async move {
        ticker.run(shutdown_rx).await;
    });

    // ── API server ─────────────────────────────────────────────

    let router = coldstart_api::build_router(manager, &config.web.allowed_origin)
        .context("web.allowed_origin is not a valid origin")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.web.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = ticker_handle.await;

    info!("coldstart daemon stopped");
    Ok(())
}

/// Map the configured provider name to an adapter. Matching is
/// case-insensitive.
fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn CloudProvider>> {
    let token = config.cloud.token.clone();
    match config.cloud.provider.trim().to_lowercase().as_str() {
        "hetzner" => Ok(Arc::new(coldstart_cloud_hetzner::HetznerProvider::new(
            token,
        ))),
        "digitalocean" => Ok(Arc::new(
            coldstart_cloud_digitalocean::DigitalOceanProvider::new(token),
        )),
        other => anyhow::bail!("unsupported cloud provider '{other}'"),
    }
}
