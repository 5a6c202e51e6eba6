//! rift-stubs: declarative HTTP stub server.
//!
//! Usage:
//!   rift-stubs --data stubs.yaml [--stubs-port 8882] [--admin-port 8889] [--watch]

use anyhow::Context;
use clap::Parser;
use rift_stubs::admin_api::{AdminApiServer, AdminState};
use rift_stubs::portal::PortalServer;
use rift_stubs::watcher::ConfigWatcher;
use rift_stubs::{StubRepository, StubsConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Declarative HTTP stub server
#[derive(Parser, Debug)]
#[command(name = "rift-stubs")]
#[command(author, version, about = "Serve stubbed HTTP responses declared in YAML")]
struct Args {
    /// YAML file declaring stubs and proxy configs
    #[arg(short, long, env = "RIFT_STUBS_DATA")]
    data: Option<PathBuf>,

    /// Port of the stubs portal
    #[arg(short, long, env = "RIFT_STUBS_PORT", default_value = "8882")]
    stubs_port: u16,

    /// Port of the admin API
    #[arg(short, long, env = "RIFT_STUBS_ADMIN_PORT", default_value = "8889")]
    admin_port: u16,

    /// Address both listeners bind to
    #[arg(short, long, env = "RIFT_STUBS_LOCATION", default_value = "0.0.0.0")]
    location: IpAddr,

    /// Reload the configuration when its files change
    #[arg(short, long)]
    watch: bool,

    /// Poll interval of the file watcher
    #[arg(long, default_value = "1000")]
    watch_interval_ms: u64,

    /// Do not start the admin API
    #[arg(long)]
    disable_admin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rift_stubs=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.data {
        Some(path) => StubsConfig::from_file(path)
            .with_context(|| format!("Failed to load stubs from {}", path.display()))?,
        None => {
            info!("No --data file given, starting with an empty stub list");
            StubsConfig::default()
        }
    };
    let sources = config.sources.clone();

    let repository = Arc::new(StubRepository::new());
    config.install(&repository);

    let base_dir = args
        .data
        .as_ref()
        .and_then(|path| path.parent())
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if !args.disable_admin {
        let addr = SocketAddr::new(args.location, args.admin_port);
        let state = Arc::new(AdminState::new(Arc::clone(&repository), base_dir));
        tokio::spawn(async move {
            if let Err(e) = AdminApiServer::new(addr, state).run().await {
                error!("Admin API stopped: {:#}", e);
            }
        });
    }

    if args.watch {
        match &args.data {
            Some(path) => {
                let watcher = ConfigWatcher::new(
                    path.clone(),
                    &sources,
                    Arc::clone(&repository),
                    Duration::from_millis(args.watch_interval_ms.max(1)),
                );
                tokio::spawn(watcher.run());
            }
            None => info!("--watch ignored without --data"),
        }
    }

    let portal = PortalServer::new(SocketAddr::new(args.location, args.stubs_port), repository);
    tokio::select! {
        result = portal.run() => result.context("Stubs portal stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
