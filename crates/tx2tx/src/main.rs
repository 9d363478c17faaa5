//! tx2tx entry point.
//!
//! One binary, two roles: without `--server` it runs as the server (input
//! capture and forwarding); with `--server HOST:PORT` it runs as a client of
//! that server. Startup failures (config parse, backend init, bind,
//! connect) exit non-zero with a single diagnostic line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tx2tx_core::config::{BackendKind, Config, Overrides};
use tx2tx_core::domain::geometry::Screen;
use tx2tx_server::backend::helper::HelperBackend;
use tx2tx_server::backend::x11::X11Backend;
use tx2tx_server::backend::DisplayBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    X11,
    Wayland,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::X11 => BackendKind::X11,
            BackendArg::Wayland => BackendKind::Wayland,
        }
    }
}

/// Software KVM: drive multiple machines with one keyboard and mouse.
#[derive(Debug, Parser)]
#[command(name = "tx2tx", version, about)]
struct Cli {
    /// Run as a client of the server at HOST:PORT. Without this flag the
    /// process runs as the server.
    #[arg(long, value_name = "HOST:PORT")]
    server: Option<String>,

    /// Client identity; must match a configured client name on the server.
    #[arg(long)]
    name: Option<String>,

    /// Override the server listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the server listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Display backend to use.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Explicit config file path, overriding discovery.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_overrides(&Overrides {
        host: cli.host.clone(),
        port: cli.port,
        backend: cli.backend.map(BackendKind::from),
        server_address: cli.server.clone(),
    });

    init_tracing(&config.logging.level);

    match &cli.server {
        Some(addr) => run_client(&config, addr, cli.name.as_deref()).await,
        None => run_server(&config).await,
    }
}

fn init_tracing(config_level: &str) {
    // RUST_LOG wins over the config file.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(config: &Config) -> anyhow::Result<()> {
    info!(
        backend = ?config.backend.name,
        host = %config.server.host,
        port = config.server.port,
        "starting tx2tx server"
    );
    let backend = build_backend(config).context("initialising display backend")?;
    tx2tx_server::run(config, backend).await.context("running server")?;
    Ok(())
}

async fn run_client(config: &Config, addr: &str, name: Option<&str>) -> anyhow::Result<()> {
    let name = name.unwrap_or("tx2tx-client");
    info!(name, server = addr, "starting tx2tx client");

    let (injector, screen) =
        tx2tx_client::X11Injector::connect(None).context("initialising input injector")?;
    info!(width = screen.width, height = screen.height, "local screen geometry");

    tx2tx_client::run(config, name, Box::new(injector), screen)
        .await
        .context("running client")?;
    Ok(())
}

fn build_backend(config: &Config) -> anyhow::Result<Box<dyn DisplayBackend>> {
    match config.backend.name {
        BackendKind::X11 => {
            let backend = X11Backend::connect(None)?;
            Ok(Box::new(backend))
        }
        BackendKind::Wayland => {
            let wayland = &config.backend.wayland;
            let command = wayland
                .helper_command
                .as_deref()
                .context("backend.wayland.helper_command is required for the wayland backend")?;
            let fallback = match (wayland.screen_width, wayland.screen_height) {
                (Some(width), Some(height)) => Some(Screen::new(width, height)),
                _ => None,
            };
            let backend = HelperBackend::spawn(command, fallback)?;
            Ok(Box::new(backend))
        }
    }
}
