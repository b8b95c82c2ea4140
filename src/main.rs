//! signhook service.
//!
//! Main entry point. Loads configuration, installs tracing and serves the
//! callback endpoint until shutdown. `signhook seal` turns a plaintext
//! credential on stdin into the sealed value the configuration stores.

use std::{io::Read, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signhook::{build_state, default_listeners, seal_credential, Config};
use signhook_core::RealClock;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Dropbox Sign callback verifier and dispatcher
#[derive(Parser, Debug)]
#[command(name = "signhook", version)]
#[command(about = "Verifies Dropbox Sign callbacks and dispatches them to listeners")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve the callback endpoint (the default)
    Serve,
    /// Read a plaintext API key or client id from stdin and print it sealed
    /// with the configured encryption_key
    Seal,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Seal => seal(&config),
    }
}

async fn serve(config: Config) -> Result<()> {
    init_tracing(&config.rust_log);

    info!("Starting signhook Dropbox Sign callback service");
    info!(config = ?config, "Configuration loaded");

    let state = build_state(&config, default_listeners(), Arc::new(RealClock::new()))?;

    if !state.verifier.secret_available().await {
        warn!("No API key configured; every signed callback will be rejected until one is set");
    }

    let addr = config.parse_server_addr()?;
    signhook_api::start_server(state, &config.to_router_config(), addr)
        .await
        .context("Server failed")?;

    info!("signhook shutdown complete");
    Ok(())
}

/// Stdout carries only the sealed value, so tracing stays off here.
fn seal(config: &Config) -> Result<()> {
    let mut plaintext = Zeroizing::new(String::new());
    std::io::stdin().read_to_string(&mut plaintext).context("Failed to read secret from stdin")?;

    println!("{}", seal_credential(config, &plaintext)?);
    Ok(())
}

/// Initializes tracing. `RUST_LOG` wins over the configured default.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
