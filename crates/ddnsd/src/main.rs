// # ddnsd - DDNS Daemon
//
// Thin integration layer: parses flags, sets up logging and the runtime,
// wires the interface address source, the RFC 2136 client and the file
// configuration into a `DdnsEngine`. All update logic lives in the library
// crates.
//
// ## Modes
//
// - Periodic (default): reconcile every `--interval` seconds until SIGTERM/SIGINT
// - One-shot (`ddnsd update ...`): replace or delete one record and exit
// - Query (`ddnsd query`): print the published A records of every hostname
//
// ## Example
//
// ```bash
// ddnsd --iface ppp0 --config /etc/ddns/domains.yaml --tsig /etc/ddns/tsig.yaml
//
// ddnsd --tsig tsig.yaml update --domain host1.example.com \
//     --payload 203.0.113.5 --nameserver ns1.example.com
//
// ddnsd --config /etc/ddns/domains.yaml query
// ```

mod cli;
mod oneshot;
mod query;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, QueryArgs, UpdateArgs};
use ddns_core::{DdnsEngine, EngineEvent, FileConfigSource};
use ddns_ip_iface::InterfaceAddressSource;
use ddns_rfc2136::Rfc2136Client;
use oneshot::OneShot;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (fail-fast abort, failed one-shot update)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match cli.command {
            Some(Command::Update(ref args)) => run_oneshot(&cli, args).await,
            Some(Command::Query(ref args)) => run_query(&cli, args).await,
            None => run_daemon(&cli).await,
        }
    });
    code.into()
}

/// Periodic mode
async fn run_daemon(cli: &Cli) -> DdnsExitCode {
    let config = cli.engine_config();
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return DdnsExitCode::ConfigError;
    }

    info!("Starting ddnsd daemon");
    info!("Zone config: {}", cli.config.display());
    match &cli.tsig {
        Some(path) => info!("Key config: {}", path.display()),
        None => warn!("No key file configured, updates will be unsigned"),
    }

    let (engine, mut events) = match DdnsEngine::new(
        Box::new(InterfaceAddressSource::new(config.interface.clone())),
        Box::new(Rfc2136Client::new()),
        Box::new(FileConfigSource::new(cli.config.clone(), cli.tsig.clone())),
        config,
    ) {
        Ok(created) => created,
        Err(e) => {
            error!("Failed to create engine: {}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    // Drain events so the bounded channel never fills
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, stopping: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    match engine.run_with_shutdown(Some(shutdown_rx)).await {
        Ok(()) => {
            info!("Daemon stopped");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// One-shot mode
async fn run_oneshot(cli: &Cli, args: &UpdateArgs) -> DdnsExitCode {
    let prepared = prepare_oneshot(cli, args).await;
    let (operation, keys) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    match oneshot::execute(&operation, &keys, Duration::from_secs(cli.timeout)).await {
        Ok(()) => DdnsExitCode::CleanShutdown,
        Err(e) => {
            error!("Update failed: {:#}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Query mode
async fn run_query(cli: &Cli, args: &QueryArgs) -> DdnsExitCode {
    let timeout = Duration::from_secs(cli.timeout);
    match query::run(&cli.config, args.nameserver.as_deref(), timeout).await {
        Ok(lookups) if lookups.iter().all(|lookup| lookup.addresses.is_ok()) => {
            DdnsExitCode::CleanShutdown
        }
        Ok(lookups) => {
            let failed = lookups.iter().filter(|lookup| lookup.addresses.is_err()).count();
            error!("{} of {} queries failed", failed, lookups.len());
            DdnsExitCode::RuntimeError
        }
        Err(e) => {
            error!("{:#}", e);
            DdnsExitCode::ConfigError
        }
    }
}

async fn prepare_oneshot(
    cli: &Cli,
    args: &UpdateArgs,
) -> Result<(OneShot, ddns_core::KeyRing)> {
    let args = args.clone();
    let operation = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        OneShot::resolve(args, &mut stdin.lock(), &mut stdout)
    })
    .await
    .context("prompt task failed")??;

    let keys = oneshot::load_keys(cli.tsig.as_deref()).await?;
    Ok((operation, keys))
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::UpdateFailed {
            owner,
            nameserver,
            error,
        } => debug!(%owner, %nameserver, %error, "event: update failed"),
        EngineEvent::TickCompleted {
            attempted,
            applied,
            failed,
        } => debug!(attempted, applied, failed, "event: tick completed"),
        other => debug!("event: {:?}", other),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
