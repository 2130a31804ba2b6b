//! Dropblox client binary.
//!
//! Exit codes: 0 when the client stops normally (game over, practice closure,
//! Ctrl-C), 1 on configuration or connection errors, 2 on bad usage.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dropblox_client::adapter::{ClientExit, ConnectionSupervisor};
use dropblox_client::cli::{parse_args, Command, USAGE};
use dropblox_client::term;

fn main() -> ExitCode {
    init_tracing();
    term::init_color();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(Command::Run(cli)) => cli,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            term::error(format!("{e}"));
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };
    if cli.no_color {
        term::set_color(false);
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            term::error(format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };

    match run(config) {
        Ok(exit) => {
            info!(?exit, "client stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "client failed");
            term::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DROPBLOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn run(config: dropblox_client::adapter::ClientConfig) -> Result<ClientExit> {
    // tokio-tungstenite builds its rustls config from the process default.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                term::info("Interrupted, closing connection");
                let _ = shutdown_tx.send(true);
            }
        });

        info!(url = %config.url, mode = %config.mode, ai = %config.ai_program.display(), "starting");
        let mut supervisor = ConnectionSupervisor::new(Arc::new(config));
        let exit = supervisor.run(shutdown_rx).await?;
        if matches!(exit, ClientExit::ConnectionClosed { .. }) {
            term::info("Practice session ended");
        }
        Ok(exit)
    })
}
