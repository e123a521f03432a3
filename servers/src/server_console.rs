use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::signal;

use lib_telemetry::GroundStation;

mod console_logic;
use console_logic::{config, logger, operator, render};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = config::load_config();
    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    logger::setup_logging(&log_dir, &log_level)?;

    let settings = config.to_settings()?;
    let station = Arc::new(
        GroundStation::with_default_transports(settings).context("initializing ground station")?,
    );
    let show_parsed = Arc::new(AtomicBool::new(config.show_parsed.unwrap_or(false)));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let mut quit_rx = shutdown_tx.subscribe();

    // Subscribe before anything else can append, then replay the startup entries.
    let events = station.subscribe();
    for entry in station.console().entries() {
        println!("{}", render::console_line(&entry));
    }

    let printer_handle = tokio::spawn(operator::run_printer(
        events,
        show_parsed.clone(),
        shutdown_tx.subscribe(),
    ));

    if let Some(port) = &config.auto_open {
        // The outcome is narrated on the console.
        let _ = station.open(port).await;
    }

    let operator_handle = tokio::spawn(operator::run_operator(
        station.clone(),
        show_parsed.clone(),
        shutdown_tx.clone(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = quit_rx.recv() => {
            log::info!("Operator quit, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());

    station.shutdown().await;

    // The operator task may be parked on a stdin read that never returns.
    operator_handle.abort();
    let _ = printer_handle.await;

    log::info!("Shutdown complete.");
    Ok(())
}
