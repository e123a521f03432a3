use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lib_telemetry::{GroundStation, StationEvent, Subscription};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use super::commands::{Command, HELP};
use super::render;

/// Prints console entries as they are appended, and decoded records while
/// the parsed-data view is on.
pub async fn run_printer(
    mut events: Subscription,
    show_parsed: Arc<AtomicBool>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events.recv() => match event {
                Some(StationEvent::ConsoleAppended(entry)) => println!("{}", render::console_line(&entry)),
                Some(StationEvent::TelemetryUpdated(record)) if show_parsed.load(Ordering::Relaxed) => {
                    println!("{}", render::telemetry_line(&record))
                }
                Some(StationEvent::PortChanged { port_id, state }) => log::debug!("Port {} is now {}", port_id, state),
                Some(StationEvent::LaunchChanged(state)) => log::debug!("Launch state is now {}", state),
                Some(_) => {}
                None => break,
            },
        }
    }
    log::debug!("Console printer stopped.");
}

/// Reads operator commands from stdin until `quit` or shutdown.
pub async fn run_operator(
    station: Arc<GroundStation>,
    show_parsed: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown_rx.recv() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::info!("stdin closed, operator commands disabled.");
                break;
            }
            Err(e) => {
                log::error!("Failed to read operator input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        if command == Command::Quit {
            log::info!("Quit requested by operator.");
            let _ = shutdown_tx.send(());
            break;
        }
        execute(&station, &show_parsed, command).await;
    }
}

/// Runs one command. Outcomes of port and launch commands are narrated on
/// the station console, so their errors are not printed again here.
pub async fn execute(station: &GroundStation, show_parsed: &AtomicBool, command: Command) {
    match command {
        Command::Ports => println!("{}", render::ports_table(&station.ports())),
        Command::Open(port) => {
            let _ = station.open(&port).await;
        }
        Command::Close => {
            let _ = station.close().await;
        }
        Command::Start => {
            let _ = station.start_launch();
        }
        Command::Abort => {
            if !station.abort_launch() {
                println!("No launch sequence is running.");
            }
        }
        Command::Status => println!("{}", render::status_line(&station.status())),
        Command::Parsed(on) => {
            show_parsed.store(on, Ordering::Relaxed);
            let text = if on {
                "Started showing parsed data..."
            } else {
                "Stopped showing parsed data"
            };
            station.console().info(text);
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}
