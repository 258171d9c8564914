//! AirLink CLI - headless ACARS agent
//!
//! This binary drives the AirLink library without a UI:
//! - `Cli` / `Commands`: Argument parsing (clap)
//! - `CliRunner`: Common setup (settings, logging, service wiring)
//! - `CliError`: Centralized error handling with user-friendly messages
//!
//! # Configuration
//!
//! Settings are loaded from `settings.json` in the airlink directory under
//! the user config directory. CLI arguments override settings when given.

mod error;
mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use airlink::engine::events::{ChannelSink, Event};
use airlink::engine::FlightDataEngine;
use airlink::reporter::backend::HttpBackend;
use airlink::reporter::FlightReporter;

use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "airlink", version = airlink::VERSION, about = "ACARS agent for flight simulators")]
struct Cli {
    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the simulator and stream telemetry until Ctrl-C
    Run {
        /// Simulator transport: auto, native (SimConnect) or udp (X-Plane)
        #[arg(long)]
        sim: Option<String>,
        /// Arm recording once data is flowing
        #[arg(long)]
        record: bool,
    },
    /// Stream telemetry with an active flight: start now, finish on Ctrl-C
    Fly {
        callsign: String,
        departure: String,
        arrival: String,
        /// Simulator transport: auto, native (SimConnect) or udp (X-Plane)
        #[arg(long)]
        sim: Option<String>,
    },
    /// Drain the recording store into a CSV file
    Export {
        /// Output file path
        output: PathBuf,
    },
    /// Show the current booking from the backend
    Booking,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let runner = match CliRunner::new(cli.config.clone()) {
        Ok(runner) => runner,
        Err(e) => e.exit(),
    };

    let result = match cli.command {
        Commands::Run { ref sim, record } => run(&runner, sim.as_deref(), record).await,
        Commands::Fly {
            ref callsign,
            ref departure,
            ref arrival,
            ref sim,
        } => fly(&runner, callsign, departure, arrival, sim.as_deref()).await,
        Commands::Export { ref output } => export(&runner, output).await,
        Commands::Booking => booking(&runner).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}

/// Forward events to the log until the receiver closes.
fn spawn_event_logger(mut events: tokio::sync::mpsc::UnboundedReceiver<Event>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::FlightData(data) => debug!(
                    lat = format!("{:.4}", data.position.latitude),
                    lon = format!("{:.4}", data.position.longitude),
                    alt = format!("{:.0}", data.position.altitude),
                    gs = format!("{:.0}", data.attitude.gs),
                    "telemetry"
                ),
                Event::ConnectionState(name) if name.is_empty() => {
                    info!("simulator disconnected")
                }
                Event::ConnectionState(name) => info!(adapter = %name, "simulator connected"),
                Event::RecordingState(on) => info!(recording = on, "recording state"),
                Event::FlightState(state) => info!(state, "flight state"),
            }
        }
    });
}

async fn run(runner: &CliRunner, sim: Option<&str>, record: bool) -> Result<(), CliError> {
    runner.log_startup("run");

    let store = runner.open_store().await?;
    let (sink, events) = ChannelSink::new();
    spawn_event_logger(events);
    let engine = runner.build_engine(store, Arc::new(sink));

    let adapter = engine.connect(runner.sim_kind(sim)).await?;
    info!(adapter, "connected");

    if record {
        engine.start_recording()?;
    }

    wait_for_ctrl_c().await;

    if record {
        let info = engine.recording_info();
        info!(
            rows = info.data_count,
            duration_secs = format!("{:.0}", info.duration),
            "recording stopped; export with `airlink export <file.csv>`"
        );
        engine.stop_recording();
    }
    engine.disconnect().await;
    Ok(())
}

async fn fly(
    runner: &CliRunner,
    callsign: &str,
    departure: &str,
    arrival: &str,
    sim: Option<&str>,
) -> Result<(), CliError> {
    runner.log_startup("fly");

    let store = runner.open_store().await?;
    let (sink, events) = ChannelSink::new();
    let sink = Arc::new(sink);
    spawn_event_logger(events);
    let engine = runner.build_engine(store, sink.clone());
    let reporter: FlightReporter<HttpBackend> =
        runner.build_reporter(engine.clone(), sink)?;

    let adapter = engine.connect(runner.sim_kind(sim)).await?;
    info!(adapter, "connected");

    reporter.start_flight(callsign, departure, arrival).await?;

    wait_for_ctrl_c().await;

    match reporter.finish_flight().await {
        Ok(()) => info!("flight finished"),
        Err(e) => {
            warn!(error = %e, "finish failed, cancelling flight");
            // Best-effort cancel so the backend does not hold a ghost flight.
            let _ = reporter.stop_flight().await;
        }
    }
    shutdown_engine(&engine).await;
    Ok(())
}

async fn export(runner: &CliRunner, output: &PathBuf) -> Result<(), CliError> {
    runner.log_startup("export");

    let store = runner.open_store().await?;
    let rows = store.export_csv(output).await?;
    info!(rows, path = %output.display(), "export complete");
    println!("Exported {rows} rows to {}", output.display());
    Ok(())
}

async fn booking(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("booking");

    let backend = runner.build_backend()?;
    let booking = airlink::reporter::backend::AcarsBackend::booking(&backend)
        .await
        .map_err(|e| CliError::Reporter(airlink::reporter::ReporterError::Booking(e)))?;
    println!("{}", serde_json::to_string_pretty(&booking).unwrap_or_default());
    Ok(())
}

async fn shutdown_engine(engine: &Arc<FlightDataEngine>) {
    engine.disconnect().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; shutting down");
    }
}
