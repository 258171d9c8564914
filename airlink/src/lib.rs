//! AirLink - ACARS agent for flight simulators
//!
//! This library samples live telemetry from a running simulator, supervises
//! the connection with automatic reconnection, and forwards adaptive
//! position reports to a virtual-airline backend during an active flight.
//!
//! # High-Level API
//!
//! The two long-lived services are the stream engine and the flight
//! reporter:
//!
//! ```ignore
//! use std::sync::Arc;
//! use airlink::connector::SimKind;
//! use airlink::engine::{events::ChannelSink, EngineConfig, FlightDataEngine};
//! use airlink::reporter::{backend::HttpBackend, FlightReporter, ReporterConfig};
//! use airlink::store::FlightLog;
//!
//! let store = Arc::new(FlightLog::open(&db_path).await?);
//! let (sink, mut events) = ChannelSink::new();
//! let engine = Arc::new(FlightDataEngine::new(
//!     EngineConfig::default(),
//!     store,
//!     Arc::new(sink),
//! ));
//!
//! let adapter = engine.connect(SimKind::Auto).await?;
//! println!("connected to {adapter}");
//! ```

pub mod config;
pub mod connector;
pub mod engine;
pub mod flightdata;
pub mod logging;
pub mod reporter;
pub mod store;

/// Version of the AirLink library and CLI.
///
/// This is synchronized across all components in the workspace. The version
/// is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
