//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use airlink::config::ConfigError;
use airlink::engine::EngineError;
use airlink::reporter::ReporterError;
use airlink::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration problem (file or missing setting)
    Config(String),
    /// Recording store failure
    Store(StoreError),
    /// Stream engine failure (connect, export, recording)
    Engine(EngineError),
    /// Flight reporter failure (lifecycle, booking)
    Reporter(ReporterError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Engine(EngineError::Silent { adapter }) => {
                eprintln!();
                eprintln!("The {adapter} transport opened but no data arrived.");
                eprintln!("Make sure the simulator is running and a flight is loaded.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Settings live in the airlink directory under your user config");
                eprintln!("directory (settings.json).");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Store(e) => write!(f, "Recording store error: {}", e),
            CliError::Engine(e) => write!(f, "Simulator error: {}", e),
            CliError::Reporter(e) => write!(f, "Flight error: {}", e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<ReporterError> for CliError {
    fn from(e: ReporterError) -> Self {
        Self::Reporter(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config_error() {
        let err = CliError::Config("backend.baseUrl is not set".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("backend.baseUrl"));
    }

    #[test]
    fn display_engine_error() {
        let err = CliError::Engine(EngineError::NotConnected);
        assert!(err.to_string().contains("no simulator connected"));
    }

    #[test]
    fn from_reporter_error() {
        let err: CliError = ReporterError::NotActive.into();
        assert!(matches!(err, CliError::Reporter(_)));
    }
}
