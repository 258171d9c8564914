//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, and service wiring
//! to reduce duplication across command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use airlink::config::AgentConfig;
use airlink::connector::SimKind;
use airlink::engine::events::EventSink;
use airlink::engine::{EngineConfig, FlightDataEngine};
use airlink::logging::{init_logging, LoggingGuard};
use airlink::reporter::backend::HttpBackend;
use airlink::reporter::{FlightReporter, ReporterConfig};
use airlink::store::FlightLog;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: AgentConfig,
}

impl CliRunner {
    /// Load settings (from `config_path` or the default location) and
    /// initialize logging.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let path = match config_path {
            Some(path) => path,
            None => AgentConfig::default_path()?,
        };
        let config = AgentConfig::load(&path)?;

        let logging_guard = init_logging(&config.log.directory, &config.log.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Simulator kind from a CLI override or the settings file.
    pub fn sim_kind(&self, override_kind: Option<&str>) -> SimKind {
        let setting = override_kind.unwrap_or(&self.config.simulator.sim_type);
        SimKind::from_setting(setting)
    }

    pub fn log_startup(&self, command: &str) {
        info!("AirLink v{}", airlink::VERSION);
        info!(command, "AirLink CLI started");
    }

    /// Open the recording store at its default location.
    pub async fn open_store(&self) -> Result<Arc<FlightLog>, CliError> {
        let path = AgentConfig::default_db_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliError::Config(format!("create data dir: {e}")))?;
        }
        Ok(Arc::new(FlightLog::open(&path).await?))
    }

    /// Build the stream engine against `store` and `sink`.
    pub fn build_engine(
        &self,
        store: Arc<FlightLog>,
        sink: Arc<dyn EventSink>,
    ) -> Arc<FlightDataEngine> {
        let engine_config = EngineConfig {
            xplane_host: self.config.simulator.xplane_host.clone(),
            xplane_port: self.config.simulator.xplane_port,
            ..EngineConfig::default()
        };
        Arc::new(FlightDataEngine::new(engine_config, store, sink))
    }

    /// Build the flight reporter over the configured backend.
    ///
    /// Fails when no backend base URL is configured - flight reporting is
    /// meaningless without one.
    pub fn build_reporter(
        &self,
        engine: Arc<FlightDataEngine>,
        sink: Arc<dyn EventSink>,
    ) -> Result<FlightReporter<HttpBackend>, CliError> {
        let backend = self.build_backend()?;
        Ok(FlightReporter::new(
            Arc::new(backend),
            engine,
            sink,
            ReporterConfig::default(),
        ))
    }

    /// Build the backend client alone (booking lookups).
    pub fn build_backend(&self) -> Result<HttpBackend, CliError> {
        if self.config.backend.base_url.is_empty() {
            return Err(CliError::Config(
                "backend.baseUrl is not set in settings.json".to_string(),
            ));
        }
        let backend = HttpBackend::new(self.config.backend.base_url.clone());
        backend.set_token(self.config.backend.token.clone());
        Ok(backend)
    }
}
