//! Supervised telemetry stream engine.
//!
//! Owns at most one [`SimConnector`] and polls it on a 1 s ticker. Each tick
//! either emits the latest snapshot to the event sink (and the recording
//! store when armed) or runs the failure path: flip sim-active off, emit an
//! empty connection-state event, and retry `close`/`open` on the same
//! adapter under exponential backoff.
//!
//! Liveness is judged two ways: a failing `latest()` call, or a snapshot
//! whose `last_received` clock is older than the staleness window while the
//! engine believes the simulator is active. Both take the same reconnect
//! path.
//!
//! # Locking
//!
//! All engine state lives behind one mutex with short critical sections.
//! Adapter calls are always made after releasing it, so the engine can never
//! deadlock against an adapter's internal locks.

pub mod events;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connector::simconnect::SimConnectAdapter;
use crate::connector::xplane::XPlaneAdapter;
use crate::connector::{ConnectorError, SimConnector, SimKind};
use crate::flightdata::FlightData;
use crate::store::{FlightLog, StoreError};
use events::{Event, EventSink};

/// Stream engine tuning. Defaults match the production cadence; tests shrink
/// the intervals.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Poll-loop tick interval.
    pub poll_interval: Duration,
    /// Snapshot age beyond which an active simulator counts as stale.
    pub stale_after: Duration,
    /// How long `connect` waits for the first snapshot.
    pub handshake_timeout: Duration,
    /// Probe interval during the connect handshake.
    pub handshake_probe: Duration,
    /// First reconnect delay; doubles per consecutive failed attempt.
    pub reconnect_base: Duration,
    /// Reconnect delay ceiling.
    pub reconnect_cap: Duration,
    /// X-Plane UDP target.
    pub xplane_host: String,
    pub xplane_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stale_after: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(3),
            handshake_probe: Duration::from_millis(200),
            reconnect_base: Duration::from_secs(5),
            reconnect_cap: Duration::from_secs(60),
            xplane_host: "127.0.0.1".to_string(),
            xplane_port: 49000,
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Adapter opened but produced no snapshot within the handshake window.
    #[error("no data received from {adapter} - is the simulator running?")]
    Silent { adapter: &'static str },

    #[error("no simulator connected")]
    NotConnected,

    #[error("already recording")]
    AlreadyRecording,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Recording status for the UI.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingInfo {
    pub recording: bool,
    pub duration: f64,
    pub data_count: u64,
}

struct Stream {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct EngineState {
    connector: Option<Arc<dyn SimConnector>>,
    sim_active: bool,
    recording: bool,
    record_started: Option<Instant>,
    data_count: u64,
    stream: Option<Stream>,
}

/// The supervised data-stream engine.
pub struct FlightDataEngine {
    config: EngineConfig,
    store: Arc<FlightLog>,
    events: Arc<dyn EventSink>,
    state: Arc<Mutex<EngineState>>,
}

impl FlightDataEngine {
    pub fn new(config: EngineConfig, store: Arc<FlightLog>, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            store,
            events,
            state: Arc::new(Mutex::new(EngineState::default())),
        }
    }

    /// Connect to a simulator and wait for data to actually flow.
    ///
    /// `Auto` tries the native adapter first and falls back to the UDP
    /// adapter when the native SDK is unavailable or its open fails. The
    /// returned name is only handed out after the handshake has observed at
    /// least one snapshot, so a `Ok` here means data is flowing.
    pub async fn connect(&self, kind: SimKind) -> Result<&'static str, EngineError> {
        // Close the previous adapter before opening a new one; the native
        // SDK tolerates only one client connection per process.
        self.teardown().await;
        let connector = self.build_connector(kind)?;
        self.attach(connector).await
    }

    /// Bind an already-opened adapter, start the poll loop, and run the
    /// deadline-guarded handshake.
    pub async fn attach(
        &self,
        connector: Arc<dyn SimConnector>,
    ) -> Result<&'static str, EngineError> {
        self.teardown().await;

        let name = connector.name();
        {
            let mut state = self.state.lock().unwrap();
            state.connector = Some(Arc::clone(&connector));
            state.sim_active = false;

            let token = CancellationToken::new();
            let handle = tokio::spawn(poll_loop(
                self.config.clone(),
                Arc::clone(&self.state),
                Arc::clone(&self.store),
                Arc::clone(&self.events),
                token.clone(),
            ));
            state.stream = Some(Stream { token, handle });
        }
        info!(adapter = name, "adapter opened, waiting for data");

        let deadline = Instant::now() + self.config.handshake_timeout;
        while Instant::now() < deadline {
            tokio::time::sleep(self.config.handshake_probe).await;
            if self.is_connected() {
                info!(adapter = name, "connected to simulator");
                return Ok(name);
            }
        }

        self.disconnect().await;
        Err(EngineError::Silent { adapter: name })
    }

    /// Stop the poll loop, close and drop the adapter, and notify the sink.
    pub async fn disconnect(&self) {
        self.teardown().await;
        self.events.emit(Event::ConnectionState(String::new()));
    }

    /// True while at least one snapshot has been observed since the last
    /// bind and no failure or staleness has reset it.
    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().sim_active
    }

    /// Adapter name while sim-active, empty string otherwise.
    pub fn connected_adapter(&self) -> String {
        let state = self.state.lock().unwrap();
        match (&state.connector, state.sim_active) {
            (Some(connector), true) => connector.name().to_string(),
            _ => String::new(),
        }
    }

    /// Arm recording. Every successful tick appends to the store until
    /// [`Self::stop_recording`].
    pub fn start_recording(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.connector.is_none() {
                return Err(EngineError::NotConnected);
            }
            if state.recording {
                return Err(EngineError::AlreadyRecording);
            }
            state.recording = true;
            state.record_started = Some(Instant::now());
            state.data_count = 0;
        }
        self.events.emit(Event::RecordingState(true));
        Ok(())
    }

    /// Disarm recording. No-op when not recording.
    pub fn stop_recording(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.recording {
                return;
            }
            state.recording = false;
        }
        self.events.emit(Event::RecordingState(false));
    }

    pub fn recording_info(&self) -> RecordingInfo {
        let state = self.state.lock().unwrap();
        let duration = match (state.recording, state.record_started) {
            (true, Some(started)) => started.elapsed().as_secs_f64(),
            _ => 0.0,
        };
        RecordingInfo {
            recording: state.recording,
            duration,
            data_count: state.data_count,
        }
    }

    /// Drain the recording store into a CSV file at `path`.
    pub async fn export_csv(&self, path: &std::path::Path) -> Result<u64, EngineError> {
        let exported = self.store.export_csv(path).await?;
        self.state.lock().unwrap().data_count = 0;
        Ok(exported)
    }

    /// One-shot read of the adapter's cached snapshot.
    pub fn latest(&self) -> Result<FlightData, EngineError> {
        let connector = {
            let state = self.state.lock().unwrap();
            state.connector.clone()
        };
        let connector = connector.ok_or(EngineError::NotConnected)?;
        Ok(connector.latest()?)
    }

    fn build_connector(&self, kind: SimKind) -> Result<Arc<dyn SimConnector>, EngineError> {
        match kind {
            SimKind::Native => {
                let adapter = SimConnectAdapter::new()
                    .ok_or(ConnectorError::Unavailable("SimConnect"))?;
                adapter.open()?;
                Ok(Arc::new(adapter))
            }
            SimKind::Udp => {
                let adapter =
                    XPlaneAdapter::new(self.config.xplane_host.clone(), self.config.xplane_port);
                adapter.open()?;
                Ok(Arc::new(adapter))
            }
            SimKind::Auto => {
                if let Some(native) = SimConnectAdapter::new() {
                    match native.open() {
                        Ok(()) => return Ok(Arc::new(native)),
                        Err(e) => {
                            info!(error = %e, "SimConnect not available, trying X-Plane")
                        }
                    }
                }
                let adapter =
                    XPlaneAdapter::new(self.config.xplane_host.clone(), self.config.xplane_port);
                adapter.open()?;
                Ok(Arc::new(adapter))
            }
        }
    }

    /// Stop the poll loop and close the current adapter, without emitting.
    async fn teardown(&self) {
        let (stream, connector) = {
            let mut state = self.state.lock().unwrap();
            state.sim_active = false;
            (state.stream.take(), state.connector.take())
        };
        if let Some(stream) = stream {
            stream.token.cancel();
            let _ = stream.handle.await;
        }
        if let Some(connector) = connector {
            connector.close();
        }
    }
}

/// Reconnect delay for the n-th consecutive failed attempt.
fn reconnect_delay(attempts: u32, base: Duration, cap: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempts.min(16))).min(cap)
}

/// The single poll loop. Exactly one runs per bound adapter.
async fn poll_loop(
    config: EngineConfig,
    state: Arc<Mutex<EngineState>>,
    store: Arc<FlightLog>,
    events: Arc<dyn EventSink>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut reconnect_armed = false;
    let mut reconnect_attempts: u32 = 0;
    let mut last_attempt: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        // Snapshot engine state, then release the lock before touching the
        // adapter.
        let (connector, recording, was_active) = {
            let state = state.lock().unwrap();
            (state.connector.clone(), state.recording, state.sim_active)
        };
        let Some(connector) = connector else {
            continue;
        };

        let result = connector.latest();
        let stale = was_active
            && connector
                .last_received()
                .is_some_and(|t| t.elapsed() > config.stale_after);

        match result {
            Ok(data) if !stale => {
                reconnect_armed = false;
                reconnect_attempts = 0;
                last_attempt = None;

                if !was_active {
                    state.lock().unwrap().sim_active = true;
                    events.emit(Event::ConnectionState(connector.name().to_string()));
                    info!(adapter = connector.name(), "simulator data received");
                }

                events.emit(Event::FlightData(data.clone()));

                if recording {
                    match store.append(&data).await {
                        Ok(()) => state.lock().unwrap().data_count += 1,
                        Err(e) => error!(error = %e, "failed to record snapshot"),
                    }
                }
            }
            _ => {
                if was_active {
                    state.lock().unwrap().sim_active = false;
                    events.emit(Event::ConnectionState(String::new()));
                    warn!(
                        adapter = connector.name(),
                        stale, "simulator data lost, will attempt reconnection"
                    );
                    reconnect_armed = true;
                    reconnect_attempts = 0;
                    last_attempt = None;
                }

                if reconnect_armed {
                    let delay =
                        reconnect_delay(reconnect_attempts, config.reconnect_base, config.reconnect_cap);
                    if last_attempt.is_none_or(|t| t.elapsed() >= delay) {
                        last_attempt = Some(Instant::now());
                        info!(
                            adapter = connector.name(),
                            attempt = reconnect_attempts + 1,
                            "attempting simulator reconnection"
                        );
                        connector.close();
                        match connector.open() {
                            Ok(()) => {
                                info!(adapter = connector.name(), "simulator reconnected");
                                reconnect_armed = false;
                                reconnect_attempts = 0;
                                last_attempt = None;
                            }
                            Err(e) => {
                                reconnect_attempts += 1;
                                debug!(
                                    error = %e,
                                    next_delay = ?reconnect_delay(
                                        reconnect_attempts,
                                        config.reconnect_base,
                                        config.reconnect_cap
                                    ),
                                    "reconnection attempt failed"
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_schedule() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(60);
        assert_eq!(reconnect_delay(0, base, cap), Duration::from_secs(5));
        assert_eq!(reconnect_delay(1, base, cap), Duration::from_secs(10));
        assert_eq!(reconnect_delay(2, base, cap), Duration::from_secs(20));
        assert_eq!(reconnect_delay(3, base, cap), Duration::from_secs(40));
        assert_eq!(reconnect_delay(4, base, cap), Duration::from_secs(60));
        assert_eq!(reconnect_delay(10, base, cap), Duration::from_secs(60));
        assert_eq!(reconnect_delay(u32::MAX, base, cap), Duration::from_secs(60));
    }

    #[test]
    fn reconnect_delay_stays_bounded() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(60);
        let mut previous = Duration::ZERO;
        for n in 0..32 {
            let delay = reconnect_delay(n, base, cap);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= cap);
            assert!(delay >= previous, "delay must grow monotonically");
            previous = delay;
        }
    }

    #[test]
    fn default_config_matches_production_cadence() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.stale_after, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.xplane_port, 49000);
    }
}
