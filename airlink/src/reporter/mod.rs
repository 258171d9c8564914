//! Flight lifecycle and adaptive position reporting.
//!
//! A flight moves between two states, `idle` and `active`. Starting a flight
//! announces it to the backend and spawns the position loop; stopping
//! (cancel) or finishing (completion) notifies the backend, stops the loop,
//! and clears the identity.
//!
//! The position loop samples the stream engine's latest snapshot on a
//! ticker whose period adapts to the flight regime: half a second through
//! the takeoff/landing band, two seconds in cruise, a minute when the
//! aircraft has not moved, one second otherwise. Reports that fail all
//! retries are parked in a bounded FIFO and drained, oldest first, after the
//! next successful delivery; a backend outage costs reports only once the
//! buffer overflows.
//!
//! The reporter is deliberately independent of the engine's lifetime: a tick
//! without a snapshot is skipped, not an error.

pub mod backend;
pub mod report;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::events::{Event, EventSink};
use crate::engine::FlightDataEngine;
use crate::flightdata::FlightData;
use backend::{AcarsBackend, BackendError};
use report::{build_report, PositionReport};

/// One-shot snapshot access for the position loop.
///
/// The reporter reads the stream engine through this seam instead of holding
/// the engine itself, which keeps the service graph acyclic and lets tests
/// feed canned snapshots.
pub trait SnapshotSource: Send + Sync {
    /// The engine's current snapshot, if any.
    fn snapshot(&self) -> Option<FlightData>;

    /// Name of the adapter currently delivering data, empty when none.
    fn simulator(&self) -> String;
}

impl SnapshotSource for FlightDataEngine {
    fn snapshot(&self) -> Option<FlightData> {
        self.latest().ok()
    }

    fn simulator(&self) -> String {
        self.connected_adapter()
    }
}

/// Reporter tuning. Defaults match the production cadence; tests shrink the
/// intervals.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Airborne below the critical AGL band (takeoff/landing).
    pub interval_critical: Duration,
    /// Default reporting interval.
    pub interval_low: Duration,
    /// At or above the cruise AGL threshold.
    pub interval_high: Duration,
    /// Position static for longer than `static_after`.
    pub interval_static: Duration,
    /// AGL below which an airborne aircraft is in the critical band, feet.
    pub critical_agl: f64,
    /// AGL at which cruise cadence starts, feet.
    pub high_agl: f64,
    /// How long the position must be unchanged before static cadence.
    pub static_after: Duration,
    /// Delivery attempts per report before it is queued.
    pub retry_attempts: u32,
    /// Base delay of the jittered exponential retry backoff.
    pub retry_base: Duration,
    /// Pending-buffer capacity; the oldest report is dropped on overflow.
    pub max_pending: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval_critical: Duration::from_millis(500),
            interval_low: Duration::from_secs(1),
            interval_high: Duration::from_secs(2),
            interval_static: Duration::from_secs(60),
            critical_agl: 50.0,
            high_agl: 10_000.0,
            static_after: Duration::from_secs(5),
            retry_attempts: 4,
            retry_base: Duration::from_millis(250),
            max_pending: 500,
        }
    }
}

/// Errors surfaced by flight lifecycle operations.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("flight already active")]
    AlreadyActive,

    #[error("no active flight")]
    NotActive,

    #[error("start flight: {0}")]
    StartFailed(#[source] BackendError),

    #[error("finish flight: {0}")]
    FinishFailed(#[source] BackendError),

    #[error("fetch booking: {0}")]
    Booking(#[source] BackendError),
}

#[derive(Clone)]
struct FlightIdentity {
    callsign: String,
    departure: String,
    arrival: String,
}

struct ActiveFlight {
    identity: FlightIdentity,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// The flight reporter service.
pub struct FlightReporter<B: AcarsBackend + 'static> {
    backend: Arc<B>,
    snapshots: Arc<dyn SnapshotSource>,
    events: Arc<dyn EventSink>,
    config: ReporterConfig,
    state: tokio::sync::Mutex<Option<ActiveFlight>>,
    pending_len: Arc<AtomicUsize>,
}

impl<B: AcarsBackend + 'static> FlightReporter<B> {
    pub fn new(
        backend: Arc<B>,
        snapshots: Arc<dyn SnapshotSource>,
        events: Arc<dyn EventSink>,
        config: ReporterConfig,
    ) -> Self {
        Self {
            backend,
            snapshots,
            events,
            config,
            state: tokio::sync::Mutex::new(None),
            pending_len: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Announce a flight and start the position loop.
    ///
    /// A backend rejection or transport failure leaves the reporter idle.
    pub async fn start_flight(
        &self,
        callsign: &str,
        departure: &str,
        arrival: &str,
    ) -> Result<(), ReporterError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(ReporterError::AlreadyActive);
        }

        self.backend
            .start_flight(callsign, departure, arrival)
            .await
            .map_err(ReporterError::StartFailed)?;

        let identity = FlightIdentity {
            callsign: callsign.to_string(),
            departure: departure.to_string(),
            arrival: arrival.to_string(),
        };
        let token = CancellationToken::new();
        let handle = tokio::spawn(position_loop(
            Arc::clone(&self.backend),
            Arc::clone(&self.snapshots),
            self.config.clone(),
            identity.clone(),
            Instant::now(),
            Arc::clone(&self.pending_len),
            token.clone(),
        ));
        *state = Some(ActiveFlight {
            identity,
            token,
            handle,
        });
        drop(state);

        info!(callsign, departure, arrival, "flight started");
        self.events.emit(Event::FlightState("active"));
        Ok(())
    }

    /// Cancel the active flight. The backend notification is best-effort;
    /// the reporter returns to idle regardless.
    pub async fn stop_flight(&self) -> Result<(), ReporterError> {
        let mut state = self.state.lock().await;
        let flight = state.take().ok_or(ReporterError::NotActive)?;
        drop(state);

        if let Err(e) = self.backend.stop_flight(&flight.identity.callsign).await {
            warn!(error = %e, "stop flight request failed");
        }

        self.shutdown(flight).await;
        info!("flight stopped");
        Ok(())
    }

    /// Complete the active flight.
    ///
    /// A server-side rejection still ends the flight (the backend has seen
    /// and refused it) but the error is surfaced; a transport failure leaves
    /// the flight active so completion can be retried.
    pub async fn finish_flight(&self) -> Result<(), ReporterError> {
        let mut state = self.state.lock().await;
        let flight = state.take().ok_or(ReporterError::NotActive)?;
        let identity = flight.identity.clone();

        let result = self
            .backend
            .finish_flight(&identity.callsign, &identity.departure, &identity.arrival)
            .await;

        match result {
            Ok(()) => {
                drop(state);
                self.shutdown(flight).await;
                info!(callsign = %identity.callsign, "flight finished");
                Ok(())
            }
            Err(e @ BackendError::Rejected { .. }) => {
                drop(state);
                self.shutdown(flight).await;
                Err(ReporterError::FinishFailed(e))
            }
            Err(e) => {
                // Transport never reached the server; keep the flight so
                // completion can be retried.
                *state = Some(flight);
                Err(ReporterError::FinishFailed(e))
            }
        }
    }

    /// Current lifecycle state, `"idle"` or `"active"`.
    pub async fn flight_state(&self) -> &'static str {
        if self.state.lock().await.is_some() {
            "active"
        } else {
            "idle"
        }
    }

    /// Active flight identity as (callsign, departure, arrival).
    pub async fn current_flight(&self) -> Option<(String, String, String)> {
        self.state.lock().await.as_ref().map(|f| {
            (
                f.identity.callsign.clone(),
                f.identity.departure.clone(),
                f.identity.arrival.clone(),
            )
        })
    }

    /// Fetch the pilot's booking from the backend, opaque JSON.
    pub async fn booking(&self) -> Result<serde_json::Value, ReporterError> {
        self.backend.booking().await.map_err(ReporterError::Booking)
    }

    /// Number of reports currently parked in the pending buffer.
    pub fn pending_reports(&self) -> usize {
        self.pending_len.load(Ordering::Relaxed)
    }

    async fn shutdown(&self, flight: ActiveFlight) {
        flight.token.cancel();
        let _ = flight.handle.await;
        self.events.emit(Event::FlightState("idle"));
    }
}

/// Bounded FIFO of undelivered reports.
struct PendingBuffer {
    reports: VecDeque<PositionReport>,
    cap: usize,
}

impl PendingBuffer {
    fn new(cap: usize) -> Self {
        Self {
            reports: VecDeque::new(),
            cap,
        }
    }

    /// Queue a report, dropping the oldest when full.
    fn push(&mut self, report: PositionReport) {
        if self.reports.len() >= self.cap {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    fn front(&self) -> Option<&PositionReport> {
        self.reports.front()
    }

    fn pop_front(&mut self) {
        self.reports.pop_front();
    }

    fn len(&self) -> usize {
        self.reports.len()
    }
}

/// Pick the reporting interval for this tick.
fn next_interval(
    config: &ReporterConfig,
    data: &FlightData,
    position_changed: bool,
    since_change: Duration,
) -> Duration {
    if !position_changed && since_change > config.static_after {
        config.interval_static
    } else if !data.sensors.on_ground && data.position.altitude_agl < config.critical_agl {
        config.interval_critical
    } else if data.position.altitude_agl >= config.high_agl {
        config.interval_high
    } else {
        config.interval_low
    }
}

/// Jittered exponential retry delay for the k-th failed attempt.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt.min(8)));
    exp.mul_f64(rand::rng().random_range(0.5..1.5))
}

/// Deliver one report with bounded retries.
async fn post_with_retry<B: AcarsBackend>(
    backend: &B,
    report: &PositionReport,
    config: &ReporterConfig,
) -> Result<(), BackendError> {
    let attempts = config.retry_attempts.max(1);
    let mut last = None;
    for attempt in 0..attempts {
        match backend.send_position(report).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                last = Some(e);
                if attempt + 1 < attempts {
                    tokio::time::sleep(retry_delay(config.retry_base, attempt)).await;
                }
            }
        }
    }
    Err(last.expect("at least one attempt was made"))
}

/// The position loop. One runs per active flight.
async fn position_loop<B: AcarsBackend>(
    backend: Arc<B>,
    snapshots: Arc<dyn SnapshotSource>,
    config: ReporterConfig,
    identity: FlightIdentity,
    started: Instant,
    pending_len: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval_low);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the interval's immediate first fire; reports start one period in.
    ticker.tick().await;

    let mut current = config.interval_low;
    let mut pending = PendingBuffer::new(config.max_pending);
    let mut last_lat = 0.0f64;
    let mut last_lon = 0.0f64;
    let mut last_changed = Instant::now();

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        // No snapshot this tick: skip, do not touch the buffer.
        let Some(data) = snapshots.snapshot() else {
            continue;
        };

        // Exact comparison on purpose: simulator output jitters on every
        // frame, so equality means the stream is genuinely frozen.
        let position_changed =
            data.position.latitude != last_lat || data.position.longitude != last_lon;
        if position_changed {
            last_lat = data.position.latitude;
            last_lon = data.position.longitude;
            last_changed = Instant::now();
        }

        let wanted = next_interval(&config, &data, position_changed, last_changed.elapsed());
        if wanted != current {
            debug!(from = ?current, to = ?wanted, "report cadence changed");
            current = wanted;
            ticker = tokio::time::interval_at(tokio::time::Instant::now() + wanted, wanted);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        }

        let report = build_report(
            &identity.callsign,
            &identity.departure,
            &identity.arrival,
            started.elapsed().as_secs_f64(),
            &snapshots.simulator(),
            &data,
        );

        match post_with_retry(backend.as_ref(), &report, &config).await {
            Ok(()) => {
                // Delivery works again: flush what queued up, oldest first,
                // stopping at the first failure.
                while let Some(front) = pending.front() {
                    match backend.send_position(front).await {
                        Ok(()) => pending.pop_front(),
                        Err(e) => {
                            debug!(error = %e, queued = pending.len(), "pending drain interrupted");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "position report failed after retries, queueing");
                pending.push(report);
            }
        }
        pending_len.store(pending.len(), Ordering::Relaxed);
    }
}
