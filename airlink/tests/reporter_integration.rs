//! Integration tests for the flight reporter.
//!
//! These tests drive [`FlightReporter`] against an in-memory backend and a
//! canned snapshot source:
//! - Lifecycle: start/stop/finish transitions and their guards
//! - Delivery: bounded retries, outage queueing, FIFO drain on recovery
//! - Cadence: the static window slows the position loop down
//!
//! Run with: `cargo test --test reporter_integration`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use airlink::engine::events::{ChannelSink, Event};
use airlink::flightdata::FlightData;
use airlink::reporter::backend::{AcarsBackend, BackendError};
use airlink::reporter::report::PositionReport;
use airlink::reporter::{FlightReporter, ReporterConfig, ReporterError, SnapshotSource};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct BackendLog {
    starts: usize,
    stops: usize,
    finishes: usize,
    positions: Vec<PositionReport>,
}

/// In-memory backend with scriptable failure modes.
#[derive(Default)]
struct MockBackend {
    log: Mutex<BackendLog>,
    /// Every position POST fails while set.
    refuse_positions: AtomicBool,
    /// start_flight answers 422 while set.
    reject_start: AtomicBool,
    /// finish_flight failure mode: 0 none, 1 rejected, 2 unreachable.
    finish_mode: AtomicUsize,
    /// stop_flight fails while set.
    refuse_stop: AtomicBool,
    position_attempts: AtomicUsize,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn positions(&self) -> Vec<PositionReport> {
        self.log.lock().unwrap().positions.clone()
    }

    fn counts(&self) -> (usize, usize, usize) {
        let log = self.log.lock().unwrap();
        (log.starts, log.stops, log.finishes)
    }
}

impl AcarsBackend for MockBackend {
    async fn start_flight(
        &self,
        _callsign: &str,
        _departure: &str,
        _arrival: &str,
    ) -> Result<(), BackendError> {
        if self.reject_start.load(Ordering::Relaxed) {
            return Err(BackendError::Rejected {
                status: 422,
                message: "no booking for this callsign".to_string(),
            });
        }
        self.log.lock().unwrap().starts += 1;
        Ok(())
    }

    async fn stop_flight(&self, _callsign: &str) -> Result<(), BackendError> {
        if self.refuse_stop.load(Ordering::Relaxed) {
            return Err(BackendError::Unreachable("connection refused".to_string()));
        }
        self.log.lock().unwrap().stops += 1;
        Ok(())
    }

    async fn finish_flight(
        &self,
        _callsign: &str,
        _departure: &str,
        _arrival: &str,
    ) -> Result<(), BackendError> {
        match self.finish_mode.load(Ordering::Relaxed) {
            1 => Err(BackendError::Rejected {
                status: 409,
                message: "flight too short".to_string(),
            }),
            2 => Err(BackendError::Unreachable("connection refused".to_string())),
            _ => {
                self.log.lock().unwrap().finishes += 1;
                Ok(())
            }
        }
    }

    async fn send_position(&self, report: &PositionReport) -> Result<(), BackendError> {
        self.position_attempts.fetch_add(1, Ordering::Relaxed);
        if self.refuse_positions.load(Ordering::Relaxed) {
            return Err(BackendError::Unreachable("connection refused".to_string()));
        }
        self.log.lock().unwrap().positions.push(report.clone());
        Ok(())
    }

    async fn booking(&self) -> Result<serde_json::Value, BackendError> {
        Ok(serde_json::json!({
            "callsign": "BAW123",
            "departure": "EGLL",
            "arrival": "KJFK",
        }))
    }
}

/// Snapshot source whose latitude advances on every read, making each tick's
/// report distinguishable.
struct CountingSource {
    reads: AtomicUsize,
    frozen: AtomicBool,
    available: AtomicBool,
}

impl CountingSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            reads: AtomicUsize::new(0),
            frozen: AtomicBool::new(false),
            available: AtomicBool::new(true),
        })
    }
}

impl SnapshotSource for CountingSource {
    fn snapshot(&self) -> Option<FlightData> {
        if !self.available.load(Ordering::Relaxed) {
            return None;
        }
        let mut data = FlightData::default();
        data.position.latitude = 51.4775;
        data.position.longitude = -0.4614;
        if !self.frozen.load(Ordering::Relaxed) {
            let tick = self.reads.fetch_add(1, Ordering::Relaxed);
            data.position.latitude += tick as f64 * 0.001;
        }
        data.sensors.on_ground = true;
        Some(data)
    }

    fn simulator(&self) -> String {
        "TestSim".to_string()
    }
}

/// Reporter config with intervals shrunk for testing.
fn fast_config() -> ReporterConfig {
    ReporterConfig {
        interval_critical: Duration::from_millis(10),
        interval_low: Duration::from_millis(25),
        interval_high: Duration::from_millis(50),
        interval_static: Duration::from_secs(30),
        static_after: Duration::from_millis(120),
        retry_attempts: 4,
        retry_base: Duration::from_millis(2),
        max_pending: 500,
        ..ReporterConfig::default()
    }
}

type TestReporter = FlightReporter<MockBackend>;

fn reporter_fixture(
    backend: Arc<MockBackend>,
    source: Arc<CountingSource>,
) -> (TestReporter, tokio::sync::mpsc::UnboundedReceiver<Event>) {
    let (sink, events) = ChannelSink::new();
    let reporter = FlightReporter::new(backend, source, Arc::new(sink), fast_config());
    (reporter, events)
}

async fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn full_lifecycle_start_report_finish() {
    let backend = MockBackend::new();
    let source = CountingSource::new();
    let (reporter, mut events) = reporter_fixture(backend.clone(), source);

    assert_eq!(reporter.flight_state().await, "idle");
    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    assert_eq!(reporter.flight_state().await, "active");

    assert!(matches!(events.try_recv(), Ok(Event::FlightState("active"))));

    // Let a few position reports flow.
    assert!(
        wait_until(Duration::from_secs(2), || backend.positions().len() >= 2).await,
        "position reports should arrive"
    );

    reporter.finish_flight().await.unwrap();
    assert_eq!(reporter.flight_state().await, "idle");

    let (starts, stops, finishes) = backend.counts();
    assert_eq!((starts, stops, finishes), (1, 0, 1));

    let reports = backend.positions();
    let first = &reports[0];
    assert_eq!(first.callsign, "BAW123");
    assert_eq!(first.departure, "EGLL");
    assert_eq!(first.arrival, "KJFK");
    assert_eq!(first.simulator, "TestSim");
    assert!((first.position.latitude.value - 51.4775).abs() < 0.01);
}

#[tokio::test]
async fn rejected_start_stays_idle() {
    let backend = MockBackend::new();
    backend.reject_start.store(true, Ordering::Relaxed);
    let (reporter, mut events) = reporter_fixture(backend.clone(), CountingSource::new());

    let err = reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap_err();
    assert!(matches!(err, ReporterError::StartFailed(_)));
    assert_eq!(reporter.flight_state().await, "idle");
    assert!(events.try_recv().is_err(), "no state event on failed start");

    // No position loop was spawned.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(backend.positions().is_empty());
}

#[tokio::test]
async fn start_twice_is_already_active() {
    let backend = MockBackend::new();
    let (reporter, _events) = reporter_fixture(backend.clone(), CountingSource::new());

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    let err = reporter.start_flight("BAW456", "EGLL", "EDDM").await.unwrap_err();
    assert!(matches!(err, ReporterError::AlreadyActive));

    reporter.stop_flight().await.unwrap();
}

#[tokio::test]
async fn stop_and_finish_require_active_flight() {
    let backend = MockBackend::new();
    let (reporter, _events) = reporter_fixture(backend.clone(), CountingSource::new());

    assert!(matches!(
        reporter.stop_flight().await,
        Err(ReporterError::NotActive)
    ));
    assert!(matches!(
        reporter.finish_flight().await,
        Err(ReporterError::NotActive)
    ));
}

#[tokio::test]
async fn stop_returns_idle_even_when_backend_unreachable() {
    let backend = MockBackend::new();
    backend.refuse_stop.store(true, Ordering::Relaxed);
    let (reporter, _events) = reporter_fixture(backend.clone(), CountingSource::new());

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    reporter.stop_flight().await.unwrap();
    assert_eq!(reporter.flight_state().await, "idle");
}

#[tokio::test]
async fn finish_rejection_surfaces_but_ends_flight() {
    let backend = MockBackend::new();
    backend.finish_mode.store(1, Ordering::Relaxed);
    let (reporter, _events) = reporter_fixture(backend.clone(), CountingSource::new());

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    let err = reporter.finish_flight().await.unwrap_err();
    assert!(matches!(err, ReporterError::FinishFailed(_)));
    assert!(err.to_string().contains("flight too short"));
    assert_eq!(reporter.flight_state().await, "idle");
}

#[tokio::test]
async fn finish_transport_failure_keeps_flight_active() {
    let backend = MockBackend::new();
    backend.finish_mode.store(2, Ordering::Relaxed);
    let (reporter, _events) = reporter_fixture(backend.clone(), CountingSource::new());

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    let err = reporter.finish_flight().await.unwrap_err();
    assert!(matches!(err, ReporterError::FinishFailed(_)));
    assert_eq!(reporter.flight_state().await, "active");

    // Retry once the backend is back.
    backend.finish_mode.store(0, Ordering::Relaxed);
    reporter.finish_flight().await.unwrap();
    assert_eq!(reporter.flight_state().await, "idle");
}

#[tokio::test]
async fn booking_passes_through() {
    let backend = MockBackend::new();
    let (reporter, _events) = reporter_fixture(backend.clone(), CountingSource::new());

    let booking = reporter.booking().await.unwrap();
    assert_eq!(booking["callsign"], "BAW123");
}

// ============================================================================
// Delivery, retries and queueing
// ============================================================================

#[tokio::test]
async fn failed_report_gets_exactly_four_attempts() {
    let backend = MockBackend::new();
    backend.refuse_positions.store(true, Ordering::Relaxed);
    let source = CountingSource::new();

    // One slow tick so exactly one report is built in the window.
    let config = ReporterConfig {
        interval_low: Duration::from_millis(80),
        retry_base: Duration::from_millis(2),
        ..fast_config()
    };
    let (sink, _events) = ChannelSink::new();
    let reporter = FlightReporter::new(backend.clone(), source, Arc::new(sink), config);

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || {
            backend.position_attempts.load(Ordering::Relaxed) >= 4
        })
        .await
    );
    // Give any extra (erroneous) attempts time to show up, then stop.
    tokio::time::sleep(Duration::from_millis(30)).await;
    reporter.stop_flight().await.unwrap();

    assert_eq!(backend.position_attempts.load(Ordering::Relaxed) % 4, 0);
    assert!(reporter.pending_reports() >= 1);
    assert!(backend.positions().is_empty());
}

#[tokio::test]
async fn outage_queues_and_drains_in_fifo_order() {
    let backend = MockBackend::new();
    backend.refuse_positions.store(true, Ordering::Relaxed);
    let source = CountingSource::new();
    let (reporter, _events) = reporter_fixture(backend.clone(), source);

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();

    // Outage window: at least two reports must queue up.
    assert!(
        wait_until(Duration::from_secs(2), || reporter.pending_reports() >= 2).await,
        "reports should queue during the outage"
    );

    // Backend recovers.
    backend.refuse_positions.store(false, Ordering::Relaxed);
    assert!(
        wait_until(Duration::from_secs(2), || {
            reporter.pending_reports() == 0 && backend.positions().len() >= 4
        })
        .await,
        "queue should drain after recovery"
    );
    reporter.stop_flight().await.unwrap();

    // Elapsed time grows strictly per built report, so it encodes build
    // order. The first delivery is the recovery tick's fresh report; every
    // report built before it (the outage backlog) must arrive in insertion
    // order and ahead of any report built after it.
    let reports = backend.positions();
    let elapsed: Vec<f64> = reports.iter().map(|r| r.elapsed_time.value).collect();
    let recovery = elapsed[0];

    let backlog: Vec<f64> = elapsed.iter().copied().filter(|&e| e < recovery).collect();
    assert!(backlog.len() >= 2, "backlog missing from delivery: {elapsed:?}");
    assert!(
        backlog.windows(2).all(|w| w[0] < w[1]),
        "drain must preserve FIFO order: {elapsed:?}"
    );

    let last_backlog_pos = elapsed.iter().rposition(|&e| e < recovery).unwrap();
    let first_later_pos = elapsed.iter().position(|&e| e > recovery);
    if let Some(later) = first_later_pos {
        assert!(
            last_backlog_pos < later,
            "backlog must drain before later ticks: {elapsed:?}"
        );
    }
}

#[tokio::test]
async fn missing_snapshot_skips_the_tick() {
    let backend = MockBackend::new();
    let source = CountingSource::new();
    source.available.store(false, Ordering::Relaxed);
    let (reporter, _events) = reporter_fixture(backend.clone(), source.clone());

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(backend.positions().is_empty());
    assert_eq!(reporter.pending_reports(), 0);

    // Snapshots appear: reporting starts.
    source.available.store(true, Ordering::Relaxed);
    assert!(wait_until(Duration::from_secs(1), || !backend.positions().is_empty()).await);

    reporter.stop_flight().await.unwrap();
}

// ============================================================================
// Adaptive cadence
// ============================================================================

#[tokio::test]
async fn static_position_slows_reporting_down() {
    let backend = MockBackend::new();
    let source = CountingSource::new();
    source.frozen.store(true, Ordering::Relaxed);
    let (reporter, _events) = reporter_fixture(backend.clone(), source);

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();

    // Wait out the static window plus margin, then measure.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let settled = backend.positions().len();

    // At the 30 s static interval no further reports fit into this window.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        backend.positions().len(),
        settled,
        "static cadence must stop the report stream"
    );

    reporter.stop_flight().await.unwrap();
}

#[tokio::test]
async fn moving_position_keeps_reporting() {
    let backend = MockBackend::new();
    let source = CountingSource::new(); // latitude changes every read
    let (reporter, _events) = reporter_fixture(backend.clone(), source);

    reporter.start_flight("BAW123", "EGLL", "KJFK").await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let early = backend.positions().len();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let late = backend.positions().len();
    assert!(late > early, "reports must keep flowing while moving");

    reporter.stop_flight().await.unwrap();
}
