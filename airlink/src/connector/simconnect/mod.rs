//! Native SimConnect adapter.
//!
//! Wraps the simulator's in-process SDK. The SDK has thread affinity: the
//! thread that opens the handle must issue every later call, and the library
//! is not reentrant. The adapter therefore runs one dedicated OS thread that
//! performs open, data-definition registration, the 1 Hz request ticker, the
//! dispatch poll loop, and close. Nothing else ever touches the link.
//!
//! Cross-thread interaction is limited to a stop flag, a one-shot open
//! result channel, and the snapshot cache behind a read-write lock.
//!
//! Negative dispatch results are a normal "nothing to read": the loop sleeps
//! 5 ms and retries. The adapter never tears itself down on read trouble;
//! staleness is judged by the stream engine from `last_received`.

pub mod link;
pub mod record;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{ConnectorError, SimConnector};
use crate::flightdata::FlightData;
use link::{Dispatch, LinkFactory, SimLink};

/// Client name announced to the SDK.
const APP_NAME: &str = "AirLink ACARS";

/// Composite data definition id.
const DATA_DEFINITION: u32 = 0;

/// Request id for the user-aircraft data request.
const DATA_REQUEST: u32 = 0;

/// Interval between data requests.
const REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Idle sleep when the dispatch queue is empty.
const DISPATCH_IDLE: Duration = Duration::from_millis(5);

#[derive(Default)]
struct Cache {
    data: Option<FlightData>,
    last_received: Option<Instant>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Adapter for the native SimConnect SDK.
pub struct SimConnectAdapter {
    factory: Arc<LinkFactory>,
    cache: Arc<RwLock<Cache>>,
    worker: Mutex<Option<Worker>>,
}

impl SimConnectAdapter {
    /// Create the adapter, or `None` where the native SDK does not exist.
    #[cfg(windows)]
    pub fn new() -> Option<Self> {
        Some(Self::with_link_factory(link::native_link_factory(APP_NAME)))
    }

    /// Create the adapter, or `None` where the native SDK does not exist.
    #[cfg(not(windows))]
    pub fn new() -> Option<Self> {
        None
    }

    /// Build the adapter over an arbitrary link implementation. The factory
    /// runs on the dispatch thread so the SDK handle is born with the right
    /// thread affinity.
    pub fn with_link_factory(factory: Arc<LinkFactory>) -> Self {
        Self {
            factory,
            cache: Arc::new(RwLock::new(Cache::default())),
            worker: Mutex::new(None),
        }
    }

    /// Dispatch loop body. Runs entirely on the dedicated thread.
    fn run(
        factory: Arc<LinkFactory>,
        stop: Arc<AtomicBool>,
        cache: Arc<RwLock<Cache>>,
        opened: mpsc::Sender<Result<(), ConnectorError>>,
    ) {
        let mut link: Box<dyn SimLink> = match factory() {
            Ok(link) => link,
            Err(e) => {
                let _ = opened.send(Err(ConnectorError::OpenFailed {
                    adapter: "SimConnect",
                    reason: e.to_string(),
                }));
                return;
            }
        };

        for field in record::RECORD_FIELDS {
            if let Err(e) = link.add_field(DATA_DEFINITION, field.var, field.unit, &field.kind) {
                link.close();
                let _ = opened.send(Err(ConnectorError::OpenFailed {
                    adapter: "SimConnect",
                    reason: format!("register {}: {e}", field.var),
                }));
                return;
            }
        }

        info!(fields = record::RECORD_FIELDS.len(), "SimConnect connected");
        let _ = opened.send(Ok(()));

        if let Err(e) = link.request_data(DATA_REQUEST, DATA_DEFINITION) {
            debug!(error = %e, "initial data request failed");
        }
        let mut last_request = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            if last_request.elapsed() >= REQUEST_INTERVAL {
                last_request = Instant::now();
                if let Err(e) = link.request_data(DATA_REQUEST, DATA_DEFINITION) {
                    debug!(error = %e, "data request failed");
                }
            }

            match link.next_dispatch() {
                Dispatch::Data(buf) => match record::decode(&buf) {
                    Some(raw) => {
                        let data = record::to_flight_data(&raw);
                        let mut cache = cache.write().unwrap();
                        cache.data = Some(data);
                        cache.last_received = Some(Instant::now());
                    }
                    None => debug!(len = buf.len(), "short simobject record dropped"),
                },
                Dispatch::Exception(code) => {
                    warn!(code, "SimConnect exception received");
                }
                Dispatch::Other => {}
                Dispatch::Pending => thread::sleep(DISPATCH_IDLE),
            }
        }

        link.close();
        let mut cache = cache.write().unwrap();
        cache.data = None;
        cache.last_received = None;
        info!("SimConnect closed");
    }
}

impl SimConnector for SimConnectAdapter {
    fn open(&self) -> Result<(), ConnectorError> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (opened_tx, opened_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("simconnect-dispatch".to_string())
            .spawn({
                let factory = Arc::clone(&self.factory);
                let stop = Arc::clone(&stop);
                let cache = Arc::clone(&self.cache);
                move || Self::run(factory, stop, cache, opened_tx)
            })
            .map_err(|e| ConnectorError::OpenFailed {
                adapter: "SimConnect",
                reason: format!("spawn dispatch thread: {e}"),
            })?;

        match opened_rx.recv() {
            Ok(Ok(())) => {
                *worker = Some(Worker { stop, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(ConnectorError::OpenFailed {
                    adapter: "SimConnect",
                    reason: "dispatch thread exited before reporting open".to_string(),
                })
            }
        }
    }

    fn close(&self) {
        let Some(worker) = self.worker.lock().unwrap().take() else {
            return;
        };
        worker.stop.store(true, Ordering::Relaxed);
        let _ = worker.handle.join();
    }

    fn name(&self) -> &'static str {
        "SimConnect"
    }

    fn latest(&self) -> Result<FlightData, ConnectorError> {
        self.cache
            .read()
            .unwrap()
            .data
            .clone()
            .ok_or(ConnectorError::NoData)
    }

    fn last_received(&self) -> Option<Instant> {
        self.cache.read().unwrap().last_received
    }
}

impl Drop for SimConnectAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
