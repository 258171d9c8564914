//! X-Plane UDP adapter.
//!
//! Speaks the RREF dataref protocol to a running X-Plane instance. `open`
//! dials the simulator's UDP port, subscribes every [`dictionary`] entry at
//! 1 Hz, and starts a listener thread that folds responses into the cached
//! snapshot. The listener applies a 1 s read deadline so it notices the
//! stop flag within one deadline interval even when the simulator has gone
//! quiet.
//!
//! The adapter never tears itself down on receive errors; liveness is the
//! stream engine's call, made from `last_received`.

pub mod dictionary;
pub mod protocol;

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::{ConnectorError, SimConnector};
use crate::flightdata::FlightData;

/// Subscription frequency requested from the simulator.
const SUBSCRIBE_HZ: u32 = 1;

/// Listener read deadline; bounds how long `close` waits for the thread.
const READ_DEADLINE: Duration = Duration::from_secs(1);

/// Snapshot cache shared between the listener thread and readers.
#[derive(Default)]
struct Cache {
    data: FlightData,
    has_data: bool,
    last_received: Option<Instant>,
}

/// Live transport state, present only while the adapter is open.
struct Transport {
    socket: UdpSocket,
    stop: Arc<AtomicBool>,
    listener: Option<thread::JoinHandle<()>>,
}

/// Adapter for X-Plane's RREF UDP protocol.
pub struct XPlaneAdapter {
    host: String,
    port: u16,
    cache: Arc<RwLock<Cache>>,
    transport: Mutex<Option<Transport>>,
}

impl XPlaneAdapter {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cache: Arc::new(RwLock::new(Cache::default())),
            transport: Mutex::new(None),
        }
    }

    /// Local address of the open socket. Test fixtures use this to address
    /// responses at the adapter.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        let transport = self.transport.lock().unwrap();
        transport.as_ref().and_then(|t| t.socket.local_addr().ok())
    }

    fn listen(socket: UdpSocket, stop: Arc<AtomicBool>, cache: Arc<RwLock<Cache>>) {
        let mut buf = [0u8; protocol::RECV_BUFFER_LEN];

        while !stop.load(Ordering::Relaxed) {
            let len = match socket.recv(&mut buf) {
                Ok(len) => len,
                Err(e) if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
                {
                    trace!("no dataref responses before read deadline");
                    continue;
                }
                Err(e) => {
                    debug!(error = %e, "dataref receive error");
                    thread::sleep(Duration::from_millis(100));
                    continue;
                }
            };

            let Some(entries) = protocol::parse_response(&buf[..len]) else {
                trace!(len, "dropping datagram with unknown header");
                continue;
            };
            if entries.is_empty() {
                continue;
            }

            let mut cache = cache.write().unwrap();
            let mut applied = 0usize;
            for (index, value) in entries {
                if dictionary::apply(&mut cache.data, index, value) {
                    applied += 1;
                }
            }
            if applied > 0 {
                cache.has_data = true;
                cache.last_received = Some(Instant::now());
            }
        }
    }
}

impl SimConnector for XPlaneAdapter {
    fn open(&self) -> Result<(), ConnectorError> {
        let mut transport = self.transport.lock().unwrap();
        if transport.is_some() {
            return Ok(());
        }

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| ConnectorError::OpenFailed {
            adapter: "X-Plane",
            reason: format!("bind socket: {e}"),
        })?;
        socket
            .connect((self.host.as_str(), self.port))
            .map_err(|e| ConnectorError::OpenFailed {
                adapter: "X-Plane",
                reason: format!("dial {}:{}: {e}", self.host, self.port),
            })?;

        for (index, entry) in dictionary::ENTRIES.iter().enumerate() {
            let datagram = protocol::encode_subscribe(index as u32, SUBSCRIBE_HZ, entry.dataref);
            socket.send(&datagram).map_err(|e| ConnectorError::OpenFailed {
                adapter: "X-Plane",
                reason: format!("subscribe {}: {e}", entry.dataref),
            })?;
        }

        socket
            .set_read_timeout(Some(READ_DEADLINE))
            .map_err(|e| ConnectorError::OpenFailed {
                adapter: "X-Plane",
                reason: format!("set read deadline: {e}"),
            })?;

        let stop = Arc::new(AtomicBool::new(false));
        let listener_socket = socket.try_clone().map_err(|e| ConnectorError::OpenFailed {
            adapter: "X-Plane",
            reason: format!("clone socket: {e}"),
        })?;
        let listener = thread::Builder::new()
            .name("xplane-rref".to_string())
            .spawn({
                let stop = Arc::clone(&stop);
                let cache = Arc::clone(&self.cache);
                move || Self::listen(listener_socket, stop, cache)
            })
            .map_err(|e| ConnectorError::OpenFailed {
                adapter: "X-Plane",
                reason: format!("spawn listener: {e}"),
            })?;

        info!(host = %self.host, port = self.port, datarefs = dictionary::ENTRIES.len(),
            "X-Plane UDP subscribed");

        *transport = Some(Transport {
            socket,
            stop,
            listener: Some(listener),
        });
        Ok(())
    }

    fn close(&self) {
        let Some(mut transport) = self.transport.lock().unwrap().take() else {
            return;
        };

        // Unsubscribe is best-effort: the simulator may already be gone.
        for (index, entry) in dictionary::ENTRIES.iter().enumerate() {
            let datagram = protocol::encode_subscribe(index as u32, 0, entry.dataref);
            if let Err(e) = transport.socket.send(&datagram) {
                warn!(error = %e, dataref = entry.dataref, "unsubscribe failed");
                break;
            }
        }

        transport.stop.store(true, Ordering::Relaxed);
        if let Some(listener) = transport.listener.take() {
            let _ = listener.join();
        }
        info!("X-Plane UDP closed");
    }

    fn name(&self) -> &'static str {
        "X-Plane"
    }

    fn latest(&self) -> Result<FlightData, ConnectorError> {
        let cache = self.cache.read().unwrap();
        if !cache.has_data {
            return Err(ConnectorError::NoData);
        }
        Ok(cache.data.clone())
    }

    fn last_received(&self) -> Option<Instant> {
        self.cache.read().unwrap().last_received
    }
}

impl Drop for XPlaneAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
