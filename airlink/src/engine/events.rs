//! Event sink contract between the core and its single UI consumer.
//!
//! The core is not a general pub/sub bus: one co-resident consumer receives
//! every event through an injected [`EventSink`]. Implementations must not
//! block; the stream engine and the flight reporter emit from their hot
//! loops.

use tokio::sync::mpsc;

use crate::flightdata::FlightData;

/// Events emitted by the stream engine and the flight reporter.
#[derive(Debug, Clone)]
pub enum Event {
    /// A fresh snapshot; emitted on every successful engine tick.
    FlightData(FlightData),
    /// Adapter name when connected, empty string when disconnected.
    ConnectionState(String),
    /// Recording armed or disarmed.
    RecordingState(bool),
    /// Flight lifecycle state, `"idle"` or `"active"`.
    FlightState(&'static str),
}

impl Event {
    /// Event-bus topic name for this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FlightData(_) => "flight-data",
            Self::ConnectionState(_) => "connection-state",
            Self::RecordingState(_) => "recording-state",
            Self::FlightState(_) => "flight-state",
        }
    }
}

/// Where core events go. Implementations are thread-safe and non-blocking.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that forwards events over an unbounded channel. The UI side (or a
/// test) drains the receiver at its own pace.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        // A gone receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Sink that drops everything. Handy for headless exports.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_bus_topics() {
        assert_eq!(Event::FlightData(FlightData::default()).name(), "flight-data");
        assert_eq!(
            Event::ConnectionState(String::new()).name(),
            "connection-state"
        );
        assert_eq!(Event::RecordingState(true).name(), "recording-state");
        assert_eq!(Event::FlightState("idle").name(), "flight-state");
    }

    #[test]
    fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(Event::RecordingState(true));
        sink.emit(Event::ConnectionState("X-Plane".to_string()));

        assert!(matches!(rx.try_recv().unwrap(), Event::RecordingState(true)));
        match rx.try_recv().unwrap() {
            Event::ConnectionState(name) => assert_eq!(name, "X-Plane"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(Event::RecordingState(false));
    }
}
