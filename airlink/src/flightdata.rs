//! Unified flight telemetry model.
//!
//! Every simulator adapter normalises its raw output into [`FlightData`],
//! the single snapshot shape shared by the stream engine, the recording
//! store, and the flight reporter. Units are fixed at the adapter boundary:
//! degrees, feet, feet per minute, knots, MHz, inHg, pounds, percent.
//!
//! A default-constructed snapshot is fully defined: every numeric field is
//! zero, every flag false, every string empty. Adapters overwrite what they
//! know and leave the rest at the defaults, so consumers never observe an
//! uninitialised field.

use serde::{Deserialize, Serialize};

/// Number of engine slots in a snapshot. Aircraft with fewer engines carry
/// zeroed entries with `exists == false`.
pub const ENGINE_COUNT: usize = 4;

/// Number of door slots in a snapshot.
pub const DOOR_COUNT: usize = 5;

/// Aircraft position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Indicated altitude in feet MSL.
    pub altitude: f64,
    /// Altitude above ground level in feet.
    #[serde(rename = "altitudeAGL")]
    pub altitude_agl: f64,
}

/// Attitude and velocities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attitude {
    /// Pitch in degrees, nose-up positive.
    pub pitch: f64,
    /// Roll in degrees, right-wing-down positive.
    pub roll: f64,
    /// True heading in degrees.
    pub heading_true: f64,
    /// Magnetic heading in degrees.
    pub heading_mag: f64,
    /// Vertical speed in feet per minute.
    pub vs: f64,
    /// Indicated airspeed in knots.
    pub ias: f64,
    /// True airspeed in knots.
    pub tas: f64,
    /// Ground speed in knots.
    pub gs: f64,
    /// Load factor in g.
    pub g_force: f64,
}

/// One engine slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    /// Whether the airframe has this engine at all.
    pub exists: bool,
    /// Combustion running.
    pub running: bool,
    /// Low-pressure spool speed, percent.
    pub n1: f64,
    /// High-pressure spool speed, percent.
    pub n2: f64,
    /// Throttle lever position, percent.
    pub throttle: f64,
    /// Mixture lever position, percent.
    pub mixture: f64,
    /// Propeller lever position, percent.
    pub propeller: f64,
}

/// Airframe state sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensors {
    pub on_ground: bool,
    pub stall_warning: bool,
    pub overspeed_warning: bool,
    /// Simulation rate multiplier (1.0 = real time).
    pub simulation_rate: f64,
}

/// Transponder operating state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransponderState {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "stand-by")]
    StandBy,
    #[serde(rename = "active")]
    Active,
}

impl TransponderState {
    /// Map a raw simulator state number onto the three categorical values.
    ///
    /// 0 is off, 1 is stand-by, anything else (alt, on, ground, ident
    /// variants) counts as active.
    pub fn from_raw(raw: f64) -> Self {
        match raw as i64 {
            0 => Self::Off,
            1 => Self::StandBy,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::StandBy => "stand-by",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for TransponderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Radio stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Radios {
    /// COM1 active frequency in MHz.
    pub com1: f64,
    /// COM2 active frequency in MHz.
    pub com2: f64,
    /// NAV1 active frequency in MHz.
    pub nav1: f64,
    /// NAV2 active frequency in MHz.
    pub nav2: f64,
    /// NAV1 OBS course in degrees.
    #[serde(rename = "nav1OBS")]
    pub nav1_obs: f64,
    /// NAV2 OBS course in degrees.
    #[serde(rename = "nav2OBS")]
    pub nav2_obs: f64,
    /// Squawk code as entered (e.g. 1200).
    pub transponder_code: u32,
    pub transponder_state: TransponderState,
}

/// Autopilot targets and modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Autopilot {
    pub master: bool,
    /// Heading bug in degrees.
    pub heading: f64,
    /// Altitude target in feet.
    pub altitude: f64,
    /// Vertical speed target in feet per minute.
    pub vs: f64,
    /// Airspeed target in knots.
    pub speed: f64,
    pub approach_hold: bool,
    pub nav_lock: bool,
}

/// Exterior light switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lights {
    pub beacon: bool,
    pub strobe: bool,
    pub landing: bool,
}

/// Primary flight control and high-lift surface positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    /// Elevator deflection, -1 to +1.
    pub elevator: f64,
    /// Aileron deflection, -1 to +1.
    pub aileron: f64,
    /// Rudder deflection, -1 to +1.
    pub rudder: f64,
    /// Flap handle position, percent.
    pub flaps: f64,
    /// Spoiler/speedbrake handle position, percent.
    pub spoilers: f64,
    pub gear_down: bool,
}

/// Simulator clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimTime {
    /// Zulu seconds since midnight.
    pub zulu_time: f64,
    pub zulu_day: u32,
    pub zulu_month: u32,
    pub zulu_year: u32,
    /// Local seconds since midnight.
    pub local_time: f64,
}

/// Auxiliary power unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Apu {
    pub switch_on: bool,
    /// Turbine speed, percent of rated RPM.
    pub rpm: f64,
    pub gen_switch: bool,
    pub gen_active: bool,
}

/// One cabin/cargo door slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    /// Open ratio, 0 (closed) to 1 (fully open).
    pub open: f64,
}

/// Aircraft weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weight {
    /// Total weight in pounds.
    pub total: f64,
    /// Fuel weight in pounds.
    pub fuel: f64,
}

/// One complete telemetry snapshot.
///
/// Timestamp-free by design: the adapter tracks *when* the snapshot was
/// received separately, and the reporter stamps reports at send time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightData {
    pub position: Position,
    pub attitude: Attitude,
    pub engines: [Engine; ENGINE_COUNT],
    pub sensors: Sensors,
    pub radios: Radios,
    pub autopilot: Autopilot,
    /// Altimeter setting in inches of mercury.
    pub altimeter: f64,
    pub lights: Lights,
    pub controls: Controls,
    pub sim_time: SimTime,
    pub apu: Apu,
    pub doors: [Door; DOOR_COUNT],
    pub weight: Weight,
    /// Printable aircraft title, never containing a NUL byte.
    pub aircraft_name: String,
}

/// Decode a NUL-padded byte slice into a string, stopping at the first NUL.
///
/// Bytes past the first zero are padding from fixed-size wire fields and are
/// discarded. Invalid UTF-8 is replaced rather than rejected: aircraft
/// titles come from user-installed content.
pub fn trim_nul_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_fully_defined() {
        let data = FlightData::default();
        assert_eq!(data.engines.len(), ENGINE_COUNT);
        assert_eq!(data.doors.len(), DOOR_COUNT);
        assert_eq!(data.position.latitude, 0.0);
        assert!(!data.engines[0].exists);
        assert_eq!(data.radios.transponder_state, TransponderState::Off);
        assert!(data.aircraft_name.is_empty());
    }

    #[test]
    fn transponder_state_from_raw() {
        assert_eq!(TransponderState::from_raw(0.0), TransponderState::Off);
        assert_eq!(TransponderState::from_raw(1.0), TransponderState::StandBy);
        assert_eq!(TransponderState::from_raw(2.0), TransponderState::Active);
        assert_eq!(TransponderState::from_raw(4.0), TransponderState::Active);
    }

    #[test]
    fn transponder_state_serializes_as_categorical_string() {
        assert_eq!(
            serde_json::to_string(&TransponderState::StandBy).unwrap(),
            "\"stand-by\""
        );
        assert_eq!(
            serde_json::from_str::<TransponderState>("\"active\"").unwrap(),
            TransponderState::Active
        );
    }

    #[test]
    fn snapshot_json_round_trip() {
        let mut data = FlightData::default();
        data.position.latitude = 51.4775;
        data.position.longitude = -0.4614;
        data.engines[0].exists = true;
        data.engines[0].running = true;
        data.engines[0].n1 = 22.5;
        data.radios.transponder_code = 7000;
        data.aircraft_name = "Boeing 737-800".to_string();

        let json = serde_json::to_string(&data).unwrap();
        let back: FlightData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn snapshot_json_uses_camel_case_names() {
        let json = serde_json::to_value(FlightData::default()).unwrap();
        let position = json.get("position").unwrap();
        assert!(position.get("altitudeAGL").is_some());
        assert!(json.get("aircraftName").is_some());
        assert!(json.get("simTime").unwrap().get("zuluTime").is_some());
    }

    #[test]
    fn trim_nul_stops_at_first_zero() {
        let mut bytes = [0u8; 32];
        bytes[..10].copy_from_slice(b"Boeing 737");
        assert_eq!(trim_nul_bytes(&bytes), "Boeing 737");
    }

    #[test]
    fn trim_nul_of_all_zero_slice_is_empty() {
        assert_eq!(trim_nul_bytes(&[0u8; 16]), "");
    }

    #[test]
    fn trim_nul_without_terminator_takes_whole_slice() {
        assert_eq!(trim_nul_bytes(b"A320"), "A320");
    }
}
