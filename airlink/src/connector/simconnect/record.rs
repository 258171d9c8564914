//! Telemetry record layout and decoder.
//!
//! SimConnect delivers simobject data as one packed struct laid out exactly
//! as registered. Instead of pointer-casting the incoming buffer, the layout
//! is a declarative table: [`RECORD_FIELDS`] drives both the data-definition
//! registration and the decode walk, so the two can never drift apart.
//!
//! Layout rule: the single byte-array field (the aircraft title) must be the
//! last entry. A byte-sized field anywhere else would leave the following
//! doubles misaligned inside the packed record. `record_len` is asserted
//! against this in tests.

use crate::flightdata::{FlightData, TransponderState};

/// Wire type of one registered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// IEEE-754 double, 8 bytes.
    Float64,
    /// Fixed-size NUL-padded byte array.
    Bytes(usize),
}

impl FieldKind {
    pub fn len(&self) -> usize {
        match self {
            Self::Float64 => 8,
            Self::Bytes(n) => *n,
        }
    }
}

/// One field of the composite data definition.
#[derive(Debug)]
pub struct FieldDef {
    /// Simulation variable name.
    pub var: &'static str,
    /// Unit string requested from the SDK (empty for strings).
    pub unit: &'static str,
    pub kind: FieldKind,
}

const fn f(var: &'static str, unit: &'static str) -> FieldDef {
    FieldDef {
        var,
        unit,
        kind: FieldKind::Float64,
    }
}

/// The composite data definition, in wire order.
pub static RECORD_FIELDS: &[FieldDef] = &[
    // Position
    f("PLANE LATITUDE", "degrees"),
    f("PLANE LONGITUDE", "degrees"),
    f("INDICATED ALTITUDE", "feet"),
    f("PLANE ALT ABOVE GROUND", "feet"),
    // Attitude
    f("PLANE PITCH DEGREES", "degrees"),
    f("PLANE BANK DEGREES", "degrees"),
    f("PLANE HEADING DEGREES TRUE", "degrees"),
    f("PLANE HEADING DEGREES MAGNETIC", "degrees"),
    f("VERTICAL SPEED", "feet per second"),
    f("AIRSPEED INDICATED", "knots"),
    f("AIRSPEED TRUE", "knots"),
    f("GROUND VELOCITY", "knots"),
    // Engines 1-4
    f("GENERAL ENG COMBUSTION:1", "Bool"),
    f("TURB ENG N1:1", "Percent"),
    f("TURB ENG N2:1", "Percent"),
    f("GENERAL ENG THROTTLE LEVER POSITION:1", "Percent"),
    f("GENERAL ENG MIXTURE LEVER POSITION:1", "Percent"),
    f("GENERAL ENG PROPELLER LEVER POSITION:1", "Percent"),
    f("GENERAL ENG COMBUSTION:2", "Bool"),
    f("TURB ENG N1:2", "Percent"),
    f("TURB ENG N2:2", "Percent"),
    f("GENERAL ENG THROTTLE LEVER POSITION:2", "Percent"),
    f("GENERAL ENG MIXTURE LEVER POSITION:2", "Percent"),
    f("GENERAL ENG PROPELLER LEVER POSITION:2", "Percent"),
    f("GENERAL ENG COMBUSTION:3", "Bool"),
    f("TURB ENG N1:3", "Percent"),
    f("TURB ENG N2:3", "Percent"),
    f("GENERAL ENG THROTTLE LEVER POSITION:3", "Percent"),
    f("GENERAL ENG MIXTURE LEVER POSITION:3", "Percent"),
    f("GENERAL ENG PROPELLER LEVER POSITION:3", "Percent"),
    f("GENERAL ENG COMBUSTION:4", "Bool"),
    f("TURB ENG N1:4", "Percent"),
    f("TURB ENG N2:4", "Percent"),
    f("GENERAL ENG THROTTLE LEVER POSITION:4", "Percent"),
    f("GENERAL ENG MIXTURE LEVER POSITION:4", "Percent"),
    f("GENERAL ENG PROPELLER LEVER POSITION:4", "Percent"),
    // Sensors
    f("SIM ON GROUND", "Bool"),
    f("STALL WARNING", "Bool"),
    f("OVERSPEED WARNING", "Bool"),
    f("SIMULATION RATE", "number"),
    // Radios
    f("COM ACTIVE FREQUENCY:1", "MHz"),
    f("COM ACTIVE FREQUENCY:2", "MHz"),
    f("NAV ACTIVE FREQUENCY:1", "MHz"),
    f("NAV ACTIVE FREQUENCY:2", "MHz"),
    f("NAV OBS:1", "degrees"),
    f("NAV OBS:2", "degrees"),
    f("TRANSPONDER CODE:1", "number"),
    f("TRANSPONDER STATE:1", "number"),
    // Autopilot
    f("AUTOPILOT MASTER", "Bool"),
    f("AUTOPILOT HEADING LOCK DIR", "degrees"),
    f("AUTOPILOT ALTITUDE LOCK VAR", "feet"),
    f("AUTOPILOT VERTICAL HOLD VAR", "feet/minute"),
    f("AUTOPILOT AIRSPEED HOLD VAR", "knots"),
    f("AUTOPILOT APPROACH HOLD", "Bool"),
    f("AUTOPILOT NAV1 LOCK", "Bool"),
    // Altimeter
    f("KOHLSMAN SETTING HG", "inHg"),
    // Lights
    f("LIGHT BEACON", "Bool"),
    f("LIGHT STROBE", "Bool"),
    f("LIGHT LANDING", "Bool"),
    // Controls
    f("ELEVATOR POSITION", "Position"),
    f("AILERON POSITION", "Position"),
    f("RUDDER POSITION", "Position"),
    f("FLAPS HANDLE PERCENT", "Percent Over 100"),
    f("SPOILERS HANDLE POSITION", "Percent Over 100"),
    f("GEAR HANDLE POSITION", "Bool"),
    // Sim time
    f("ZULU TIME", "seconds"),
    f("ZULU DAY OF MONTH", "number"),
    f("ZULU MONTH OF YEAR", "number"),
    f("ZULU YEAR", "number"),
    f("LOCAL TIME", "seconds"),
    // APU
    f("APU SWITCH", "Bool"),
    f("APU PCT RPM", "Percent"),
    f("APU GENERATOR SWITCH", "Bool"),
    f("APU GENERATOR ACTIVE", "Bool"),
    // Doors
    f("EXIT OPEN:0", "Percent Over 100"),
    f("EXIT OPEN:1", "Percent Over 100"),
    f("EXIT OPEN:2", "Percent Over 100"),
    f("EXIT OPEN:3", "Percent Over 100"),
    f("EXIT OPEN:4", "Percent Over 100"),
    // G-force
    f("G FORCE", "GForce"),
    // Weight
    f("TOTAL WEIGHT", "pounds"),
    f("FUEL TOTAL QUANTITY WEIGHT", "pounds"),
    // Engine count
    f("NUMBER OF ENGINES", "number"),
    // Aircraft title; must stay last (see module docs)
    FieldDef {
        var: "TITLE",
        unit: "",
        kind: FieldKind::Bytes(256),
    },
];

/// Total record size in bytes.
pub fn record_len() -> usize {
    RECORD_FIELDS.iter().map(|f| f.kind.len()).sum()
}

/// A decoded record: doubles in [`RECORD_FIELDS`] order plus the trimmed
/// title string.
#[derive(Debug)]
pub struct RawRecord {
    values: Vec<f64>,
    title: String,
}

/// Decode a raw simobject data buffer against the layout table.
///
/// Returns `None` when the buffer is shorter than the registered record;
/// extra trailing bytes (SDK padding) are ignored.
pub fn decode(buf: &[u8]) -> Option<RawRecord> {
    if buf.len() < record_len() {
        return None;
    }

    let mut values = Vec::with_capacity(RECORD_FIELDS.len());
    let mut title = String::new();
    let mut offset = 0usize;
    for field in RECORD_FIELDS {
        match field.kind {
            FieldKind::Float64 => {
                let raw: [u8; 8] = buf[offset..offset + 8].try_into().unwrap();
                values.push(f64::from_le_bytes(raw));
            }
            FieldKind::Bytes(n) => {
                title = crate::flightdata::trim_nul_bytes(&buf[offset..offset + n]);
            }
        }
        offset += field.kind.len();
    }

    Some(RawRecord { values, title })
}

/// Walks the decoded doubles in layout order.
struct Cursor<'a> {
    values: &'a [f64],
    pos: usize,
}

impl Cursor<'_> {
    fn next(&mut self) -> f64 {
        let v = self.values[self.pos];
        self.pos += 1;
        v
    }

    fn next_bool(&mut self) -> bool {
        self.next() != 0.0
    }

    fn next_u32(&mut self) -> u32 {
        self.next().max(0.0) as u32
    }
}

/// Convert a decoded record into the unified snapshot.
///
/// Unit fixes applied here: vertical speed arrives in feet per second and is
/// scaled to feet per minute; flap/spoiler handles arrive as 0..1 and are
/// scaled to percent; door ratios stay 0..1.
pub fn to_flight_data(record: &RawRecord) -> FlightData {
    let mut c = Cursor {
        values: &record.values,
        pos: 0,
    };
    let mut data = FlightData::default();

    data.position.latitude = c.next();
    data.position.longitude = c.next();
    data.position.altitude = c.next();
    data.position.altitude_agl = c.next();

    data.attitude.pitch = c.next();
    data.attitude.roll = c.next();
    data.attitude.heading_true = c.next();
    data.attitude.heading_mag = c.next();
    data.attitude.vs = c.next() * 60.0;
    data.attitude.ias = c.next();
    data.attitude.tas = c.next();
    data.attitude.gs = c.next();

    for engine in data.engines.iter_mut() {
        engine.running = c.next_bool();
        engine.n1 = c.next();
        engine.n2 = c.next();
        engine.throttle = c.next();
        engine.mixture = c.next();
        engine.propeller = c.next();
    }

    data.sensors.on_ground = c.next_bool();
    data.sensors.stall_warning = c.next_bool();
    data.sensors.overspeed_warning = c.next_bool();
    data.sensors.simulation_rate = c.next();

    data.radios.com1 = c.next();
    data.radios.com2 = c.next();
    data.radios.nav1 = c.next();
    data.radios.nav2 = c.next();
    data.radios.nav1_obs = c.next();
    data.radios.nav2_obs = c.next();
    data.radios.transponder_code = c.next_u32();
    data.radios.transponder_state = TransponderState::from_raw(c.next());

    data.autopilot.master = c.next_bool();
    data.autopilot.heading = c.next();
    data.autopilot.altitude = c.next();
    data.autopilot.vs = c.next();
    data.autopilot.speed = c.next();
    data.autopilot.approach_hold = c.next_bool();
    data.autopilot.nav_lock = c.next_bool();

    data.altimeter = c.next();

    data.lights.beacon = c.next_bool();
    data.lights.strobe = c.next_bool();
    data.lights.landing = c.next_bool();

    data.controls.elevator = c.next();
    data.controls.aileron = c.next();
    data.controls.rudder = c.next();
    data.controls.flaps = c.next() * 100.0;
    data.controls.spoilers = c.next() * 100.0;
    data.controls.gear_down = c.next_bool();

    data.sim_time.zulu_time = c.next();
    data.sim_time.zulu_day = c.next_u32();
    data.sim_time.zulu_month = c.next_u32();
    data.sim_time.zulu_year = c.next_u32();
    data.sim_time.local_time = c.next();

    data.apu.switch_on = c.next_bool();
    data.apu.rpm = c.next();
    data.apu.gen_switch = c.next_bool();
    data.apu.gen_active = c.next_bool();

    for door in data.doors.iter_mut() {
        door.open = c.next();
    }

    data.attitude.g_force = c.next();

    data.weight.total = c.next();
    data.weight.fuel = c.next();

    let engine_count = c.next_u32() as usize;
    for (i, engine) in data.engines.iter_mut().enumerate() {
        engine.exists = i < engine_count;
    }

    data.aircraft_name = record.title.clone();
    data
}

/// Build a record buffer from doubles + title. The mock link and the decode
/// tests use this to play the SDK side.
#[cfg(test)]
pub(crate) fn encode_record(values: &[f64], title: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(record_len());
    let mut value_iter = values.iter();
    for field in RECORD_FIELDS {
        match field.kind {
            FieldKind::Float64 => {
                let v = value_iter.next().copied().unwrap_or(0.0);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            FieldKind::Bytes(n) => {
                let mut bytes = vec![0u8; n];
                let title = title.as_bytes();
                bytes[..title.len().min(n)].copy_from_slice(&title[..title.len().min(n)]);
                buf.extend_from_slice(&bytes);
            }
        }
    }
    buf
}

#[cfg(test)]
pub(crate) fn double_count() -> usize {
    RECORD_FIELDS
        .iter()
        .filter(|f| f.kind == FieldKind::Float64)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_array_field_is_last() {
        let position = RECORD_FIELDS
            .iter()
            .position(|f| matches!(f.kind, FieldKind::Bytes(_)))
            .expect("layout has a title field");
        assert_eq!(position, RECORD_FIELDS.len() - 1);
    }

    #[test]
    fn record_len_matches_field_table() {
        assert_eq!(record_len(), double_count() * 8 + 256);
    }

    #[test]
    fn decode_rejects_short_buffers() {
        assert!(decode(&vec![0u8; record_len() - 1]).is_none());
        assert!(decode(&[]).is_none());
    }

    #[test]
    fn decode_tolerates_trailing_padding() {
        let mut buf = encode_record(&[], "");
        buf.extend_from_slice(&[0xAA; 16]);
        assert!(decode(&buf).is_some());
    }

    #[test]
    fn round_trip_basic_fields() {
        let mut values = vec![0.0; double_count()];
        values[0] = 51.4775; // latitude
        values[1] = -0.4614; // longitude
        values[2] = 83.0; // altitude
        values[8] = 10.0; // vertical speed, fps

        let buf = encode_record(&values, "Boeing 737-800");
        let record = decode(&buf).unwrap();
        let data = to_flight_data(&record);

        assert!((data.position.latitude - 51.4775).abs() < 1e-9);
        assert!((data.position.longitude - (-0.4614)).abs() < 1e-9);
        assert!((data.position.altitude - 83.0).abs() < 1e-9);
        assert_eq!(data.attitude.vs, 600.0); // fps scaled to fpm
        assert_eq!(data.aircraft_name, "Boeing 737-800");
    }

    #[test]
    fn engine_exists_derives_from_engine_count() {
        let mut values = vec![0.0; double_count()];
        // NUMBER OF ENGINES is the last double
        *values.last_mut().unwrap() = 2.0;

        let data = to_flight_data(&decode(&encode_record(&values, "")).unwrap());
        assert_eq!(
            data.engines.map(|e| e.exists),
            [true, true, false, false]
        );
    }

    #[test]
    fn handle_ratios_scale_to_percent() {
        let mut values = vec![0.0; double_count()];
        // Controls start after: 4 pos + 8 attitude + 24 engines + 4 sensors
        // + 8 radios + 7 autopilot + 1 altimeter + 3 lights = 59
        values[59 + 3] = 0.5; // flaps handle
        values[59 + 4] = 1.0; // spoilers handle

        let data = to_flight_data(&decode(&encode_record(&values, "")).unwrap());
        assert_eq!(data.controls.flaps, 50.0);
        assert_eq!(data.controls.spoilers, 100.0);
    }

    #[test]
    fn title_trimmed_at_first_nul() {
        let buf = encode_record(&vec![0.0; double_count()], "Cessna 172");
        let record = decode(&buf).unwrap();
        assert_eq!(record.title, "Cessna 172");
        assert!(!record.title.contains('\0'));
    }

    #[test]
    fn transponder_state_decodes_categorically() {
        let mut values = vec![0.0; double_count()];
        // Radios start at 4 + 8 + 24 + 4 = 40; transponder state is the 8th
        values[40 + 7] = 1.0;
        let data = to_flight_data(&decode(&encode_record(&values, "")).unwrap());
        assert_eq!(data.radios.transponder_state, TransponderState::StandBy);
    }
}
