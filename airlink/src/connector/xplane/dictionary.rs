//! Dataref subscription dictionary.
//!
//! Maps every RREF subscription index to the dataref path we subscribe with,
//! the unit conversion its raw value needs, and the [`FlightData`] field it
//! lands in. The order of [`ENTRIES`] is the protocol contract: the position
//! in the slice *is* the subscription index sent on the wire and echoed back
//! in responses. Appending is safe; reordering is not.
//!
//! X-Plane exposes dates only as a day-of-year counter, so the three zulu
//! date entries all subscribe to that same dataref and mirror its value;
//! they are not independent fields.

use crate::flightdata::{FlightData, TransponderState, ENGINE_COUNT};

/// Unit conversion applied to a raw dataref value before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convert {
    /// Value is already in snapshot units.
    None,
    /// Metres to feet.
    MetersToFeet,
    /// Metres per second to knots.
    MpsToKnots,
    /// Kilograms to pounds.
    KgToPounds,
    /// Radio frequency in 10 kHz steps to MHz.
    FreqToMhz,
    /// 0..1 ratio to percent.
    RatioToPercent,
}

impl Convert {
    pub fn apply(&self, raw: f32) -> f64 {
        let v = raw as f64;
        match self {
            Self::None => v,
            Self::MetersToFeet => v * 3.28084,
            Self::MpsToKnots => v * 1.94384,
            Self::KgToPounds => v * 2.20462,
            Self::FreqToMhz => v / 100.0,
            Self::RatioToPercent => v * 100.0,
        }
    }
}

/// Snapshot field a subscription feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Latitude,
    Longitude,
    Altitude,
    AltitudeAgl,
    Pitch,
    Roll,
    HeadingTrue,
    HeadingMag,
    VerticalSpeed,
    Ias,
    Tas,
    GroundSpeed,
    GForce,
    EngineCount,
    EngineRunning(usize),
    EngineN1(usize),
    EngineN2(usize),
    EngineThrottle(usize),
    EngineMixture(usize),
    EnginePropeller(usize),
    OnGround,
    StallWarning,
    OverspeedWarning,
    SimulationRate,
    Com1,
    Com2,
    Nav1,
    Nav2,
    Nav1Obs,
    Nav2Obs,
    TransponderCode,
    TransponderMode,
    AutopilotMaster,
    AutopilotHeading,
    AutopilotAltitude,
    AutopilotVs,
    AutopilotSpeed,
    ApproachHold,
    NavLock,
    Altimeter,
    BeaconLight,
    StrobeLight,
    LandingLight,
    Elevator,
    Aileron,
    Rudder,
    Flaps,
    Spoilers,
    GearDown,
    ZuluTime,
    ZuluDay,
    ZuluMonth,
    ZuluYear,
    LocalTime,
    ApuSwitch,
    ApuRpm,
    ApuGenSwitch,
    ApuGenActive,
    DoorOpen(usize),
    WeightTotal,
    WeightFuel,
}

/// One subscription dictionary entry.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub dataref: &'static str,
    pub convert: Convert,
    pub field: Field,
}

const fn entry(dataref: &'static str, convert: Convert, field: Field) -> Entry {
    Entry {
        dataref,
        convert,
        field,
    }
}

/// The subscription dictionary, in wire-index order.
pub static ENTRIES: &[Entry] = &[
    // Position
    entry("sim/flightmodel/position/latitude", Convert::None, Field::Latitude),
    entry("sim/flightmodel/position/longitude", Convert::None, Field::Longitude),
    entry("sim/flightmodel/position/elevation", Convert::MetersToFeet, Field::Altitude),
    entry("sim/flightmodel/position/y_agl", Convert::MetersToFeet, Field::AltitudeAgl),
    // Attitude and velocities
    entry("sim/flightmodel/position/theta", Convert::None, Field::Pitch),
    entry("sim/flightmodel/position/phi", Convert::None, Field::Roll),
    entry("sim/flightmodel/position/psi", Convert::None, Field::HeadingTrue),
    entry("sim/flightmodel/position/magpsi", Convert::None, Field::HeadingMag),
    entry("sim/flightmodel/position/vh_ind_fpm", Convert::None, Field::VerticalSpeed),
    entry("sim/flightmodel/position/indicated_airspeed", Convert::None, Field::Ias),
    entry("sim/flightmodel/position/true_airspeed", Convert::MpsToKnots, Field::Tas),
    entry("sim/flightmodel/position/groundspeed", Convert::MpsToKnots, Field::GroundSpeed),
    entry("sim/flightmodel/forces/g_nrml", Convert::None, Field::GForce),
    // Engines
    entry("sim/aircraft/engine/acf_num_engines", Convert::None, Field::EngineCount),
    entry("sim/flightmodel/engine/ENGN_running[0]", Convert::None, Field::EngineRunning(0)),
    entry("sim/flightmodel/engine/ENGN_running[1]", Convert::None, Field::EngineRunning(1)),
    entry("sim/flightmodel/engine/ENGN_running[2]", Convert::None, Field::EngineRunning(2)),
    entry("sim/flightmodel/engine/ENGN_running[3]", Convert::None, Field::EngineRunning(3)),
    entry("sim/flightmodel/engine/ENGN_N1_[0]", Convert::None, Field::EngineN1(0)),
    entry("sim/flightmodel/engine/ENGN_N1_[1]", Convert::None, Field::EngineN1(1)),
    entry("sim/flightmodel/engine/ENGN_N1_[2]", Convert::None, Field::EngineN1(2)),
    entry("sim/flightmodel/engine/ENGN_N1_[3]", Convert::None, Field::EngineN1(3)),
    entry("sim/flightmodel/engine/ENGN_N2_[0]", Convert::None, Field::EngineN2(0)),
    entry("sim/flightmodel/engine/ENGN_N2_[1]", Convert::None, Field::EngineN2(1)),
    entry("sim/flightmodel/engine/ENGN_N2_[2]", Convert::None, Field::EngineN2(2)),
    entry("sim/flightmodel/engine/ENGN_N2_[3]", Convert::None, Field::EngineN2(3)),
    entry("sim/flightmodel/engine/ENGN_thro[0]", Convert::RatioToPercent, Field::EngineThrottle(0)),
    entry("sim/flightmodel/engine/ENGN_thro[1]", Convert::RatioToPercent, Field::EngineThrottle(1)),
    entry("sim/flightmodel/engine/ENGN_thro[2]", Convert::RatioToPercent, Field::EngineThrottle(2)),
    entry("sim/flightmodel/engine/ENGN_thro[3]", Convert::RatioToPercent, Field::EngineThrottle(3)),
    entry("sim/flightmodel/engine/ENGN_mixt[0]", Convert::RatioToPercent, Field::EngineMixture(0)),
    entry("sim/flightmodel/engine/ENGN_mixt[1]", Convert::RatioToPercent, Field::EngineMixture(1)),
    entry("sim/flightmodel/engine/ENGN_mixt[2]", Convert::RatioToPercent, Field::EngineMixture(2)),
    entry("sim/flightmodel/engine/ENGN_mixt[3]", Convert::RatioToPercent, Field::EngineMixture(3)),
    entry("sim/cockpit2/engine/actuators/prop_ratio[0]", Convert::RatioToPercent, Field::EnginePropeller(0)),
    entry("sim/cockpit2/engine/actuators/prop_ratio[1]", Convert::RatioToPercent, Field::EnginePropeller(1)),
    entry("sim/cockpit2/engine/actuators/prop_ratio[2]", Convert::RatioToPercent, Field::EnginePropeller(2)),
    entry("sim/cockpit2/engine/actuators/prop_ratio[3]", Convert::RatioToPercent, Field::EnginePropeller(3)),
    // Sensors
    entry("sim/flightmodel/failures/onground_any", Convert::None, Field::OnGround),
    entry("sim/cockpit2/annunciators/stall_warning", Convert::None, Field::StallWarning),
    entry("sim/cockpit2/annunciators/overspeed", Convert::None, Field::OverspeedWarning),
    entry("sim/time/sim_speed", Convert::None, Field::SimulationRate),
    // Radios
    entry("sim/cockpit/radios/com1_freq_hz", Convert::FreqToMhz, Field::Com1),
    entry("sim/cockpit/radios/com2_freq_hz", Convert::FreqToMhz, Field::Com2),
    entry("sim/cockpit/radios/nav1_freq_hz", Convert::FreqToMhz, Field::Nav1),
    entry("sim/cockpit/radios/nav2_freq_hz", Convert::FreqToMhz, Field::Nav2),
    entry("sim/cockpit/radios/nav1_obs_degm", Convert::None, Field::Nav1Obs),
    entry("sim/cockpit/radios/nav2_obs_degm", Convert::None, Field::Nav2Obs),
    entry("sim/cockpit/radios/transponder_code", Convert::None, Field::TransponderCode),
    entry("sim/cockpit/radios/transponder_mode", Convert::None, Field::TransponderMode),
    // Autopilot
    entry("sim/cockpit/autopilot/autopilot_mode", Convert::None, Field::AutopilotMaster),
    entry("sim/cockpit/autopilot/heading_mag", Convert::None, Field::AutopilotHeading),
    entry("sim/cockpit/autopilot/altitude", Convert::None, Field::AutopilotAltitude),
    entry("sim/cockpit/autopilot/vertical_velocity", Convert::None, Field::AutopilotVs),
    entry("sim/cockpit/autopilot/airspeed", Convert::None, Field::AutopilotSpeed),
    entry("sim/cockpit2/autopilot/approach_status", Convert::None, Field::ApproachHold),
    entry("sim/cockpit2/autopilot/nav_status", Convert::None, Field::NavLock),
    // Altimeter
    entry("sim/cockpit/misc/barometer_setting", Convert::None, Field::Altimeter),
    // Lights
    entry("sim/cockpit/electrical/beacon_lights_on", Convert::None, Field::BeaconLight),
    entry("sim/cockpit/electrical/strobe_lights_on", Convert::None, Field::StrobeLight),
    entry("sim/cockpit/electrical/landing_lights_on", Convert::None, Field::LandingLight),
    // Controls
    entry("sim/cockpit2/controls/yoke_pitch_ratio", Convert::None, Field::Elevator),
    entry("sim/cockpit2/controls/yoke_roll_ratio", Convert::None, Field::Aileron),
    entry("sim/cockpit2/controls/yoke_heading_ratio", Convert::None, Field::Rudder),
    entry("sim/flightmodel/controls/flaprat", Convert::RatioToPercent, Field::Flaps),
    entry("sim/flightmodel/controls/sbrkrat", Convert::RatioToPercent, Field::Spoilers),
    entry("sim/cockpit/switches/gear_handle_status", Convert::None, Field::GearDown),
    // Sim time (the three date entries mirror one day-of-year dataref)
    entry("sim/time/zulu_time_sec", Convert::None, Field::ZuluTime),
    entry("sim/time/local_date_days", Convert::None, Field::ZuluDay),
    entry("sim/time/local_date_days", Convert::None, Field::ZuluMonth),
    entry("sim/time/local_date_days", Convert::None, Field::ZuluYear),
    entry("sim/time/local_time_sec", Convert::None, Field::LocalTime),
    // APU
    entry("sim/cockpit2/electrical/APU_starter_switch", Convert::None, Field::ApuSwitch),
    entry("sim/cockpit2/electrical/APU_N1_percent", Convert::None, Field::ApuRpm),
    entry("sim/cockpit2/electrical/APU_generator_on", Convert::None, Field::ApuGenSwitch),
    entry("sim/cockpit2/electrical/APU_generator_amps", Convert::None, Field::ApuGenActive),
    // Doors
    entry("sim/flightmodel2/misc/door_open_ratio[0]", Convert::None, Field::DoorOpen(0)),
    entry("sim/flightmodel2/misc/door_open_ratio[1]", Convert::None, Field::DoorOpen(1)),
    entry("sim/flightmodel2/misc/door_open_ratio[2]", Convert::None, Field::DoorOpen(2)),
    entry("sim/flightmodel2/misc/door_open_ratio[3]", Convert::None, Field::DoorOpen(3)),
    entry("sim/flightmodel2/misc/door_open_ratio[4]", Convert::None, Field::DoorOpen(4)),
    // Weight
    entry("sim/flightmodel/weight/m_total", Convert::KgToPounds, Field::WeightTotal),
    entry("sim/flightmodel/weight/m_fuel_total", Convert::KgToPounds, Field::WeightFuel),
];

/// Apply one parsed response entry to a snapshot.
///
/// Returns `false` for indices outside the dictionary, which the listener
/// ignores (X-Plane never sends them unless another client shares the
/// socket).
pub fn apply(data: &mut FlightData, index: u32, raw: f32) -> bool {
    let Some(entry) = ENTRIES.get(index as usize) else {
        return false;
    };
    let v = entry.convert.apply(raw);
    let on = raw != 0.0;

    match entry.field {
        Field::Latitude => data.position.latitude = v,
        Field::Longitude => data.position.longitude = v,
        Field::Altitude => data.position.altitude = v,
        Field::AltitudeAgl => data.position.altitude_agl = v,
        Field::Pitch => data.attitude.pitch = v,
        Field::Roll => data.attitude.roll = v,
        Field::HeadingTrue => data.attitude.heading_true = v,
        Field::HeadingMag => data.attitude.heading_mag = v,
        Field::VerticalSpeed => data.attitude.vs = v,
        Field::Ias => data.attitude.ias = v,
        Field::Tas => data.attitude.tas = v,
        Field::GroundSpeed => data.attitude.gs = v,
        Field::GForce => data.attitude.g_force = v,
        Field::EngineCount => {
            let count = v.max(0.0) as usize;
            for (i, engine) in data.engines.iter_mut().enumerate() {
                engine.exists = i < count.min(ENGINE_COUNT);
            }
        }
        Field::EngineRunning(i) => data.engines[i].running = on,
        Field::EngineN1(i) => data.engines[i].n1 = v,
        Field::EngineN2(i) => data.engines[i].n2 = v,
        Field::EngineThrottle(i) => data.engines[i].throttle = v,
        Field::EngineMixture(i) => data.engines[i].mixture = v,
        Field::EnginePropeller(i) => data.engines[i].propeller = v,
        Field::OnGround => data.sensors.on_ground = on,
        Field::StallWarning => data.sensors.stall_warning = on,
        Field::OverspeedWarning => data.sensors.overspeed_warning = on,
        Field::SimulationRate => data.sensors.simulation_rate = v,
        Field::Com1 => data.radios.com1 = v,
        Field::Com2 => data.radios.com2 = v,
        Field::Nav1 => data.radios.nav1 = v,
        Field::Nav2 => data.radios.nav2 = v,
        Field::Nav1Obs => data.radios.nav1_obs = v,
        Field::Nav2Obs => data.radios.nav2_obs = v,
        Field::TransponderCode => data.radios.transponder_code = v.max(0.0) as u32,
        Field::TransponderMode => {
            data.radios.transponder_state = TransponderState::from_raw(v)
        }
        // autopilot_mode: 0 off, 1 flight director, 2 servos engaged
        Field::AutopilotMaster => data.autopilot.master = v >= 2.0,
        Field::AutopilotHeading => data.autopilot.heading = v,
        Field::AutopilotAltitude => data.autopilot.altitude = v,
        Field::AutopilotVs => data.autopilot.vs = v,
        Field::AutopilotSpeed => data.autopilot.speed = v,
        Field::ApproachHold => data.autopilot.approach_hold = on,
        Field::NavLock => data.autopilot.nav_lock = on,
        Field::Altimeter => data.altimeter = v,
        Field::BeaconLight => data.lights.beacon = on,
        Field::StrobeLight => data.lights.strobe = on,
        Field::LandingLight => data.lights.landing = on,
        Field::Elevator => data.controls.elevator = v,
        Field::Aileron => data.controls.aileron = v,
        Field::Rudder => data.controls.rudder = v,
        Field::Flaps => data.controls.flaps = v,
        Field::Spoilers => data.controls.spoilers = v,
        Field::GearDown => data.controls.gear_down = on,
        Field::ZuluTime => data.sim_time.zulu_time = v,
        Field::ZuluDay => data.sim_time.zulu_day = v.max(0.0) as u32,
        Field::ZuluMonth => data.sim_time.zulu_month = v.max(0.0) as u32,
        Field::ZuluYear => data.sim_time.zulu_year = v.max(0.0) as u32,
        Field::LocalTime => data.sim_time.local_time = v,
        Field::ApuSwitch => data.apu.switch_on = on,
        Field::ApuRpm => data.apu.rpm = v,
        Field::ApuGenSwitch => data.apu.gen_switch = on,
        Field::ApuGenActive => data.apu.gen_active = on,
        Field::DoorOpen(i) => data.doors[i].open = v,
        Field::WeightTotal => data.weight.total = v,
        Field::WeightFuel => data.weight.fuel = v,
    }
    true
}
