//! Position-report wire shape.
//!
//! Every numeric leaf is wrapped as `{value, unit}` so the wire format is
//! self-describing; booleans and categorical strings go bare. The JSON field
//! names are part of the backend contract; change them only with the
//! backend.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::flightdata::FlightData;

/// A self-describing numeric value.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement<T: Serialize> {
    pub value: T,
    pub unit: &'static str,
}

fn m<T: Serialize>(value: T, unit: &'static str) -> Measurement<T> {
    Measurement { value, unit }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPosition {
    pub latitude: Measurement<f64>,
    pub longitude: Measurement<f64>,
    pub altitude: Measurement<f64>,
    pub altitude_agl: Measurement<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAttitude {
    pub pitch: Measurement<f64>,
    pub roll: Measurement<f64>,
    pub heading_true: Measurement<f64>,
    pub heading_mag: Measurement<f64>,
    pub vs: Measurement<f64>,
    pub ias: Measurement<f64>,
    pub tas: Measurement<f64>,
    pub gs: Measurement<f64>,
    pub g_force: Measurement<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEngine {
    pub exists: bool,
    pub running: bool,
    pub n1: Measurement<f64>,
    pub n2: Measurement<f64>,
    pub throttle: Measurement<f64>,
    pub mixture: Measurement<f64>,
    pub propeller: Measurement<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSensors {
    pub on_ground: bool,
    pub stall_warning: bool,
    pub overspeed_warning: bool,
    pub simulation_rate: Measurement<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRadios {
    pub com1: Measurement<f64>,
    pub com2: Measurement<f64>,
    pub nav1: Measurement<f64>,
    pub nav2: Measurement<f64>,
    pub nav1_obs: Measurement<f64>,
    pub nav2_obs: Measurement<f64>,
    pub transponder_code: Measurement<u32>,
    pub transponder_state: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAutopilot {
    pub master: bool,
    pub heading: Measurement<f64>,
    pub altitude: Measurement<f64>,
    pub vs: Measurement<f64>,
    pub speed: Measurement<f64>,
    pub approach_hold: bool,
    pub nav_lock: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLights {
    pub beacon: bool,
    pub strobe: bool,
    pub landing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportControls {
    pub elevator: Measurement<f64>,
    pub aileron: Measurement<f64>,
    pub rudder: Measurement<f64>,
    pub flaps: Measurement<f64>,
    pub spoilers: Measurement<f64>,
    pub gear_down: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportApu {
    pub switch_on: bool,
    pub rpm: Measurement<f64>,
    pub gen_switch: bool,
    pub gen_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoor {
    pub open: Measurement<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSimTime {
    pub zulu_hour: Measurement<i64>,
    pub zulu_min: Measurement<i64>,
    pub zulu_sec: Measurement<i64>,
    pub zulu_day: Measurement<u32>,
    pub zulu_month: Measurement<u32>,
    pub zulu_year: Measurement<u32>,
    pub local_time: Measurement<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportWeight {
    pub total: Measurement<f64>,
    pub fuel: Measurement<f64>,
}

/// One position report, POSTed to `/api/acars/position`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub callsign: String,
    pub departure: String,
    pub arrival: String,
    /// RFC 3339 UTC wall-clock time at report construction.
    pub timestamp: String,
    /// Name of the adapter the snapshot came from.
    pub simulator: String,
    pub acars_version: &'static str,
    pub elapsed_time: Measurement<f64>,
    pub position: ReportPosition,
    pub attitude: ReportAttitude,
    pub engines: Vec<ReportEngine>,
    pub sensors: ReportSensors,
    pub radios: ReportRadios,
    pub autopilot: ReportAutopilot,
    pub altimeter: Measurement<f64>,
    pub lights: ReportLights,
    pub controls: ReportControls,
    pub apu: ReportApu,
    pub doors: Vec<ReportDoor>,
    pub sim_time: ReportSimTime,
    pub aircraft_name: String,
    pub weight: ReportWeight,
}

/// Assemble a report from a snapshot and the active flight's identity.
pub fn build_report(
    callsign: &str,
    departure: &str,
    arrival: &str,
    elapsed_secs: f64,
    simulator: &str,
    d: &FlightData,
) -> PositionReport {
    let zulu_sec = d.sim_time.zulu_time as i64;

    PositionReport {
        callsign: callsign.to_string(),
        departure: departure.to_string(),
        arrival: arrival.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        simulator: simulator.to_string(),
        acars_version: crate::VERSION,
        elapsed_time: m(elapsed_secs, "s"),
        position: ReportPosition {
            latitude: m(d.position.latitude, "deg"),
            longitude: m(d.position.longitude, "deg"),
            altitude: m(d.position.altitude, "ft"),
            altitude_agl: m(d.position.altitude_agl, "ft"),
        },
        attitude: ReportAttitude {
            pitch: m(d.attitude.pitch, "deg"),
            roll: m(d.attitude.roll, "deg"),
            heading_true: m(d.attitude.heading_true, "deg"),
            heading_mag: m(d.attitude.heading_mag, "deg"),
            vs: m(d.attitude.vs, "fpm"),
            ias: m(d.attitude.ias, "kts"),
            tas: m(d.attitude.tas, "kts"),
            gs: m(d.attitude.gs, "kts"),
            g_force: m(d.attitude.g_force, "G"),
        },
        engines: d
            .engines
            .iter()
            .map(|e| ReportEngine {
                exists: e.exists,
                running: e.running,
                n1: m(e.n1, "%"),
                n2: m(e.n2, "%"),
                throttle: m(e.throttle, "%"),
                mixture: m(e.mixture, "%"),
                propeller: m(e.propeller, "%"),
            })
            .collect(),
        sensors: ReportSensors {
            on_ground: d.sensors.on_ground,
            stall_warning: d.sensors.stall_warning,
            overspeed_warning: d.sensors.overspeed_warning,
            simulation_rate: m(d.sensors.simulation_rate, "x"),
        },
        radios: ReportRadios {
            com1: m(d.radios.com1, "MHz"),
            com2: m(d.radios.com2, "MHz"),
            nav1: m(d.radios.nav1, "MHz"),
            nav2: m(d.radios.nav2, "MHz"),
            nav1_obs: m(d.radios.nav1_obs, "deg"),
            nav2_obs: m(d.radios.nav2_obs, "deg"),
            transponder_code: m(d.radios.transponder_code, ""),
            transponder_state: d.radios.transponder_state.as_str(),
        },
        autopilot: ReportAutopilot {
            master: d.autopilot.master,
            heading: m(d.autopilot.heading, "deg"),
            altitude: m(d.autopilot.altitude, "ft"),
            vs: m(d.autopilot.vs, "fpm"),
            speed: m(d.autopilot.speed, "kts"),
            approach_hold: d.autopilot.approach_hold,
            nav_lock: d.autopilot.nav_lock,
        },
        altimeter: m(d.altimeter, "inHg"),
        lights: ReportLights {
            beacon: d.lights.beacon,
            strobe: d.lights.strobe,
            landing: d.lights.landing,
        },
        controls: ReportControls {
            elevator: m(d.controls.elevator, "position"),
            aileron: m(d.controls.aileron, "position"),
            rudder: m(d.controls.rudder, "position"),
            flaps: m(d.controls.flaps, "%"),
            spoilers: m(d.controls.spoilers, "%"),
            gear_down: d.controls.gear_down,
        },
        apu: ReportApu {
            switch_on: d.apu.switch_on,
            rpm: m(d.apu.rpm, "%"),
            gen_switch: d.apu.gen_switch,
            gen_active: d.apu.gen_active,
        },
        doors: d
            .doors
            .iter()
            .map(|door| ReportDoor {
                open: m(door.open, "ratio"),
            })
            .collect(),
        sim_time: ReportSimTime {
            zulu_hour: m(zulu_sec / 3600, "h"),
            zulu_min: m((zulu_sec % 3600) / 60, "min"),
            zulu_sec: m(zulu_sec % 60, "s"),
            zulu_day: m(d.sim_time.zulu_day, ""),
            zulu_month: m(d.sim_time.zulu_month, ""),
            zulu_year: m(d.sim_time.zulu_year, ""),
            local_time: m(d.sim_time.local_time, "s"),
        },
        aircraft_name: d.aircraft_name.clone(),
        weight: ReportWeight {
            total: m(d.weight.total, "lbs"),
            fuel: m(d.weight.fuel, "lbs"),
        },
    }
}
