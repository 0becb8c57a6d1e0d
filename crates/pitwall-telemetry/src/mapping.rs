//! Raw field names and the field-by-field mapping into snapshots.
//!
//! Each snapshot field is read independently: a missing, mistyped or
//! out-of-range raw value leaves that one field `None` and never fails the
//! whole snapshot.

use pitwall_types::{CornerTemps, RaceSituation, TrackInfo, VehicleTelemetry};

use crate::source::FieldMap;

/// Raw field names understood by the mapping.
pub mod fields {
    pub const LAP: &str = "lap";
    pub const POSITION: &str = "position";
    pub const GAP_TO_LEADER: &str = "gap_to_leader";
    pub const SPEED_KPH: &str = "speed_kph";
    pub const SESSION_TIME_REMAINING: &str = "session_time_remaining";

    pub const RPM: &str = "rpm";
    pub const GEAR: &str = "gear";
    pub const THROTTLE: &str = "throttle";
    pub const BRAKE: &str = "brake";
    pub const STEERING: &str = "steering";
    pub const FUEL_LEVEL: &str = "fuel_level";
    pub const TIRE_TEMP: [&str; 4] = ["tire_temp_lf", "tire_temp_rf", "tire_temp_lr", "tire_temp_rr"];
    pub const BRAKE_TEMP: [&str; 4] =
        ["brake_temp_lf", "brake_temp_rf", "brake_temp_lr", "brake_temp_rr"];

    pub const TRACK_NAME: &str = "track_name";
    pub const TRACK_LAYOUT: &str = "track_layout";
    pub const TRACK_SURFACE: &str = "track_surface";
    pub const TRACK_LENGTH_KM: &str = "track_length_km";
    pub const WEATHER: &str = "weather";
    pub const AIR_TEMP: &str = "air_temp";
    pub const TRACK_TEMP: &str = "track_temp";
}

fn number(raw: &FieldMap, key: &str) -> Option<f64> {
    raw.get(key).and_then(|v| v.as_f64())
}

fn non_negative(raw: &FieldMap, key: &str) -> Option<f64> {
    number(raw, key).filter(|v| *v >= 0.0)
}

fn text(raw: &FieldMap, key: &str) -> Option<String> {
    raw.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn corners(raw: &FieldMap, keys: [&str; 4]) -> CornerTemps {
    CornerTemps {
        lf: number(raw, keys[0]),
        rf: number(raw, keys[1]),
        lr: number(raw, keys[2]),
        rr: number(raw, keys[3]),
    }
}

pub fn race_situation(raw: &FieldMap) -> RaceSituation {
    RaceSituation {
        lap: raw
            .get(fields::LAP)
            .and_then(|v| v.as_i64())
            .and_then(|l| u32::try_from(l).ok()),
        // Sources report 0 before the field is classified.
        position: raw
            .get(fields::POSITION)
            .and_then(|v| v.as_i64())
            .and_then(|p| u32::try_from(p).ok())
            .filter(|p| *p > 0),
        gap_to_leader_s: non_negative(raw, fields::GAP_TO_LEADER),
        speed_kph: non_negative(raw, fields::SPEED_KPH),
        session_time_remaining_s: non_negative(raw, fields::SESSION_TIME_REMAINING),
    }
}

pub fn vehicle_telemetry(raw: &FieldMap) -> VehicleTelemetry {
    VehicleTelemetry {
        rpm: non_negative(raw, fields::RPM),
        gear: raw
            .get(fields::GEAR)
            .and_then(|v| v.as_i64())
            .and_then(|g| i32::try_from(g).ok())
            .filter(|g| *g >= -1),
        throttle: number(raw, fields::THROTTLE).map(|t| t.clamp(0.0, 1.0)),
        brake: number(raw, fields::BRAKE).map(|b| b.clamp(0.0, 1.0)),
        steering: number(raw, fields::STEERING).map(|s| s.clamp(-1.0, 1.0)),
        fuel_level_l: non_negative(raw, fields::FUEL_LEVEL),
        tire_temps_c: corners(raw, fields::TIRE_TEMP),
        brake_temps_c: corners(raw, fields::BRAKE_TEMP),
    }
}

pub fn track_info(raw: &FieldMap) -> TrackInfo {
    TrackInfo {
        name: text(raw, fields::TRACK_NAME),
        layout: text(raw, fields::TRACK_LAYOUT),
        surface: text(raw, fields::TRACK_SURFACE),
        length_km: number(raw, fields::TRACK_LENGTH_KM).filter(|l| *l > 0.0),
        weather: text(raw, fields::WEATHER),
        air_temp_c: number(raw, fields::AIR_TEMP),
        track_temp_c: number(raw, fields::TRACK_TEMP),
    }
}
