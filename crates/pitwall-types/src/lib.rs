//! `pitwall-types` – shared snapshot values and the global error type.
//!
//! Every scalar field is an `Option`. `None` is the one "unknown" sentinel
//! for all field types and renders as the literal string `unknown`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rendering used for any field the data source could not supply.
pub const UNKNOWN: &str = "unknown";

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot rendering
// ─────────────────────────────────────────────────────────────────────────────

/// A point-in-time reading that can list itself as ordered `key: value` pairs.
///
/// The order is fixed per type so prompt text built from it is deterministic.
pub trait Snapshot {
    /// Section heading, e.g. `"Race Situation"`.
    fn title(&self) -> &'static str;

    /// Ordered field listing; absent values render as [`UNKNOWN`].
    fn entries(&self) -> Vec<(&'static str, String)>;
}

fn show<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => UNKNOWN.to_string(),
    }
}

fn show_with<T>(value: &Option<T>, f: impl Fn(&T) -> String) -> String {
    value.as_ref().map(f).unwrap_or_else(|| UNKNOWN.to_string())
}

fn percent(fraction: &f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

fn one_decimal(v: &f64) -> String {
    format!("{v:.1}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Race situation
// ─────────────────────────────────────────────────────────────────────────────

/// Where the car stands in the session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RaceSituation {
    pub lap: Option<u32>,
    /// Overall classified position, 1-based.
    pub position: Option<u32>,
    /// Gap to the race leader in seconds.
    pub gap_to_leader_s: Option<f64>,
    pub speed_kph: Option<f64>,
    pub session_time_remaining_s: Option<f64>,
}

impl Snapshot for RaceSituation {
    fn title(&self) -> &'static str {
        "Race Situation"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("position", show(&self.position)),
            ("lap", show(&self.lap)),
            ("gap_to_leader_s", show_with(&self.gap_to_leader_s, one_decimal)),
            ("speed_kph", show_with(&self.speed_kph, one_decimal)),
            (
                "session_time_remaining_s",
                show_with(&self.session_time_remaining_s, |s| format!("{s:.0}")),
            ),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vehicle telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// One reading per wheel corner, in degrees Celsius.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CornerTemps {
    pub lf: Option<f64>,
    pub rf: Option<f64>,
    pub lr: Option<f64>,
    pub rr: Option<f64>,
}

impl CornerTemps {
    fn render(&self) -> String {
        if self.lf.is_none() && self.rf.is_none() && self.lr.is_none() && self.rr.is_none() {
            return UNKNOWN.to_string();
        }
        format!(
            "LF {} / RF {} / LR {} / RR {}",
            show_with(&self.lf, one_decimal),
            show_with(&self.rf, one_decimal),
            show_with(&self.lr, one_decimal),
            show_with(&self.rr, one_decimal),
        )
    }
}

/// Instantaneous vehicle channels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleTelemetry {
    pub rpm: Option<f64>,
    /// `-1` reverse, `0` neutral.
    pub gear: Option<i32>,
    /// Pedal fraction in `0.0..=1.0`.
    pub throttle: Option<f64>,
    /// Pedal fraction in `0.0..=1.0`.
    pub brake: Option<f64>,
    /// Wheel fraction in `-1.0..=1.0`, positive is right.
    pub steering: Option<f64>,
    pub fuel_level_l: Option<f64>,
    pub tire_temps_c: CornerTemps,
    pub brake_temps_c: CornerTemps,
}

impl Snapshot for VehicleTelemetry {
    fn title(&self) -> &'static str {
        "Telemetry"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("rpm", show_with(&self.rpm, |r| format!("{r:.0}"))),
            (
                "gear",
                show_with(&self.gear, |g| match g {
                    -1 => "R".to_string(),
                    0 => "N".to_string(),
                    n => n.to_string(),
                }),
            ),
            ("throttle", show_with(&self.throttle, percent)),
            ("brake", show_with(&self.brake, percent)),
            ("steering", show_with(&self.steering, |s| format!("{s:.2}"))),
            ("fuel_level_l", show_with(&self.fuel_level_l, one_decimal)),
            ("tire_temps_c", self.tire_temps_c.render()),
            ("brake_temps_c", self.brake_temps_c.render()),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Track info
// ─────────────────────────────────────────────────────────────────────────────

/// Session-level track and weather information; changes rarely in a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: Option<String>,
    pub layout: Option<String>,
    pub surface: Option<String>,
    pub length_km: Option<f64>,
    pub weather: Option<String>,
    pub air_temp_c: Option<f64>,
    pub track_temp_c: Option<f64>,
}

impl Snapshot for TrackInfo {
    fn title(&self) -> &'static str {
        "Track Information"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", show(&self.name)),
            ("layout", show(&self.layout)),
            ("surface", show(&self.surface)),
            ("length_km", show_with(&self.length_km, |l| format!("{l:.2}"))),
            ("weather", show(&self.weather)),
            ("air_temp_c", show_with(&self.air_temp_c, one_decimal)),
            ("track_temp_c", show_with(&self.track_temp_c, one_decimal)),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// The three snapshots taken from a single poll of the data source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RacingInfo {
    pub captured_at: DateTime<Utc>,
    pub situation: RaceSituation,
    pub telemetry: VehicleTelemetry,
    pub track: TrackInfo,
}

impl RacingInfo {
    /// The sections in prompt order.
    pub fn sections(&self) -> [&dyn Snapshot; 3] {
        [&self.situation, &self.telemetry, &self.track]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning configuration, data-source and LLM failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PitwallError {
    /// A required credential was not supplied.
    #[error("missing credential: set the {variable} environment variable")]
    MissingCredential { variable: &'static str },

    /// The telemetry source is absent or returned an unusable reply.
    #[error("telemetry source unavailable: {0}")]
    SourceUnavailable(String),

    /// The chat-completion call failed.
    #[error("completion request failed: {0}")]
    Completion(String),

    #[error("configuration error: {0}")]
    Config(String),
}
