//! In-process telemetry source for demos and tests.
//!
//! [`SimConnector`] serves a fixed [`FieldMap`] through every handle it
//! opens. It can also pretend the simulator is not running, or that polls
//! fail mid-session, so the provider's degraded paths can run without any
//! external process.
//!
//! # Example
//!
//! ```rust
//! use pitwall_telemetry::{SimConnector, SnapshotProvider};
//!
//! let provider = SnapshotProvider::new(SimConnector::offline());
//! assert!(!provider.is_connected());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pitwall_types::PitwallError;

use crate::mapping::fields;
use crate::source::{Connector, FieldMap, FieldValue, SourceHandle};

/// Names of the read operations every simulated source exposes.
pub const SIM_TOOLS: [&str; 3] = ["get_racing_situation", "get_telemetry", "get_track_info"];

/// Shared count of handles that are open and not yet closed.
#[derive(Debug, Clone, Default)]
pub struct HandleCounter(Arc<AtomicUsize>);

impl HandleCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connector
// ────────────────────────────────────────────────────────────────────────────

/// A simulated data source that always reports the same fields.
pub struct SimConnector {
    fields: FieldMap,
    available: bool,
    failing_polls: bool,
    tools: Vec<String>,
    open: HandleCounter,
}

impl SimConnector {
    /// A running source reporting `fields`.
    pub fn new(fields: FieldMap) -> Self {
        Self {
            fields,
            available: true,
            failing_polls: false,
            tools: SIM_TOOLS.iter().map(|t| t.to_string()).collect(),
            open: HandleCounter::default(),
        }
    }

    /// A source whose every `open` fails, as when the simulator is not running.
    pub fn offline() -> Self {
        Self {
            available: false,
            ..Self::new(FieldMap::new())
        }
    }

    /// A plausible mid-race session.
    pub fn demo() -> Self {
        let pairs: [(&str, FieldValue); 26] = [
            (fields::LAP, 12_i64.into()),
            (fields::POSITION, 4_i64.into()),
            (fields::GAP_TO_LEADER, 6.8.into()),
            (fields::SPEED_KPH, 243.6.into()),
            (fields::SESSION_TIME_REMAINING, 1320.0.into()),
            (fields::RPM, 11_450.0.into()),
            (fields::GEAR, 6_i64.into()),
            (fields::THROTTLE, 1.0.into()),
            (fields::BRAKE, 0.0.into()),
            (fields::STEERING, (-0.04).into()),
            (fields::FUEL_LEVEL, 38.2.into()),
            (fields::TIRE_TEMP[0], 92.4.into()),
            (fields::TIRE_TEMP[1], 97.1.into()),
            (fields::TIRE_TEMP[2], 88.9.into()),
            (fields::TIRE_TEMP[3], 93.5.into()),
            (fields::BRAKE_TEMP[0], 410.0.into()),
            (fields::BRAKE_TEMP[1], 455.0.into()),
            (fields::BRAKE_TEMP[2], 330.0.into()),
            (fields::BRAKE_TEMP[3], 342.0.into()),
            (fields::TRACK_NAME, "Silverstone Circuit".into()),
            (fields::TRACK_LAYOUT, "Grand Prix".into()),
            (fields::TRACK_SURFACE, "asphalt".into()),
            (fields::TRACK_LENGTH_KM, 5.891.into()),
            (fields::WEATHER, "partly cloudy".into()),
            (fields::AIR_TEMP, 19.5.into()),
            (fields::TRACK_TEMP, 31.0.into()),
        ];
        Self::new(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Handles opened by this connector fail every poll.
    pub fn failing_polls(mut self) -> Self {
        self.failing_polls = true;
        self
    }

    /// Replace the advertised tool names.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Counter of handles that are currently open.
    pub fn handle_counter(&self) -> HandleCounter {
        self.open.clone()
    }
}

#[async_trait]
impl Connector for SimConnector {
    fn describe(&self) -> String {
        if self.available {
            "simulated source".to_string()
        } else {
            "simulated source (offline)".to_string()
        }
    }

    async fn open(&self) -> Result<Box<dyn SourceHandle>, PitwallError> {
        if !self.available {
            return Err(PitwallError::SourceUnavailable(
                "simulator is not running".into(),
            ));
        }
        self.open.0.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimHandle {
            fields: self.fields.clone(),
            failing_polls: self.failing_polls,
            tools: self.tools.clone(),
            open: Some(self.open.clone()),
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

struct SimHandle {
    fields: FieldMap,
    failing_polls: bool,
    tools: Vec<String>,
    /// `None` once closed.
    open: Option<HandleCounter>,
}

#[async_trait]
impl SourceHandle for SimHandle {
    async fn poll(&mut self) -> Result<FieldMap, PitwallError> {
        if self.open.is_none() {
            return Err(PitwallError::SourceUnavailable("handle closed".into()));
        }
        if self.failing_polls {
            return Err(PitwallError::SourceUnavailable("session not active".into()));
        }
        Ok(self.fields.clone())
    }

    async fn tools(&mut self) -> Result<Vec<String>, PitwallError> {
        Ok(self.tools.clone())
    }

    fn close(&mut self) {
        if let Some(counter) = self.open.take() {
            counter.0.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_connector_refuses_to_open() {
        let err = SimConnector::offline().open().await.err();
        assert!(matches!(err, Some(PitwallError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn close_is_counted_once() {
        let sim = SimConnector::new(FieldMap::new());
        let counter = sim.handle_counter();
        let mut handle = sim.open().await.unwrap();
        assert_eq!(counter.get(), 1);
        handle.close();
        handle.close();
        drop(handle);
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn closed_handle_stops_serving_fields() {
        let sim = SimConnector::demo();
        let mut handle = sim.open().await.unwrap();
        assert!(!handle.poll().await.unwrap().is_empty());
        handle.close();
        assert!(handle.poll().await.is_err());
    }

    #[tokio::test]
    async fn custom_tools_are_advertised() {
        let sim = SimConnector::demo().with_tools(["get_telemetry"]);
        let mut handle = sim.open().await.unwrap();
        assert_eq!(handle.tools().await.unwrap(), vec!["get_telemetry".to_string()]);
    }
}
