//! `pitwall-telemetry` – the telemetry snapshot provider.
//!
//! Manages a single logical connection to a live or simulated racing data
//! source and turns its raw fields into [`pitwall_types`] snapshots.
//!
//! # Modules
//!
//! - [`source`] – the [`Connector`] / [`SourceHandle`] boundary and raw
//!   [`FieldMap`] values.
//! - [`mapping`] – raw field names and the field-by-field snapshot mapping.
//! - [`provider`] – [`SnapshotProvider`], the `Disconnected` / `Connected`
//!   state machine, and the scoped [`Session`] guard.
//! - [`sim`] – [`SimConnector`], an in-process source for demos and tests.
//! - [`http`] – [`HttpConnector`], a telemetry server reached over HTTP.

pub mod http;
pub mod mapping;
pub mod provider;
pub mod sim;
pub mod source;

pub use http::HttpConnector;
pub use provider::{ConnectionState, Session, SnapshotProvider};
pub use sim::SimConnector;
pub use source::{Connector, FieldMap, FieldValue, SourceHandle};
