//! The data-source boundary.
//!
//! The provider never speaks to a simulator or server directly. It asks a
//! [`Connector`] for a [`SourceHandle`] and reads raw fields by name through
//! it.
//!
//! # Overview
//!
//! - [`Connector`] – opens a handle, or fails when the source is absent.
//! - [`SourceHandle`] – a live link that can be polled for a [`FieldMap`].
//! - [`SimConnector`][crate::sim::SimConnector] – in-process source.
//! - [`HttpConnector`][crate::http::HttpConnector] – network telemetry server.

use std::collections::HashMap;

use async_trait::async_trait;
use pitwall_types::PitwallError;
use serde::{Deserialize, Serialize};

/// A raw value as reported by the data source.
///
/// Anything that is not a scalar (`null`, arrays, objects) lands in
/// [`FieldValue::Other`] so one odd field never fails the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Unavailable through every accessor.
    Other(serde_json::Value),
}

impl FieldValue {
    /// Numeric view. Text is parsed leniently; booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) if f.is_finite() => Some(*f),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Integer view. Floats are accepted only when they hold a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Text view. Blank strings count as unavailable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Raw field values keyed by name. Missing keys are unavailable values.
pub type FieldMap = HashMap<String, FieldValue>;

/// Opens links to a telemetry source.
///
/// # Contract
///
/// * `open` – returns a fresh handle, or [`PitwallError::SourceUnavailable`]
///   when the source is not running or has no active session. It must not
///   panic for an absent source.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable description used in logs, e.g. `http://localhost:3000`.
    fn describe(&self) -> String;

    async fn open(&self) -> Result<Box<dyn SourceHandle>, PitwallError>;
}

/// A live link to a telemetry source.
#[async_trait]
pub trait SourceHandle: Send + Sync {
    /// Read every field the source currently reports.
    async fn poll(&mut self) -> Result<FieldMap, PitwallError>;

    /// Names of the read operations the source exposes.
    async fn tools(&mut self) -> Result<Vec<String>, PitwallError>;

    /// Release the link. Called exactly once by the provider.
    fn close(&mut self);
}
