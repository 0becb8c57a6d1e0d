//! [`SnapshotProvider`] – the connection state machine over a data source.
//!
//! The provider is either disconnected or holds exactly one live
//! [`SourceHandle`]. Live reads are only reachable through the handle stored
//! in the connected variant, so a disconnected provider can do nothing but
//! hand out all-default snapshots.
//!
//! Read operations never fail. When the source is absent or a poll errors,
//! the affected snapshot comes back with every field `None` and a warning is
//! logged; the caller keeps running and may reconnect later.
//!
//! # Example
//!
//! ```rust
//! use pitwall_telemetry::{SimConnector, SnapshotProvider};
//!
//! # tokio_test_block_on(async {
//! let mut provider = SnapshotProvider::new(SimConnector::demo());
//! {
//!     let mut session = provider.session().await;
//!     let situation = session.race_situation().await;
//!     assert!(situation.lap.is_some());
//! } // session dropped: provider disconnected
//! assert!(!provider.is_connected());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use std::ops::{Deref, DerefMut};

use chrono::Utc;
use pitwall_types::{RaceSituation, RacingInfo, TrackInfo, VehicleTelemetry};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::mapping;
use crate::source::{Connector, FieldMap, SourceHandle};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

enum Link {
    Disconnected,
    Connected {
        session_id: Uuid,
        handle: Box<dyn SourceHandle>,
    },
}

/// Single-caller snapshot provider over one [`Connector`].
pub struct SnapshotProvider {
    connector: Box<dyn Connector>,
    link: Link,
}

impl SnapshotProvider {
    /// Create a disconnected provider.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_boxed(Box::new(connector))
    }

    pub fn from_boxed(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            link: Link::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connected { .. } => ConnectionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Id of the current connected session, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match &self.link {
            Link::Connected { session_id, .. } => Some(*session_id),
            Link::Disconnected => None,
        }
    }

    /// Description of the underlying source, for display.
    pub fn source_description(&self) -> String {
        self.connector.describe()
    }

    /// Try to reach the data source.
    ///
    /// Returns `true` when connected (including when already connected) and
    /// `false` when the source is absent; the state is then unchanged.
    pub async fn connect(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }
        match self.connector.open().await {
            Ok(handle) => {
                let session_id = Uuid::new_v4();
                info!(%session_id, source = %self.connector.describe(), "telemetry source connected");
                self.link = Link::Connected { session_id, handle };
                true
            }
            Err(e) => {
                warn!(source = %self.connector.describe(), error = %e, "telemetry source not available; serving defaults");
                false
            }
        }
    }

    /// Release the handle. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if let Link::Connected {
            session_id,
            mut handle,
        } = std::mem::replace(&mut self.link, Link::Disconnected)
        {
            handle.close();
            info!(%session_id, "telemetry source disconnected");
        }
    }

    /// Connect and return a guard that disconnects when dropped.
    ///
    /// The guard is returned even when the source is absent so callers can
    /// keep running on defaults; check [`Session::is_live`].
    pub async fn session(&mut self) -> Session<'_> {
        let live = self.connect().await;
        Session {
            provider: self,
            live,
        }
    }

    /// One poll of the source; empty when disconnected or on error.
    async fn poll(&mut self) -> FieldMap {
        let Link::Connected { session_id, handle } = &mut self.link else {
            return FieldMap::new();
        };
        match handle.poll().await {
            Ok(fields) => {
                debug!(%session_id, fields = fields.len(), "polled telemetry source");
                fields
            }
            Err(e) => {
                warn!(%session_id, error = %e, "telemetry poll failed; serving defaults");
                FieldMap::new()
            }
        }
    }

    pub async fn race_situation(&mut self) -> RaceSituation {
        mapping::race_situation(&self.poll().await)
    }

    pub async fn vehicle_telemetry(&mut self) -> VehicleTelemetry {
        mapping::vehicle_telemetry(&self.poll().await)
    }

    pub async fn track_info(&mut self) -> TrackInfo {
        mapping::track_info(&self.poll().await)
    }

    /// All three snapshots from a single poll.
    pub async fn racing_info(&mut self) -> RacingInfo {
        let raw = self.poll().await;
        RacingInfo {
            captured_at: Utc::now(),
            situation: mapping::race_situation(&raw),
            telemetry: mapping::vehicle_telemetry(&raw),
            track: mapping::track_info(&raw),
        }
    }

    /// Read operations the source exposes; empty when disconnected.
    pub async fn available_tools(&mut self) -> Vec<String> {
        let Link::Connected { session_id, handle } = &mut self.link else {
            return Vec::new();
        };
        handle.tools().await.unwrap_or_else(|e| {
            warn!(%session_id, error = %e, "listing source tools failed");
            Vec::new()
        })
    }
}

impl Drop for SnapshotProvider {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scoped session
// ─────────────────────────────────────────────────────────────────────────────

/// RAII guard over a connected provider.
///
/// Dropping the guard calls [`SnapshotProvider::disconnect`], so the handle
/// is released on every exit path, including early returns and `?`.
pub struct Session<'a> {
    provider: &'a mut SnapshotProvider,
    live: bool,
}

impl Session<'_> {
    /// `true` when the connect at the start of the session succeeded.
    pub fn is_live(&self) -> bool {
        self.live
    }
}

impl Deref for Session<'_> {
    type Target = SnapshotProvider;

    fn deref(&self) -> &SnapshotProvider {
        self.provider
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut SnapshotProvider {
        self.provider
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.provider.disconnect();
    }
}
