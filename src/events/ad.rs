//! Ad lifecycle events.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Arg, VastProperties};
use crate::session::{AdSession, FacadeKind, Registration};

// ============================================================================
// AdEvents
// ============================================================================

/// Signals ad lifecycle events to every verification provider.
///
/// At most one per session.
#[derive(Debug, Clone)]
pub struct AdEvents {
    session: AdSession,
}

impl AdEvents {
    /// Binds ad events to `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the session already has ad
    /// events.
    pub fn new(session: &AdSession) -> Result<Self> {
        match session.register_facade(FacadeKind::AdEvents) {
            Registration::Registered => Ok(Self {
                session: session.clone(),
            }),
            Registration::AlreadyRegistered => Err(Error::already_registered(FacadeKind::AdEvents)),
        }
    }

    /// Records the impression.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the session is running.
    pub fn impression_occurred(&self) -> Result<()> {
        self.session.assert_running()?;
        self.session.impression_occurred();
        debug!("Impression occurred");
        self.session.send_one_way("impressionOccurred", vec![])
    }

    /// Signals that the ad has loaded.
    ///
    /// `vast_properties` is sent for video ads and omitted (as `null`) for
    /// display ads.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the session is running.
    pub fn loaded(&self, vast_properties: Option<VastProperties>) -> Result<()> {
        self.session.assert_running()?;
        let properties = vast_properties
            .map(|properties| properties.to_json())
            .unwrap_or(Value::Null);
        self.session.send_one_way("loaded", vec![Arg::Json(properties)])
    }
}

// ============================================================================
// Tests
// ============================================================================
