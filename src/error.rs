//! Error types for the OMID bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use omid_bridge::{AdEvents, Result};
//!
//! fn record_impression(session: &AdSession) -> Result<()> {
//!     let ad_events = AdEvents::new(session)?;
//!     ad_events.impression_occurred()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Construction | [`Error::Construction`] |
//! | State | [`Error::AlreadyRegistered`], [`Error::SessionNotRunning`], [`Error::IncompatibleService`], [`Error::ImpressionNotOccurred`] |
//! | Arguments | [`Error::InvalidArgument`] |
//! | Payload | [`Error::NotTransmissible`], [`Error::Codec`], [`Error::Json`] |
//! | Transport | [`Error::EndpointMismatch`], [`Error::NoRuntime`], [`Error::ChannelClosed`], [`Error::RequestTimeout`] |
//!
//! Malformed or foreign inbound data is never surfaced as an error: a shared
//! delivery point is expected to carry unrelated traffic.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::MessageId;
use crate::session::FacadeKind;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// Required constructor argument missing or blank.
    ///
    /// Not recoverable locally; propagates to the integrator.
    #[error("Construction error: {message}")]
    Construction {
        /// Description of the missing or invalid argument.
        message: String,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// A facade of this kind is already bound to the session.
    #[error("AdSession already has {kind} registered")]
    AlreadyRegistered {
        /// The facade kind that was registered twice.
        kind: FacadeKind,
    },

    /// Operation requires a running session.
    #[error("Session not started")]
    SessionNotRunning,

    /// The service answered the version handshake with an unusable version.
    #[error("Service version {version} is not compatible")]
    IncompatibleService {
        /// Version reported by the service.
        version: String,
    },

    /// Operation requires the impression to have been signaled.
    #[error("Impression has not occurred")]
    ImpressionNotOccurred,

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Argument failed type or range validation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Payload Errors
    // ========================================================================
    /// Payload holds a direct reference that cannot leave the current context.
    #[error("Arguments of {method} cannot cross a context boundary")]
    NotTransmissible {
        /// Method whose arguments were rejected.
        method: String,
    },

    /// Payload could not be decoded.
    #[error("Codec error: {message}")]
    Codec {
        /// Description of the decoding failure.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The destination endpoint belongs to a different transport kind.
    #[error("Endpoint does not belong to this transport")]
    EndpointMismatch,

    /// A relay listener was requested outside a tokio runtime.
    #[error("Relay listener requires a tokio runtime")]
    NoRuntime,

    /// A request was not answered within its timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: MessageId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a construction error.
    #[inline]
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction {
            message: message.into(),
        }
    }

    /// Creates an already registered error.
    #[inline]
    pub fn already_registered(kind: FacadeKind) -> Self {
        Self::AlreadyRegistered { kind }
    }

    /// Creates an incompatible service error.
    #[inline]
    pub fn incompatible_service(version: impl Into<String>) -> Self {
        Self::IncompatibleService {
            version: version.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not transmissible error.
    #[inline]
    pub fn not_transmissible(method: impl Into<String>) -> Self {
        Self::NotTransmissible {
            method: method.into(),
        }
    }

    /// Creates a codec error.
    #[inline]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a request timeout error. Milliseconds saturate at `u64::MAX`.
    #[inline]
    pub fn request_timeout(request_id: MessageId, limit: Duration) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` for programmer-misuse conditions on session state.
    #[inline]
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered { .. }
                | Self::SessionNotRunning
                | Self::IncompatibleService { .. }
                | Self::ImpressionNotOccurred
        )
    }

    /// Returns `true` if a required constructor argument was missing.
    #[inline]
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::Construction { .. })
    }

    /// Returns `true` if this error came from encoding or decoding a payload.
    #[inline]
    #[must_use]
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::NotTransmissible { .. } | Self::Codec { .. } | Self::Json(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::construction("Context.partner is undefined or null");
        assert_eq!(
            err.to_string(),
            "Construction error: Context.partner is undefined or null"
        );
    }

    #[test]
    fn test_already_registered_display() {
        let err = Error::already_registered(FacadeKind::AdEvents);
        assert_eq!(
            err.to_string(),
            "AdSession already has an ad events instance registered"
        );
    }

    #[test]
    fn test_is_state_error() {
        assert!(Error::SessionNotRunning.is_state_error());
        assert!(Error::ImpressionNotOccurred.is_state_error());
        assert!(Error::already_registered(FacadeKind::MediaEvents).is_state_error());
        assert!(!Error::invalid_argument("volume").is_state_error());
    }

    #[test]
    fn test_is_construction_error() {
        assert!(Error::construction("missing").is_construction_error());
        assert!(!Error::SessionNotRunning.is_construction_error());
    }

    #[test]
    fn test_no_runtime_display() {
        let err = Error::NoRuntime;
        assert_eq!(err.to_string(), "Relay listener requires a tokio runtime");
        assert!(!err.is_state_error());
        assert!(!err.is_payload_error());
    }

    #[test]
    fn test_request_timeout_millis() {
        let err = Error::request_timeout(MessageId::from("guid1"), Duration::from_millis(250));
        assert!(matches!(err, Error::RequestTimeout { timeout_ms: 250, .. }));
        assert_eq!(err.to_string(), "Request guid1 timed out after 250ms");

        let err = Error::request_timeout(MessageId::from("guid2"), Duration::MAX);
        assert!(matches!(err, Error::RequestTimeout { timeout_ms: u64::MAX, .. }));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_payload_error());
    }
}
