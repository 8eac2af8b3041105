//! Message transports.
//!
//! A [`Transport`] moves [`Message`]s between a client and its service. Two
//! forms exist, chosen by discovery:
//!
//! ```text
//! ┌──────────────┐   ExportedHandler (same origin)   ┌──────────────┐
//! │   Client     │──────────────────────────────────►│   Service    │
//! │              │                                   │              │
//! │              │   "omid://" + JSON (cross origin) │              │
//! │              │◄─────────────────────────────────►│              │
//! └──────────────┘     host delivery point           └──────────────┘
//! ```
//!
//! # Delivery
//!
//! | Transport | Serialization | Delivery | Ordering |
//! |-----------|---------------|----------|----------|
//! | [`DirectTransport`] | none | synchronous call | per sender |
//! | [`RelayTransport`] | tagged JSON | later turn, at most once | per sender and channel |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `direct` | Same-context call-through |
//! | `relay` | Tagged delivery across a boundary |

// ============================================================================
// Submodules
// ============================================================================

/// Same-context call-through transport.
pub mod direct;

/// Tagged, filtered transport across a boundary.
pub mod relay;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::identifiers::ContextId;
use crate::protocol::Message;

// ============================================================================
// Re-exports
// ============================================================================

pub use direct::DirectTransport;
pub use relay::RelayTransport;

// ============================================================================
// Types
// ============================================================================

/// Inbound message callback, receiving the message and its sender.
pub type MessageHandler = Arc<dyn Fn(Message, Endpoint) + Send + Sync>;

/// Kind of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Same trust domain, direct references allowed.
    Direct,
    /// Across a boundary, JSON values only.
    Relay,
}

// ============================================================================
// ExportedHandler
// ============================================================================

/// Inbound entry point of a [`DirectTransport`], readable by peers at a
/// well-known key path.
///
/// Handlers compare equal when they are the same entry point.
#[derive(Clone)]
pub struct ExportedHandler {
    inner: MessageHandler,
}

impl ExportedHandler {
    /// Wraps a callback as an entry point.
    #[must_use]
    pub fn new(handler: impl Fn(Message, Endpoint) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// Delivers `message` as if sent by `from`.
    #[inline]
    pub fn deliver(&self, message: Message, from: Endpoint) {
        (self.inner)(message, from);
    }
}

impl PartialEq for ExportedHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ExportedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExportedHandler")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Opaque sender or destination reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Entry point of a direct peer.
    Direct(ExportedHandler),
    /// Delivery point of a relay peer.
    Context(ContextId),
}

impl Endpoint {
    /// Returns the transport kind this endpoint belongs to.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Direct(_) => TransportKind::Direct,
            Self::Context(_) => TransportKind::Relay,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// A channel to one service.
///
/// Transports hold only non-owning references to their peer.
pub trait Transport: Send + Sync {
    /// Sends `message` to `to`, or to the default peer.
    ///
    /// Without a destination and without a default peer the message is
    /// dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::EndpointMismatch`](crate::Error::EndpointMismatch) if `to`
    ///   belongs to another transport kind
    /// - [`Error::NotTransmissible`](crate::Error::NotTransmissible) if a
    ///   relay payload holds a direct reference
    fn send(&self, message: Message, to: Option<&Endpoint>) -> Result<()>;

    /// Replaces the inbound message handler.
    fn set_on_message(&self, handler: MessageHandler);

    /// Returns the transport kind.
    fn kind(&self) -> TransportKind;

    /// Returns `true` for a same-trust-domain transport.
    #[inline]
    fn is_direct(&self) -> bool {
        self.kind() == TransportKind::Direct
    }
}

// ============================================================================
// Tests
// ============================================================================
