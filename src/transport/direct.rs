//! Same-context call-through transport.
//!
//! Sending invokes the peer's [`ExportedHandler`] synchronously on the
//! caller's stack. Messages are not serialized, so payloads may carry
//! [`ElementHandle`](crate::protocol::ElementHandle)s.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::{Endpoint, ExportedHandler, MessageHandler, Transport, TransportKind};

// ============================================================================
// Types
// ============================================================================

/// Slot holding the inbound handler.
type HandlerSlot = Mutex<Option<MessageHandler>>;

// ============================================================================
// DirectTransport
// ============================================================================

/// Transport calling straight into a peer's entry point.
pub struct DirectTransport {
    /// Inbound handler (shared with the exported entry point).
    on_message: Arc<HandlerSlot>,
    /// Entry point handed to peers.
    exported: ExportedHandler,
    /// Default destination.
    peer: Mutex<Option<ExportedHandler>>,
}

impl DirectTransport {
    /// Creates a transport without a default peer.
    #[must_use]
    pub fn new() -> Self {
        let on_message: Arc<HandlerSlot> = Arc::new(Mutex::new(None));
        let slot = Arc::downgrade(&on_message);

        Self {
            on_message,
            exported: ExportedHandler::new(move |message, from| {
                Self::dispatch(&slot, message, from);
            }),
            peer: Mutex::new(None),
        }
    }

    /// Creates a transport sending to `peer` by default.
    #[must_use]
    pub fn connect(peer: ExportedHandler) -> Self {
        let transport = Self::new();
        transport.set_peer(peer);
        transport
    }

    /// Replaces the default destination.
    pub fn set_peer(&self, peer: ExportedHandler) {
        *self.peer.lock() = Some(peer);
    }

    /// Returns the entry point peers use to reach this transport.
    #[inline]
    #[must_use]
    pub fn exported_handler(&self) -> ExportedHandler {
        self.exported.clone()
    }

    /// Hands an inbound message to the current handler.
    ///
    /// The handler is cloned out of the slot so it may send or replace
    /// itself while running.
    fn dispatch(slot: &Weak<HandlerSlot>, message: Message, from: Endpoint) {
        let Some(slot) = slot.upgrade() else {
            trace!(method = %message.method, "Direct transport dropped, message discarded");
            return;
        };
        let handler = slot.lock().clone();
        match handler {
            Some(handler) => handler(message, from),
            None => trace!(method = %message.method, "No inbound handler"),
        }
    }
}

impl Default for DirectTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for DirectTransport {
    fn send(&self, message: Message, to: Option<&Endpoint>) -> Result<()> {
        let target = match to {
            Some(Endpoint::Direct(handler)) => handler.clone(),
            Some(Endpoint::Context(_)) => return Err(Error::EndpointMismatch),
            None => match self.peer.lock().clone() {
                Some(peer) => peer,
                None => {
                    trace!(method = %message.method, "No direct peer, message dropped");
                    return Ok(());
                }
            },
        };

        trace!(id = %message.id, method = %message.method, "Direct send");
        target.deliver(message, Endpoint::Direct(self.exported.clone()));
        Ok(())
    }

    fn set_on_message(&self, handler: MessageHandler) {
        *self.on_message.lock() = Some(handler);
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }
}

// ============================================================================
// Tests
// ============================================================================
