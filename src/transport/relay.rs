//! Tagged, filtered transport across a boundary.
//!
//! Outbound messages are rendered as `"omid://" + JSON` and posted to the
//! peer's delivery point. The delivery point is shared with unrelated
//! traffic, so the listener task drops anything that is not a tagged,
//! well-formed message.
//!
//! # Listener
//!
//! Construction subscribes to the own delivery point and spawns a tokio
//! task that:
//!
//! 1. Ignores data without the [`PROTOCOL_TAG`] prefix
//! 2. Strips the tag and parses the JSON
//! 3. Drops data that is not a well-formed message
//! 4. Hands the message and its sender to the inbound handler
//!
//! The task ends when the transport is dropped or the delivery point closes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::host::{Envelope, Host};
use crate::identifiers::ContextId;
use crate::protocol::{Message, PROTOCOL_TAG};

use super::{Endpoint, MessageHandler, Transport, TransportKind};

// ============================================================================
// Types
// ============================================================================

/// Slot holding the inbound handler.
type HandlerSlot = Mutex<Option<MessageHandler>>;

// ============================================================================
// RelayTransport
// ============================================================================

/// Transport posting tagged JSON through the host delivery point.
pub struct RelayTransport {
    /// Host owning the delivery points.
    host: Arc<dyn Host>,
    /// Own delivery point, used as the sender of outbound data.
    own: ContextId,
    /// Default destination.
    peer: Option<ContextId>,
    /// Inbound handler (shared with the listener task).
    on_message: Arc<HandlerSlot>,
    /// Listener task.
    listener: AbortHandle,
}

impl RelayTransport {
    /// Binds to the delivery point of `own`, sending to `peer` by default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] when called outside a tokio runtime.
    pub fn new(host: Arc<dyn Host>, own: ContextId, peer: Option<ContextId>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let inbound = host.listen(own);
        let on_message: Arc<HandlerSlot> = Arc::new(Mutex::new(None));

        let listener = runtime.spawn(Self::run_listener(inbound, Arc::clone(&on_message)));
        debug!(%own, peer = ?peer, "Relay transport bound");

        Ok(Self {
            host,
            own,
            peer,
            on_message,
            listener: listener.abort_handle(),
        })
    }

    /// Returns the own delivery point.
    #[inline]
    #[must_use]
    pub fn own_context(&self) -> ContextId {
        self.own
    }

    /// Returns the default destination.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> Option<ContextId> {
        self.peer
    }

    /// Listener loop, one per transport.
    async fn run_listener(mut inbound: mpsc::UnboundedReceiver<Envelope>, on_message: Arc<HandlerSlot>) {
        while let Some(envelope) = inbound.recv().await {
            Self::handle_envelope(envelope, &on_message);
        }
        debug!("Relay delivery point closed");
    }

    /// Filters one datum and dispatches it if it is a protocol message.
    fn handle_envelope(envelope: Envelope, on_message: &HandlerSlot) {
        let Some(json) = envelope.data.strip_prefix(PROTOCOL_TAG) else {
            trace!(source = %envelope.source, "Ignoring untagged data");
            return;
        };

        let raw: Value = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                trace!(error = %e, "Dropping unparsable relay data");
                return;
            }
        };

        let Some(message) = Message::from_wire(&raw) else {
            trace!("Dropping malformed relay message");
            return;
        };

        let handler = on_message.lock().clone();
        match handler {
            Some(handler) => handler(message, Endpoint::Context(envelope.source)),
            None => trace!(method = %message.method, "No inbound handler"),
        }
    }
}

impl Transport for RelayTransport {
    fn send(&self, message: Message, to: Option<&Endpoint>) -> Result<()> {
        let target = match to {
            Some(Endpoint::Context(context)) => *context,
            Some(Endpoint::Direct(_)) => return Err(Error::EndpointMismatch),
            None => match self.peer {
                Some(peer) => peer,
                None => {
                    trace!(method = %message.method, "No relay peer, message dropped");
                    return Ok(());
                }
            },
        };

        let data = message.to_tagged()?;
        trace!(id = %message.id, method = %message.method, %target, "Relay send");
        self.host.post_message(target, data, self.own);
        Ok(())
    }

    fn set_on_message(&self, handler: MessageHandler) {
        *self.on_message.lock() = Some(handler);
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Relay
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
