//! Response correlation.
//!
//! Replies carry the id of the message they answer. Two kinds of entries
//! share the id space:
//!
//! | Entry | Fires | Removed |
//! |-------|-------|---------|
//! | Pending request | once | when its reply arrives |
//! | Subscription | on every reply | never |
//!
//! Callbacks always run after the table lock is released, so they may send
//! further messages.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::identifiers::MessageId;
use crate::protocol::{Arg, ERROR_METHOD, Message, RESPONSE_METHOD, Service, codec};
use crate::transport::Transport;

// ============================================================================
// Types
// ============================================================================

/// Callback fulfilled by a single reply.
pub type ResponseCallback = Box<dyn FnOnce(Vec<Arg>) + Send>;

/// Callback invoked for every reply to a subscription.
pub type SubscriptionCallback = Arc<dyn Fn(Vec<Arg>) + Send + Sync>;

/// Reply handling requested for an outbound message.
pub enum Reply {
    /// Fire-and-forget.
    None,
    /// One reply expected.
    Once(ResponseCallback),
    /// Replies expected until the entry is removed.
    Every(SubscriptionCallback),
}

/// Where a reply goes.
enum Route {
    Once(ResponseCallback),
    Repeat(SubscriptionCallback),
}

// ============================================================================
// CorrelationTable
// ============================================================================

/// Reply callbacks keyed by message id. Owned by one client.
#[derive(Default)]
pub struct CorrelationTable {
    pending: FxHashMap<MessageId, ResponseCallback>,
    subscriptions: FxHashMap<MessageId, SubscriptionCallback>,
}

impl CorrelationTable {
    /// Records a one-shot callback for `id`.
    pub fn insert_pending(&mut self, id: MessageId, callback: ResponseCallback) {
        self.pending.insert(id, callback);
    }

    /// Records a subscription for `id`.
    pub fn insert_subscription(&mut self, id: MessageId, callback: SubscriptionCallback) {
        self.subscriptions.insert(id, callback);
    }

    /// Forgets a one-shot callback. Returns `true` if it was still pending.
    pub fn remove_pending(&mut self, id: &MessageId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Forgets a subscription. Returns `true` if it existed.
    pub fn remove_subscription(&mut self, id: &MessageId) -> bool {
        self.subscriptions.remove(id).is_some()
    }

    /// Returns `true` if `id` is still waiting for its reply.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: &MessageId) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of unanswered one-shot requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Takes the route for a reply to `id`. One-shot entries are removed.
    fn route(&mut self, id: &MessageId) -> Option<Route> {
        if let Some(callback) = self.pending.remove(id) {
            return Some(Route::Once(callback));
        }
        self.subscriptions.get(id).cloned().map(Route::Repeat)
    }
}

// ============================================================================
// Submit
// ============================================================================

/// Builds a message for `service`, records its reply entry and sends it.
///
/// The entry is recorded before sending since a direct transport may answer
/// before `send` returns. It is removed again if sending fails.
///
/// # Errors
///
/// Returns encoding and transport errors.
pub fn submit(
    transport: &dyn Transport,
    table: &Mutex<CorrelationTable>,
    service: Service,
    client_version: &str,
    method: &str,
    args: Vec<Arg>,
    reply: Reply,
) -> Result<MessageId> {
    let id = MessageId::generate();
    let payload = codec::encode(client_version, args)?;
    let message = Message::new(id.clone(), service.qualify(method), client_version, payload);

    match reply {
        Reply::None => {}
        Reply::Once(callback) => table.lock().insert_pending(id.clone(), callback),
        Reply::Every(callback) => table.lock().insert_subscription(id.clone(), callback),
    }

    if let Err(e) = transport.send(message, None) {
        let mut table = table.lock();
        table.remove_pending(&id);
        table.remove_subscription(&id);
        return Err(e);
    }

    trace!(%id, service = service.name(), method, "Message sent");
    Ok(id)
}

// ============================================================================
// Dispatch
// ============================================================================

/// Handles one inbound message for a client speaking `client_version`.
///
/// Replies are decoded with the client's own version, since the service
/// encodes them at the version the client declared.
pub fn dispatch_inbound(table: &Mutex<CorrelationTable>, client_version: &str, message: Message) {
    match message.method.as_str() {
        RESPONSE_METHOD => {
            let args = match codec::decode(client_version, message.args) {
                Ok(args) => args,
                Err(e) => {
                    warn!(id = %message.id, error = %e, "Dropping undecodable response");
                    return;
                }
            };

            let route = table.lock().route(&message.id);
            match route {
                Some(Route::Once(callback)) => {
                    trace!(id = %message.id, "Response correlated");
                    callback(args);
                }
                Some(Route::Repeat(callback)) => {
                    trace!(id = %message.id, "Subscription notified");
                    callback(args);
                }
                None => debug!(id = %message.id, "Response for unknown request"),
            }
        }
        ERROR_METHOD => {
            error!(id = %message.id, args = ?message.args, "Service reported an error");
        }
        other => trace!(method = other, "Ignoring inbound message"),
    }
}

// ============================================================================
// Tests
// ============================================================================
