//! Service discovery.
//!
//! [`locate`] walks an ordered list of candidate contexts and returns the
//! first working transport:
//!
//! 1. A same-boundary candidate exporting a handler at the key path yields a
//!    [`DirectTransport`]
//! 2. Otherwise a candidate the presence probe accepts yields a
//!    [`RelayTransport`]
//! 3. Otherwise the next candidate is tried
//!
//! Finding nothing is not an error: the caller treats the service as
//! unavailable.
//!
//! # Call Sites
//!
//! | Client | Candidates |
//! |--------|------------|
//! | Session | explicit override, own context, top context |
//! | Verification | announced service context, top context |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::host::{Capability, Export, Host, KeyPath};
use crate::identifiers::ContextId;
use crate::protocol::{IDENTIFY_SERVICE_WINDOW_METHOD, Message};
use crate::transport::{DirectTransport, RelayTransport, Transport};

use super::origin::{is_cross_boundary, resolve_global_context, resolve_top_context};

// ============================================================================
// Constants
// ============================================================================

/// Where a service exports its direct entry point for session clients.
pub const SESSION_SERVICE_KEY_PATH: KeyPath =
    KeyPath::new(&["omid", "v1_SessionServiceCommunication"]);

/// Where a service exports its direct entry point for verification clients.
pub const VERIFICATION_SERVICE_KEY_PATH: KeyPath =
    KeyPath::new(&["omid", "v1_VerificationServiceCommunication"]);

/// Where a service announces its context to verification clients.
pub const SERVICE_WINDOW_KEY_PATH: KeyPath = KeyPath::new(&["omid", "serviceWindow"]);

/// Name of the child frame marking a context that hosts a service.
pub const PRESENCE_FRAME_NAME: &str = "omid_v1_present";

// ============================================================================
// Types
// ============================================================================

/// Predicate telling whether a service is reachable in a context across a
/// boundary.
pub type PresenceProbe = Arc<dyn Fn(&dyn Host, ContextId) -> bool + Send + Sync>;

// ============================================================================
// Presence
// ============================================================================

/// Returns `true` if `peer` has a child frame named [`PRESENCE_FRAME_NAME`].
#[must_use]
pub fn is_service_present(host: &dyn Host, peer: ContextId) -> bool {
    host.child_named(peer, PRESENCE_FRAME_NAME).is_some()
}

/// Returns the default presence probe, [`is_service_present`].
#[must_use]
pub fn default_presence_probe() -> PresenceProbe {
    Arc::new(is_service_present)
}

// ============================================================================
// Locate
// ============================================================================

/// Returns a transport to the first candidate hosting the service.
///
/// Lookup failures count as absence, as does a relay candidate when no
/// tokio runtime is available. Returns `None` if no candidate qualifies.
pub fn locate(
    host: &Arc<dyn Host>,
    own: ContextId,
    candidates: &[ContextId],
    key_path: KeyPath,
    probe: &PresenceProbe,
) -> Option<Box<dyn Transport>> {
    for &candidate in candidates {
        if !is_cross_boundary(host.as_ref(), own, candidate) {
            let capability = Capability::new(candidate, key_path);
            match host.lookup(own, &capability) {
                Ok(Some(Export::Handler(handler))) => {
                    debug!(%candidate, %key_path, "Direct transport selected");
                    return Some(Box::new(DirectTransport::connect(handler)));
                }
                Ok(_) => trace!(%candidate, %key_path, "Nothing exported"),
                Err(e) => trace!(%candidate, error = %e, "Lookup failed"),
            }
        }

        if probe(host.as_ref(), candidate) {
            match RelayTransport::new(Arc::clone(host), own, Some(candidate)) {
                Ok(relay) => {
                    debug!(%candidate, "Relay transport selected");
                    return Some(Box::new(relay));
                }
                Err(e) => warn!(%candidate, error = %e, "Relay unavailable"),
            }
        }
    }

    debug!(candidates = candidates.len(), "No service found");
    None
}

/// Locates the session service.
///
/// Candidates are `service_context` when given, then the own context, then
/// the top context.
pub fn locate_session_service(
    host: &Arc<dyn Host>,
    service_context: Option<ContextId>,
    probe: &PresenceProbe,
) -> Option<Box<dyn Transport>> {
    let own = resolve_global_context(host.as_ref());
    let candidates: Vec<ContextId> = service_context
        .into_iter()
        .chain([own, resolve_top_context(host.as_ref(), own)])
        .collect();

    locate(host, own, &candidates, SESSION_SERVICE_KEY_PATH, probe)
}

/// Locates the verification service.
///
/// Candidates are the context announced at [`SERVICE_WINDOW_KEY_PATH`] in
/// the own context when present, then the top context.
pub fn locate_verification_service(
    host: &Arc<dyn Host>,
    probe: &PresenceProbe,
) -> Option<Box<dyn Transport>> {
    let own = resolve_global_context(host.as_ref());
    let announced = match host.lookup(own, &Capability::new(own, SERVICE_WINDOW_KEY_PATH)) {
        Ok(Some(Export::Context(context))) => Some(context),
        _ => None,
    };
    let candidates: Vec<ContextId> = announced
        .into_iter()
        .chain([resolve_top_context(host.as_ref(), own)])
        .collect();

    locate(host, own, &candidates, VERIFICATION_SERVICE_KEY_PATH, probe)
}

// ============================================================================
// Service Context Announcements
// ============================================================================

/// Invokes `callback` with the sender of every relay message announcing a
/// service context at the own delivery point.
///
/// Abort the returned handle to stop listening.
///
/// # Errors
///
/// Returns [`Error::NoRuntime`] when called outside a tokio runtime.
pub fn listen_for_service_context(
    host: &Arc<dyn Host>,
    callback: impl Fn(ContextId) + Send + Sync + 'static,
) -> Result<JoinHandle<()>> {
    let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
    let own = resolve_global_context(host.as_ref());
    let mut inbound = host.listen(own);

    Ok(runtime.spawn(async move {
        while let Some(envelope) = inbound.recv().await {
            let Some(message) = Message::from_tagged(&envelope.data) else {
                continue;
            };
            if message.method == IDENTIFY_SERVICE_WINDOW_METHOD {
                debug!(source = %envelope.source, "Service context announced");
                callback(envelope.source);
            }
        }
    }))
}

// ============================================================================
// Tests
// ============================================================================
