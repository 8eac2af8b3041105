//! Builder for [`VerificationClient`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::discovery::{PresenceProbe, default_presence_probe, locate_verification_service};
use crate::host::Host;
use crate::transport::Transport;

use super::client::VerificationClient;

// ============================================================================
// VerificationClientBuilder
// ============================================================================

/// Builder for configuring a [`VerificationClient`].
///
/// With a host, the client locates the verification service and uses the
/// host timers. An explicit transport bypasses discovery.
#[derive(Default)]
pub struct VerificationClientBuilder {
    host: Option<Arc<dyn Host>>,
    transport: Option<Box<dyn Transport>>,
    presence_probe: Option<PresenceProbe>,
}

impl VerificationClientBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host used for discovery and timers.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Uses `transport` instead of discovery.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the presence probe for relay candidates.
    #[inline]
    #[must_use]
    pub fn presence_probe(mut self, probe: PresenceProbe) -> Self {
        self.presence_probe = Some(probe);
        self
    }

    /// Creates the client. Finding no service is not an error.
    #[must_use]
    pub fn build(self) -> VerificationClient {
        let timers = self.host.as_ref().and_then(|host| host.timers());

        let transport = match (self.transport, &self.host) {
            (Some(transport), _) => Some(transport),
            (None, Some(host)) => {
                let probe = self.presence_probe.unwrap_or_else(default_presence_probe);
                locate_verification_service(host, &probe)
            }
            (None, None) => None,
        };

        debug!(
            transport = ?transport.as_ref().map(|transport| transport.kind()),
            host_timers = timers.is_some(),
            "Verification client configured"
        );
        VerificationClient::new(transport, timers)
    }
}

impl fmt::Debug for VerificationClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationClientBuilder")
            .field("has_host", &self.host.is_some())
            .field("has_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
